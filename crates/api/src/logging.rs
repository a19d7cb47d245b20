//! Logging setup
//!
//! `test`/`dev` get human-readable debug output; `prod` gets JSON at info
//! level. `RUST_LOG` overrides the default filter when set.

use segmentify_domain::Env;
use tracing_subscriber::EnvFilter;

pub fn setup_logging(env: Env) {
    let default_filter = match env {
        Env::Test | Env::Dev => "debug",
        Env::Prod => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match env {
        Env::Prod => {
            tracing_subscriber::fmt().with_env_filter(filter).json().try_init().ok();
        }
        Env::Test | Env::Dev => {
            tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
        }
    }
}
