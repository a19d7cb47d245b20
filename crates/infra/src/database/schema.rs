//! Declarative schema, applied idempotently at startup
//!
//! History rows carry no foreign keys: the audit trail must survive
//! segment deletion. Memberships cascade away with their segment.

pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS segments (
    slug    TEXT PRIMARY KEY CHECK (slug <> ''),
    percent INTEGER NOT NULL DEFAULT 0 CHECK (percent BETWEEN 0 AND 100)
);

CREATE TABLE IF NOT EXISTS users (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS users_segments (
    user_id      BIGINT NOT NULL REFERENCES users (id),
    segment_slug TEXT   NOT NULL REFERENCES segments (slug) ON DELETE CASCADE,
    expire_at    TIMESTAMPTZ,
    UNIQUE (user_id, segment_slug)
);

CREATE TABLE IF NOT EXISTS users_segments_history (
    user_id      BIGINT      NOT NULL,
    segment_slug TEXT        NOT NULL,
    operation    TEXT        NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS users_segments_expire_at_idx
    ON users_segments (expire_at)
    WHERE expire_at IS NOT NULL;

CREATE INDEX IF NOT EXISTS users_segments_history_user_id_idx
    ON users_segments_history (user_id, created_at);
";
