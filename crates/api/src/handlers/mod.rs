//! HTTP request handlers

pub mod segments;
pub mod users;
