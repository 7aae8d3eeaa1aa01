//! Business logic between handlers and `vantage_core`.

pub mod auth;
pub mod cookies;
pub mod request_meta;
