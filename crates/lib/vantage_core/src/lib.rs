//! # vantage_core
//!
//! Core domain logic for Vantage: token issuance and verification, the
//! credential store, and the activity audit log.

pub mod activity;
pub mod auth;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
