//! Request handlers.

pub mod activity;
pub mod auth;
pub mod health;
pub mod users;
