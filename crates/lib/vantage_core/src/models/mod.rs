//! Domain models shared by the API server and its clients.

pub mod activity;
pub mod auth;
