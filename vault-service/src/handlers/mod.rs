pub mod admin;
pub mod auth;
pub mod documents;
pub mod gov;
pub mod metrics;
