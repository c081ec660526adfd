//! Request handlers.

pub mod dashboard;
