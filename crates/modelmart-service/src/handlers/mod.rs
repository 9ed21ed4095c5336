//! API handlers.

pub mod admin;
pub mod analytics;
pub mod credits;
pub mod health;
pub mod predict;
pub mod usage;
