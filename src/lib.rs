//! SLA triage engine library exports

pub mod buffer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod tasks;
