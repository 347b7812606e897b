//! Core building blocks shared by the service and the load generator.

pub mod config;
pub mod error;
