//! The HTTP service exposing `POST /compute`.

pub mod server;

pub use server::{build_router, serve, AppState};
