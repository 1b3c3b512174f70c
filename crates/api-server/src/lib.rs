#![warn(clippy::unwrap_used)]

pub mod context;
pub mod rest;
pub mod server;

pub use context::{ContextHandle, ServingContext};
pub use server::ApiServer;
