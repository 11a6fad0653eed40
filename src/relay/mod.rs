//! Chat relay module
//!
//! Stateless HTTP service forwarding chat requests to a user-supplied
//! OpenAI-compatible endpoint.

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod upstream;

pub use config::RelayConfig;
pub use error::RelayError;
pub use handlers::RelayState;
pub use server::{create_router, serve, start_server};
pub use upstream::{RelayResponse, Upstream};
