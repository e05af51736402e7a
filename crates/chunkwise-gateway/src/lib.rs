pub mod api;
pub mod error;
pub mod router;
pub mod server;
pub mod state;

pub use server::GatewayServer;
pub use state::{AppState, SharedState, build_registry};
