pub mod api;
pub mod error;
pub mod router;
pub mod server;
pub mod state;
pub mod transport;

pub use server::GatewayServer;
