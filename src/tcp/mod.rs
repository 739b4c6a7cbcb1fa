//! TCP line-protocol adapter

pub mod protocol;
mod server;

pub use protocol::{AuthRequest, Line};
pub use server::{TcpServer, TcpServerError, AUTH_TIMEOUT, PING_INTERVAL, WRITE_TIMEOUT};
