//! Socket transport: a nonblocking accept loop and one thread per
//! connection.

mod connection;
mod errors;
mod listener;
mod server;
mod stream;
#[cfg(test)]
mod tests;

pub use self::connection::{CommandConnectionHandler, ConnectionHandler};
pub use self::errors::{SocketProbe, TransportError};
pub use self::server::TransportServer;
pub use self::stream::ConnectionStream;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
