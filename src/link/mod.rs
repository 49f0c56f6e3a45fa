// Connection to the telemetry server: transports, reconnect timing and the
// state machine that ties them together.
pub mod backoff;
pub mod manager;
pub mod timer;
pub mod transport;

pub use backoff::Backoff;
pub use manager::{ConnectionManager, ConnectionState, LinkConfig, LinkUpdate};
pub use transport::{Tagged, Transport, WsTransport};
