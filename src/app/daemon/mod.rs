pub mod client;
pub mod protocol;
pub mod reply;
pub mod transport;

pub use client::DaemonClient;
pub use protocol::{DaemonCommand, GameUpdate, LogLevel, ProfileMode};
pub use reply::DaemonReply;
pub use transport::{DaemonTransport, Transport, TransportKind};
