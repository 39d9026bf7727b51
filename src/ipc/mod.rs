//! Unix-socket transport between `steward hook` and the daemon.
//!
//! One newline-terminated JSON payload per connection, answered with one
//! newline-terminated JSON response.

pub mod socket_client;
pub mod socket_server;

pub use socket_client::HookClient;
pub use socket_server::IpcServer;
