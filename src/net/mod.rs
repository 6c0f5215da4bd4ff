//! Networking: the wire protocol (C10, §4.11) and the connection-level
//! handshake/dispatch state machines built on top of it.

pub mod connection;
pub mod dispatch;
pub mod protocol;
pub mod submitter;
pub mod worker;
