//! Handshake state machine and client-type branching (§4.11). Generic over
//! `Read + Write` so the same logic drives a real `TcpStream` or an
//! in-memory buffer in tests.

use crate::net::protocol::{self, ClientType, MessageKind, ProtocolError, ProtocolVersion};
use std::io::{Read, Write};

pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion { major: 1, minor: 0, revision: 0, build: 0 };

/// Server-side handshake: expects Handshake then Version, verifying both
/// against the server's configured secret/version before replying
/// `EverythingOk` (§4.11).
pub struct ServerHandshake {
    pub secret: String,
}

impl ServerHandshake {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Any mismatch closes the connection with a logged error, never a
    /// partial success (§4.11).
    pub fn accept<S: Read + Write>(&self, stream: &mut S) -> Result<(), ProtocolError> {
        let payload = protocol::read_frame_expect(stream, MessageKind::Handshake)?;
        let received_secret = protocol::decode_fixed_string(&payload);
        if received_secret != self.secret {
            log::error!("wrong secret code from client");
            return Err(ProtocolError::WrongSecret);
        }

        let payload = protocol::read_frame_expect(stream, MessageKind::Version)?;
        let version = ProtocolVersion::decode(&payload)?;
        if version != PROTOCOL_VERSION {
            log::error!("protocol version mismatch: {version:?}");
            return Err(ProtocolError::VersionMismatch);
        }

        protocol::write_frame(stream, MessageKind::EverythingOk, &[])?;
        Ok(())
    }

    /// Sends `GetClientType` and reads back the declared type, after which
    /// the caller branches into the worker/submitter/MCP sub-protocol
    /// (§4.11).
    pub fn get_client_type<S: Read + Write>(&self, stream: &mut S) -> Result<ClientType, ProtocolError> {
        protocol::write_frame(stream, MessageKind::GetClientType, &[])?;
        let payload = protocol::read_frame_expect(stream, MessageKind::ClientType)?;
        Ok(ClientType::from_u8(*payload.first().unwrap_or(&0)))
    }
}

/// Client-side handshake counterpart shared by `drise-submitter` and
/// `drise-worker`.
pub fn client_handshake<S: Read + Write>(
    stream: &mut S,
    secret: &str,
    client_type: ClientType,
) -> Result<(), ProtocolError> {
    protocol::write_frame(stream, MessageKind::Handshake, &protocol::encode_fixed_string(secret)?)?;
    protocol::write_frame(stream, MessageKind::Version, &PROTOCOL_VERSION.encode())?;
    protocol::read_frame_expect(stream, MessageKind::EverythingOk)?;

    protocol::read_frame_expect(stream, MessageKind::GetClientType)?;
    protocol::write_frame(stream, MessageKind::ClientType, &[client_type as u8])?;
    Ok(())
}

/// MCP client subtype: reserved but not implemented. `perform_client_tasks`
/// immediately disconnects rather than entering any sub-protocol (Open
/// Question #4).
pub struct McpConnection;

impl McpConnection {
    pub fn perform_client_tasks<S: Read + Write>(&self, stream: &mut S) -> Result<(), ProtocolError> {
        protocol::write_frame(stream, MessageKind::Disconnect, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_handshake(secret: &str, version: ProtocolVersion) -> Vec<u8> {
        let mut buf = Vec::new();
        protocol::write_frame(&mut buf, MessageKind::Handshake, &protocol::encode_fixed_string(secret).unwrap()).unwrap();
        protocol::write_frame(&mut buf, MessageKind::Version, &version.encode()).unwrap();
        buf
    }

    #[test]
    fn accepts_matching_secret_and_version() {
        let handshake = ServerHandshake::new("sekrit");
        let mut stream = Cursor::new(encode_handshake("sekrit", PROTOCOL_VERSION));
        assert!(handshake.accept(&mut stream).is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let handshake = ServerHandshake::new("sekrit");
        let mut stream = Cursor::new(encode_handshake("wrong", PROTOCOL_VERSION));
        assert!(matches!(handshake.accept(&mut stream), Err(ProtocolError::WrongSecret)));
    }

    #[test]
    fn rejects_version_mismatch() {
        let handshake = ServerHandshake::new("sekrit");
        let bad_version = ProtocolVersion { major: 99, ..PROTOCOL_VERSION };
        let mut stream = Cursor::new(encode_handshake("sekrit", bad_version));
        assert!(matches!(handshake.accept(&mut stream), Err(ProtocolError::VersionMismatch)));
    }

    #[test]
    fn mcp_connection_disconnects_immediately() {
        let mut stream = Cursor::new(Vec::new());
        McpConnection.perform_client_tasks(&mut stream).unwrap();
        let mut read_back = Cursor::new(stream.into_inner());
        let (kind, _) = protocol::read_frame(&mut read_back).unwrap();
        assert_eq!(kind, MessageKind::Disconnect);
    }
}
