//! Submitter-side client logic (C14, §4.14): handshake as a `Submitter`,
//! send one job submission, await `SubmitOK`.

use crate::net::connection::client_handshake;
use crate::net::protocol::{self, ClientType, MessageKind, ProtocolError, SubmitJobAnim, SubmitJobBasic};
use std::io::{Read, Write};

pub fn submit_tiled<S: Read + Write>(stream: &mut S, secret: &str, job: &SubmitJobBasic) -> Result<(), ProtocolError> {
    client_handshake(stream, secret, ClientType::Submitter)?;
    protocol::write_frame(stream, MessageKind::SubmitJobBasic, &job.encode()?)?;
    protocol::read_frame_expect(stream, MessageKind::SubmitOk)?;
    Ok(())
}

pub fn submit_animation<S: Read + Write>(stream: &mut S, secret: &str, job: &SubmitJobAnim) -> Result<(), ProtocolError> {
    client_handshake(stream, secret, ClientType::Submitter)?;
    protocol::write_frame(stream, MessageKind::SubmitJobAnim, &job.encode()?)?;
    protocol::read_frame_expect(stream, MessageKind::SubmitOk)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A duplex in-memory stream: writes accumulate in `outbound`, reads
    /// come from a separately scripted `inbound` buffer, so a client-side
    /// test can script only the server's half of the exchange.
    struct Duplex {
        inbound: Cursor<Vec<u8>>,
        outbound: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inbound.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.outbound.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn submit_tiled_encodes_handshake_then_job() {
        let mut scripted_server_response = Vec::new();
        protocol::write_frame(&mut scripted_server_response, MessageKind::EverythingOk, &[]).unwrap();
        protocol::write_frame(&mut scripted_server_response, MessageKind::GetClientType, &[]).unwrap();
        protocol::write_frame(&mut scripted_server_response, MessageKind::SubmitOk, &[]).unwrap();

        let mut stream = Duplex { inbound: Cursor::new(scripted_server_response), outbound: Vec::new() };
        let job = SubmitJobBasic {
            filename: "scene.drise".to_string(),
            rx: 320,
            ry: 240,
            output: "render".to_string(),
            gx: 4,
            gy: 4,
        };
        assert!(submit_tiled(&mut stream, "sekrit", &job).is_ok());
    }
}
