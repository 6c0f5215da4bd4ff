//! Worker-side client protocol (§4.14, the worker's half of the exchange)
//! and the polling loop that repeats it forever (§6, supplementing the
//! worker binary the retrieved source set omitted).

use crate::net::connection::client_handshake;
use crate::net::protocol::{self, ClientType, MessageKind, ProtocolError, TaskIds};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Read, Write};

/// One completed action awaiting report to the server on the worker's next
/// poll (results lag one session behind completion, matching a real
/// render-then-report cycle rather than blocking the session on render
/// time).
pub struct CompletedAction {
    pub ids: TaskIds,
    pub payload: Vec<u8>,
}

/// Runs one worker session on an already-handshaken stream: reports
/// `completed` actions from the prior session, then requests and renders up
/// to `max_new_actions` fresh ones via `render`, returning them for the
/// *next* session's report (§4.14 steps 1-3).
pub fn run_worker_session<S: Read + Write>(
    stream: &mut S,
    completed: &[CompletedAction],
    max_new_actions: u8,
    mut render: impl FnMut(&[u8]) -> Vec<u8>,
) -> Result<Vec<CompletedAction>, ProtocolError> {
    protocol::read_frame_expect(stream, MessageKind::GetCompJobs)?;
    let mut count_payload = Vec::new();
    count_payload.write_u32::<LittleEndian>(completed.len() as u32).unwrap();
    protocol::write_frame(stream, MessageKind::CompletedJobs, &count_payload)?;
    for action in completed {
        protocol::write_frame(stream, MessageKind::TaskIds, &action.ids.encode())?;
        protocol::write_frame(stream, MessageKind::CompTaskAction, &action.payload)?;
    }

    protocol::read_frame_expect(stream, MessageKind::HowMuchAction)?;
    protocol::write_frame(stream, MessageKind::ActionCount, &[max_new_actions])?;

    let mut newly_rendered = Vec::new();
    let mut disconnected = false;
    for _ in 0..max_new_actions {
        let (kind, payload) = protocol::read_frame(stream)?;
        match kind {
            MessageKind::TaskIds => {
                let ids = TaskIds::decode(&payload)?;
                let action_payload = protocol::read_frame_expect(stream, MessageKind::TaskAction)?;
                let result = render(&action_payload);
                newly_rendered.push(CompletedAction { ids, payload: result });
            }
            MessageKind::Disconnect => {
                disconnected = true;
                break;
            }
            other => return Err(ProtocolError::UnexpectedKind { expected: MessageKind::TaskIds, got: other }),
        }
    }
    if !disconnected {
        protocol::read_frame_expect(stream, MessageKind::Disconnect)?;
    }
    Ok(newly_rendered)
}

pub fn connect_and_handshake<S: Read + Write>(stream: &mut S, secret: &str) -> Result<(), ProtocolError> {
    client_handshake(stream, secret, ClientType::Worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

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
    fn worker_session_reports_then_renders_then_reads_disconnect() {
        let mut scripted = Vec::new();
        protocol::write_frame(&mut scripted, MessageKind::GetCompJobs, &[]).unwrap();
        protocol::write_frame(&mut scripted, MessageKind::HowMuchAction, &[]).unwrap();
        let ids = TaskIds { task_id: 1, action_id: 2 };
        protocol::write_frame(&mut scripted, MessageKind::TaskIds, &ids.encode()).unwrap();
        protocol::write_frame(&mut scripted, MessageKind::TaskAction, b"render me").unwrap();
        protocol::write_frame(&mut scripted, MessageKind::Disconnect, &[]).unwrap();

        let mut stream = Duplex { inbound: Cursor::new(scripted), outbound: Vec::new() };
        let result = run_worker_session(&mut stream, &[], 1, |payload| payload.to_vec()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].payload, b"render me");
    }
}
