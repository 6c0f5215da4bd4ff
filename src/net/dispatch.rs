//! Server-side dispatch (C13, §4.14): after handshake and client-type
//! negotiation, branches into the worker or submitter sub-protocol against
//! a shared [`JobEngine`].

use crate::job::engine::JobEngine;
use crate::job::task::{AnimationTask, TiledImageTask};
use crate::net::connection::{McpConnection, ServerHandshake};
use crate::net::protocol::{self, ClientType, MessageKind, ProtocolError, SubmitJobAnim, SubmitJobBasic, TaskIds};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Write};

/// Runs one client connection end to end: handshake, client-type branch,
/// that variant's task loop, then returns (the caller closes the socket).
pub fn handle_connection<S: Read + Write>(
    stream: &mut S,
    handshake: &ServerHandshake,
    engine: &JobEngine,
) -> Result<(), ProtocolError> {
    handshake.accept(stream)?;
    match handshake.get_client_type(stream)? {
        ClientType::Worker => run_worker_protocol(stream, engine),
        ClientType::Submitter => run_submitter_protocol(stream, engine),
        ClientType::Mcp => McpConnection.perform_client_tasks(stream),
        ClientType::Unknown => {
            log::warn!("client declared unknown type; disconnecting");
            protocol::write_frame(stream, MessageKind::Disconnect, &[])
        }
    }
}

/// The worker sub-protocol (§4.14): collect completed actions, then hand
/// out up to `n` fresh ones, then disconnect.
fn run_worker_protocol<S: Read + Write>(stream: &mut S, engine: &JobEngine) -> Result<(), ProtocolError> {
    protocol::write_frame(stream, MessageKind::GetCompJobs, &[])?;
    let payload = protocol::read_frame_expect(stream, MessageKind::CompletedJobs)?;
    let count = (&payload[..]).read_u32::<LittleEndian>().unwrap_or(0);
    for _ in 0..count {
        let ids_payload = protocol::read_frame_expect(stream, MessageKind::TaskIds)?;
        let ids = TaskIds::decode(&ids_payload)?;
        let results = protocol::read_frame_expect(stream, MessageKind::CompTaskAction)?;
        if let Err(e) = engine.finished_action(ids.task_id, ids.action_id, &results) {
            log::warn!("finished_action({}, {}) rejected: {e}", ids.task_id, ids.action_id);
        }
    }

    protocol::write_frame(stream, MessageKind::HowMuchAction, &[])?;
    let payload = protocol::read_frame_expect(stream, MessageKind::ActionCount)?;
    let n = *payload.first().unwrap_or(&0);
    for _ in 0..n {
        match engine.get_new_action() {
            Some((task_id, action_id, action_payload)) => {
                protocol::write_frame(stream, MessageKind::TaskIds, &TaskIds { task_id, action_id }.encode())?;
                protocol::write_frame(stream, MessageKind::TaskAction, &action_payload)?;
            }
            None => break,
        }
    }

    protocol::write_frame(stream, MessageKind::Disconnect, &[])
}

/// The submitter sub-protocol (§4.14): receive one job submission, register
/// it with the engine, acknowledge, disconnect.
fn run_submitter_protocol<S: Read + Write>(stream: &mut S, engine: &JobEngine) -> Result<(), ProtocolError> {
    let (kind, payload) = protocol::read_frame(stream)?;
    match kind {
        MessageKind::SubmitJobBasic => {
            let job = SubmitJobBasic::decode(&payload)?;
            engine.add_task(Box::new(TiledImageTask::new(job.filename, job.rx, job.ry, job.output, job.gx, job.gy)));
        }
        MessageKind::SubmitJobAnim => {
            let job = SubmitJobAnim::decode(&payload)?;
            engine.add_task(Box::new(AnimationTask::new(job.filename, job.rx, job.ry, job.output, job.frames)));
        }
        other => return Err(ProtocolError::UnexpectedKind { expected: MessageKind::SubmitJobBasic, got: other }),
    }

    protocol::write_frame(stream, MessageKind::SubmitOk, &[])?;
    protocol::write_frame(stream, MessageKind::Disconnect, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A duplex in-memory stream: writes go to `outbound`, reads come from
    /// `inbound`, so a single test can script both sides of a handshake.
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
    fn submitter_protocol_registers_a_tiled_task() {
        let engine = JobEngine::new();
        let handshake = ServerHandshake::new("sekrit");

        let job = SubmitJobBasic {
            filename: "scene.drise".to_string(),
            rx: 64,
            ry: 64,
            output: "out".to_string(),
            gx: 2,
            gy: 2,
        };
        let mut inbound = Vec::new();
        protocol::write_frame(&mut inbound, MessageKind::Handshake, &protocol::encode_fixed_string("sekrit").unwrap()).unwrap();
        protocol::write_frame(
            &mut inbound,
            MessageKind::Version,
            &crate::net::connection::PROTOCOL_VERSION.encode(),
        )
        .unwrap();
        protocol::write_frame(&mut inbound, MessageKind::ClientType, &[ClientType::Submitter as u8]).unwrap();
        protocol::write_frame(&mut inbound, MessageKind::SubmitJobBasic, &job.encode().unwrap()).unwrap();

        let mut stream = Duplex { inbound: Cursor::new(inbound), outbound: Vec::new() };
        handle_connection(&mut stream, &handshake, &engine).unwrap();
        assert_eq!(engine.task_count(), 1);
    }
}
