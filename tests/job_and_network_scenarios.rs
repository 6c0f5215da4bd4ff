//! Integration scenarios S1, S2, S6 (§8): these drive the job engine and a
//! loopback TCP connection the way a real submit/dispatch cycle would,
//! rather than exercising a single module's unit tests in isolation.

use byteorder::{LittleEndian, WriteBytesExt};
use rise_engine::job::engine::JobEngine;
use rise_engine::job::task::{AnimationTask, TiledImageTask};
use rise_engine::net::connection::ServerHandshake;
use rise_engine::net::protocol::{self, MessageKind, ProtocolVersion};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

fn drain_actions(engine: &JobEngine) -> Vec<(u32, u32, Vec<u8>)> {
    let mut out = Vec::new();
    while let Some(action) = engine.get_new_action() {
        out.push(action);
    }
    out
}

/// S1: a TiledImage job over 800x600 split 32x32 issues exactly
/// ceil(800/32)*ceil(600/32) = 25*19 = 475 actions, one per tile.
#[test]
fn s1_tiled_job_issues_exactly_the_expected_tile_count() {
    let engine = JobEngine::new();
    let task = TiledImageTask::new("scene.s".to_string(), 800, 600, "/tmp/s1-out".to_string(), 32, 32);
    engine.add_task(Box::new(task));

    let actions = drain_actions(&engine);
    assert_eq!(actions.len(), 475);

    let mut ids: Vec<u32> = actions.iter().map(|(_, action_id, _)| *action_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 475, "every tile action id must be unique");
}

/// S2: an Animation job with 10 frames issues exactly 10 actions, and
/// completing each writes its per-frame output file.
#[test]
fn s2_animation_job_issues_ten_actions_and_writes_ten_frames() {
    let engine = JobEngine::new();
    let task = AnimationTask::new("scene.s".to_string(), 320, 240, "/tmp/s2-anim".to_string(), 10);
    engine.add_task(Box::new(task));

    let actions = drain_actions(&engine);
    assert_eq!(actions.len(), 10);
    assert!(engine.get_new_action().is_none());

    let mut frame_payload = Vec::new();
    for _ in 0..(320 * 240) {
        frame_payload.write_f32::<LittleEndian>(0.25).unwrap();
        frame_payload.write_f32::<LittleEndian>(0.25).unwrap();
        frame_payload.write_f32::<LittleEndian>(0.25).unwrap();
    }

    for (i, (task_id, action_id, _)) in actions.iter().enumerate() {
        let is_last = i + 1 == actions.len();
        let done = engine.finished_action(*task_id, *action_id, &frame_payload).unwrap();
        assert_eq!(done, is_last);
    }

    for frame in 0..10u32 {
        let path = format!("/tmp/s2-anim_{frame:05}_prophoto16.ppm");
        assert!(std::path::Path::new(&path).exists(), "missing {path}");
        std::fs::remove_file(&path).unwrap();
    }
}

/// S6: a client that sends the wrong secret during handshake gets
/// disconnected within one message round-trip, and the server-side handler
/// observes a `WrongSecret` error rather than completing the handshake.
#[test]
fn s6_wrong_secret_is_rejected_and_connection_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let handshake = ServerHandshake::new("correct-secret".to_string());
        handshake.accept(&mut stream)
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client_handshake_with_wrong_secret(&mut client).unwrap();

    let result = server.join().unwrap();
    assert!(matches!(result, Err(protocol::ProtocolError::WrongSecret)));

    let mut buf = [0u8; 8];
    let n = client.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0, "server should have closed the connection after the bad handshake");
}

fn client_handshake_with_wrong_secret(stream: &mut TcpStream) -> Result<(), protocol::ProtocolError> {
    let secret_payload = protocol::encode_fixed_string("wrong-secret").unwrap();
    let version = ProtocolVersion { major: 1, minor: 0, revision: 0, build: 0 };
    protocol::write_frame(stream, MessageKind::Handshake, &secret_payload)?;
    protocol::write_frame(stream, MessageKind::Version, &version.encode())?;
    stream.flush().map_err(protocol::ProtocolError::Io)
}
