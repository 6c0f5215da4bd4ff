//! Wire codec (C10, §4.11): every message is framed as little-endian
//! `(kind: u16, length: u32, payload)`. String fields are fixed-width
//! 1024-byte NUL-padded arrays, matching the original's `ISerializable`-style
//! buffers rather than a length-prefixed string (grounded in
//! `original_source/` — see `_INDEX.md`'s serialization headers).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Width in bytes of every fixed string field in the protocol (filenames,
/// output paths).
pub const STRING_FIELD_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown message kind {0}")]
    UnknownKind(u16),
    #[error("string field exceeds {} bytes", STRING_FIELD_LEN)]
    StringTooLong,
    #[error("handshake failed: wrong secret code")]
    WrongSecret,
    #[error("handshake failed: version mismatch")]
    VersionMismatch,
    #[error("unexpected message kind: expected {expected:?}, got {got:?}")]
    UnexpectedKind { expected: MessageKind, got: MessageKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageKind {
    Handshake = 1,
    Version = 2,
    EverythingOk = 3,
    GetClientType = 4,
    ClientType = 5,
    SubmitJobBasic = 6,
    SubmitJobAnim = 7,
    SubmitOk = 8,
    Disconnect = 9,
    GetCompJobs = 10,
    CompletedJobs = 11,
    TaskIds = 12,
    CompTaskAction = 13,
    HowMuchAction = 14,
    ActionCount = 15,
    TaskAction = 16,
}

impl MessageKind {
    pub fn from_u16(value: u16) -> Result<Self, ProtocolError> {
        Ok(match value {
            1 => Self::Handshake,
            2 => Self::Version,
            3 => Self::EverythingOk,
            4 => Self::GetClientType,
            5 => Self::ClientType,
            6 => Self::SubmitJobBasic,
            7 => Self::SubmitJobAnim,
            8 => Self::SubmitOk,
            9 => Self::Disconnect,
            10 => Self::GetCompJobs,
            11 => Self::CompletedJobs,
            12 => Self::TaskIds,
            13 => Self::CompTaskAction,
            14 => Self::HowMuchAction,
            15 => Self::ActionCount,
            16 => Self::TaskAction,
            other => return Err(ProtocolError::UnknownKind(other)),
        })
    }
}

/// One client type byte as carried by the `ClientType` message (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientType {
    Unknown = 0,
    Worker = 1,
    Submitter = 2,
    Mcp = 3,
}

impl ClientType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Worker,
            2 => Self::Submitter,
            3 => Self::Mcp,
            _ => Self::Unknown,
        }
    }
}

/// Writes one frame: kind, then u32 payload length, then the payload bytes.
pub fn write_frame<W: Write>(writer: &mut W, kind: MessageKind, payload: &[u8]) -> Result<(), ProtocolError> {
    writer.write_u16::<LittleEndian>(kind as u16)?;
    writer.write_u32::<LittleEndian>(payload.len() as u32)?;
    writer.write_all(payload)?;
    Ok(())
}

/// Reads one frame, returning its kind and raw payload bytes.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(MessageKind, Vec<u8>), ProtocolError> {
    let kind_raw = reader.read_u16::<LittleEndian>()?;
    let kind = MessageKind::from_u16(kind_raw)?;
    let len = reader.read_u32::<LittleEndian>()?;
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok((kind, payload))
}

/// Reads a frame and checks it is the expected kind.
pub fn read_frame_expect<R: Read>(reader: &mut R, expected: MessageKind) -> Result<Vec<u8>, ProtocolError> {
    let (kind, payload) = read_frame(reader)?;
    if kind != expected {
        return Err(ProtocolError::UnexpectedKind { expected, got: kind });
    }
    Ok(payload)
}

pub fn encode_fixed_string(s: &str) -> Result<[u8; STRING_FIELD_LEN], ProtocolError> {
    let bytes = s.as_bytes();
    if bytes.len() >= STRING_FIELD_LEN {
        return Err(ProtocolError::StringTooLong);
    }
    let mut field = [0u8; STRING_FIELD_LEN];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

pub fn decode_fixed_string(field: &[u8]) -> String {
    let nul = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..nul]).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub build: u32,
}

impl ProtocolVersion {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.write_u32::<LittleEndian>(self.major).unwrap();
        buf.write_u32::<LittleEndian>(self.minor).unwrap();
        buf.write_u32::<LittleEndian>(self.revision).unwrap();
        buf.write_u32::<LittleEndian>(self.build).unwrap();
        buf
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = payload;
        Ok(Self {
            major: cursor.read_u32::<LittleEndian>()?,
            minor: cursor.read_u32::<LittleEndian>()?,
            revision: cursor.read_u32::<LittleEndian>()?,
            build: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SubmitJobBasic {
    pub filename: String,
    pub rx: u32,
    pub ry: u32,
    pub output: String,
    pub gx: u32,
    pub gy: u32,
}

impl SubmitJobBasic {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(STRING_FIELD_LEN * 2 + 16);
        buf.extend_from_slice(&encode_fixed_string(&self.filename)?);
        buf.write_u32::<LittleEndian>(self.rx)?;
        buf.write_u32::<LittleEndian>(self.ry)?;
        buf.extend_from_slice(&encode_fixed_string(&self.output)?);
        buf.write_u32::<LittleEndian>(self.gx)?;
        buf.write_u32::<LittleEndian>(self.gy)?;
        Ok(buf)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = payload;
        let filename = decode_fixed_string(&take(&mut cursor, STRING_FIELD_LEN)?);
        let rx = cursor.read_u32::<LittleEndian>()?;
        let ry = cursor.read_u32::<LittleEndian>()?;
        let output = decode_fixed_string(&take(&mut cursor, STRING_FIELD_LEN)?);
        let gx = cursor.read_u32::<LittleEndian>()?;
        let gy = cursor.read_u32::<LittleEndian>()?;
        Ok(Self { filename, rx, ry, output, gx, gy })
    }
}

#[derive(Debug, Clone)]
pub struct SubmitJobAnim {
    pub filename: String,
    pub rx: u32,
    pub ry: u32,
    pub output: String,
    pub frames: u32,
}

impl SubmitJobAnim {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(STRING_FIELD_LEN * 2 + 12);
        buf.extend_from_slice(&encode_fixed_string(&self.filename)?);
        buf.write_u32::<LittleEndian>(self.rx)?;
        buf.write_u32::<LittleEndian>(self.ry)?;
        buf.extend_from_slice(&encode_fixed_string(&self.output)?);
        buf.write_u32::<LittleEndian>(self.frames)?;
        Ok(buf)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = payload;
        let filename = decode_fixed_string(&take(&mut cursor, STRING_FIELD_LEN)?);
        let rx = cursor.read_u32::<LittleEndian>()?;
        let ry = cursor.read_u32::<LittleEndian>()?;
        let output = decode_fixed_string(&take(&mut cursor, STRING_FIELD_LEN)?);
        let frames = cursor.read_u32::<LittleEndian>()?;
        Ok(Self { filename, rx, ry, output, frames })
    }
}

/// `(task_id, action_id)`, sent alongside `CompTaskAction`/`TaskAction` to
/// identify which action a result or dispatch payload belongs to (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskIds {
    pub task_id: u32,
    pub action_id: u32,
}

impl TaskIds {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.write_u32::<LittleEndian>(self.task_id).unwrap();
        buf.write_u32::<LittleEndian>(self.action_id).unwrap();
        buf
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = payload;
        Ok(Self { task_id: cursor.read_u32::<LittleEndian>()?, action_id: cursor.read_u32::<LittleEndian>()? })
    }
}

fn take<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8], ProtocolError> {
    if cursor.len() < len {
        return Err(ProtocolError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "short frame")));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_over_an_in_memory_buffer() {
        let mut buf = Vec::new();
        write_frame(&mut buf, MessageKind::ActionCount, &[7u8]).unwrap();
        let mut cursor = &buf[..];
        let (kind, payload) = read_frame(&mut cursor).unwrap();
        assert_eq!(kind, MessageKind::ActionCount);
        assert_eq!(payload, vec![7u8]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(999).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        let mut cursor = &buf[..];
        assert!(matches!(read_frame(&mut cursor), Err(ProtocolError::UnknownKind(999))));
    }

    #[test]
    fn submit_job_basic_round_trips() {
        let job = SubmitJobBasic {
            filename: "scene.drise".to_string(),
            rx: 1920,
            ry: 1080,
            output: "out.exr".to_string(),
            gx: 8,
            gy: 8,
        };
        let encoded = job.encode().unwrap();
        let decoded = SubmitJobBasic::decode(&encoded).unwrap();
        assert_eq!(decoded.filename, job.filename);
        assert_eq!(decoded.rx, job.rx);
        assert_eq!(decoded.gy, job.gy);
    }

    #[test]
    fn fixed_string_rejects_overlong_input() {
        let long = "x".repeat(STRING_FIELD_LEN);
        assert!(matches!(encode_fixed_string(&long), Err(ProtocolError::StringTooLong)));
    }

    #[test]
    fn task_ids_round_trip() {
        let ids = TaskIds { task_id: 42, action_id: (3u32 << 16) | 9 };
        let decoded = TaskIds::decode(&ids.encode()).unwrap();
        assert_eq!(decoded, ids);
    }
}
