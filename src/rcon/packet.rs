//! RCON wire frame codec
//!
//! Frames are the vendor's binary envelope: a little-endian `i32` length
//! (counting everything after itself), an `i32` request id, an `i32` kind,
//! an ASCII body, and two NUL terminators. Everything above this module
//! treats the framing as opaque; the connection layer and the test harness
//! share these encode/decode helpers so both sides of the socket agree on
//! the format.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ============================================================================
// Frame Kind Constants
// ============================================================================

/// Frame kind discriminators, direction-dependent per the vendor protocol.
///
/// `AUTH_RESPONSE` and `EXEC_COMMAND` share a wire value; the direction of
/// travel disambiguates them, which is why these are constants rather than
/// an enum.
pub mod kind {
    /// Client login request carrying the password
    pub const AUTH: i32 = 3;
    /// Server verdict on a login request
    pub const AUTH_RESPONSE: i32 = 2;
    /// Client command execution request
    pub const EXEC_COMMAND: i32 = 2;
    /// Server payload answering an exec request
    pub const RESPONSE_VALUE: i32 = 0;
}

/// Bytes in a frame besides the body: id (4) + kind (4) + terminators (2).
pub const HEADER_BYTES: usize = 10;

/// Largest body the protocol allows in a single frame.
pub const MAX_BODY_BYTES: usize = 4096;

/// Sentinel id in an auth response signalling credential rejection.
pub const AUTH_REJECTED_ID: i32 = -1;

// ============================================================================
// Packet
// ============================================================================

/// One decoded RCON frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Request id echoed back by the server (or [`AUTH_REJECTED_ID`])
    pub id: i32,
    /// Frame kind, see [`kind`]
    pub kind: i32,
    /// Text payload with terminators stripped
    pub body: String,
}

impl Packet {
    /// Login request frame.
    pub fn auth(id: i32, password: &str) -> Self {
        Self {
            id,
            kind: kind::AUTH,
            body: password.to_string(),
        }
    }

    /// Command execution frame.
    pub fn exec(id: i32, command: &str) -> Self {
        Self {
            id,
            kind: kind::EXEC_COMMAND,
            body: command.to_string(),
        }
    }

    /// Server-side command response frame.
    pub fn response(id: i32, body: &str) -> Self {
        Self {
            id,
            kind: kind::RESPONSE_VALUE,
            body: body.to_string(),
        }
    }

    /// Server-side auth verdict frame. Pass [`AUTH_REJECTED_ID`] to reject.
    pub fn auth_response(id: i32) -> Self {
        Self {
            id,
            kind: kind::AUTH_RESPONSE,
            body: String::new(),
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let size = i32::try_from(body.len() + HEADER_BYTES).unwrap_or(i32::MAX);
        let mut buf = Vec::with_capacity(body.len() + HEADER_BYTES + 4);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        buf
    }
}

// ============================================================================
// Stream I/O
// ============================================================================

/// Write one frame and flush.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&packet.encode()).await?;
    writer.flush().await
}

/// Read one frame, validating the length field before trusting it.
///
/// A length outside `HEADER_BYTES..=HEADER_BYTES + MAX_BODY_BYTES` means the
/// stream has lost frame sync (or the peer is not speaking RCON); this is
/// surfaced as `InvalidData` so the caller can tear the session down.
pub async fn read_packet<R>(reader: &mut R) -> std::io::Result<Packet>
where
    R: AsyncRead + Unpin,
{
    let mut size_buf = [0u8; 4];
    reader.read_exact(&mut size_buf).await?;
    let declared = i32::from_le_bytes(size_buf);

    let min = i32::try_from(HEADER_BYTES).unwrap_or(i32::MAX);
    let max = i32::try_from(HEADER_BYTES + MAX_BODY_BYTES).unwrap_or(i32::MAX);
    if declared < min || declared > max {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame length {declared} outside {min}..={max}"),
        ));
    }

    let size = declared as usize;
    let mut frame = vec![0u8; size];
    reader.read_exact(&mut frame).await?;

    let id = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let kind = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);

    let body_end = size - 2;
    if frame[body_end] != 0 || frame[body_end + 1] != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame missing NUL terminators",
        ));
    }

    let body = String::from_utf8_lossy(&frame[8..body_end]).into_owned();
    Ok(Packet { id, kind, body })
}
