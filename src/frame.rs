//! Frame layout, command table and the inbound frame decoder.
//!
//! Wire format: `[0x7E][LEN][CMD][PAYLOAD...][INTEGRITY][0x7E]`
//!
//! LEN counts CMD, payload and the integrity field. The integrity field covers
//! LEN through the last payload byte and is either the 8-bit checksum or a
//! big-endian CRC-16/GENIBUS, depending on the command.

use log::debug;

use crate::buffer::FrameBuffer;
use crate::checksum::{checksum, crc16_genibus};
use crate::error::UhfError;

pub const FRAME_DELIMITER: u8 = 0x7E;

/// Start, LEN, CMD, one checksum byte, end
pub const MIN_FRAME_LEN: usize = 5;

/// LEN is a single byte
pub const MAX_FRAME_LEN: usize = 3 + u8::MAX as usize;

/// Integrity scheme of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    Checksum,
    Crc16,
}

impl Integrity {
    pub fn width(self) -> usize {
        match self {
            Integrity::Checksum => 1,
            Integrity::Crc16 => 2,
        }
    }

    fn field(self, span: &[u8]) -> Vec<u8> {
        match self {
            Integrity::Checksum => vec![checksum(span)],
            Integrity::Crc16 => crc16_genibus(span).to_be_bytes().to_vec(),
        }
    }
}

/// Module command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    GetInfo = 0x03,
    SetWorkingArea = 0x07,
    GetWorkingArea = 0x08,
    SetSelect = 0x0C,
    SetBaudRate = 0x11,
    SinglePoll = 0x22,
    ReadData = 0x39,
    WriteData = 0x49,
    GetWorkingChannel = 0xAA,
    SetWorkingChannel = 0xAB,
    SetFrequencyHopping = 0xAD,
    SetTransmitPower = 0xB6,
    GetTransmitPower = 0xB7,
}

impl Command {
    pub const ALL: [Command; 13] = [
        Command::GetInfo,
        Command::SetWorkingArea,
        Command::GetWorkingArea,
        Command::SetSelect,
        Command::SetBaudRate,
        Command::SinglePoll,
        Command::ReadData,
        Command::WriteData,
        Command::GetWorkingChannel,
        Command::SetWorkingChannel,
        Command::SetFrequencyHopping,
        Command::SetTransmitPower,
        Command::GetTransmitPower,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Integrity scheme used by both the request and the response.
    ///
    /// Module housekeeping frames use the legacy checksum; frames that carry
    /// tag traffic use the CRC.
    pub fn integrity(self) -> Integrity {
        match self {
            Command::SetSelect | Command::SinglePoll | Command::ReadData | Command::WriteData => {
                Integrity::Crc16
            }
            Command::GetInfo
            | Command::SetWorkingArea
            | Command::GetWorkingArea
            | Command::SetBaudRate
            | Command::GetWorkingChannel
            | Command::SetWorkingChannel
            | Command::SetFrequencyHopping
            | Command::SetTransmitPower
            | Command::GetTransmitPower => Integrity::Checksum,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(code)
    }
}

/// A validated frame with delimiters, length and integrity stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub payload: Vec<u8>,
}

/// Outcome of feeding the bytes received so far to [`decode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// No complete frame yet. The first `garbage` bytes can never start one
    /// and may be dropped.
    Incomplete { garbage: usize },
    Complete(Frame),
}

/// Append a complete frame for `command` to `buf`.
///
/// Nothing is appended if the frame would not fit.
pub fn encode_into(buf: &mut FrameBuffer, command: Command, payload: &[u8]) -> Result<(), UhfError> {
    let integrity = command.integrity();
    let len = 1 + payload.len() + integrity.width();
    if len > u8::MAX as usize {
        return Err(UhfError::MemoryOverrun(format!(
            "payload of {} bytes does not fit in one frame",
            payload.len()
        )));
    }
    let frame_len = len + 3;
    if buf.len() + frame_len > buf.capacity() {
        return Err(UhfError::MemoryOverrun(format!(
            "{}-byte frame exceeds buffer capacity {}",
            frame_len,
            buf.capacity()
        )));
    }

    let start = buf.len();
    buf.push(FRAME_DELIMITER)?;
    buf.push(len as u8)?;
    buf.push(command.code())?;
    buf.append(payload)?;
    let field = integrity.field(&buf.as_slice()[start + 1..]);
    buf.append(&field)?;
    buf.push(FRAME_DELIMITER)
}

/// Build a standalone frame
pub fn encode(command: Command, payload: &[u8]) -> Result<Vec<u8>, UhfError> {
    let mut buf = FrameBuffer::new(MAX_FRAME_LEN);
    encode_into(&mut buf, command, payload)?;
    Ok(buf.as_slice().to_vec())
}

/// What one `0x7E` position holds
enum Candidate {
    Frame(Frame),
    /// Could still become a frame once more bytes arrive
    Partial,
    /// Cannot be a frame. `closing` is the offset of its closing delimiter,
    /// when it had one.
    Rejected { reason: String, closing: Option<usize> },
}

fn candidate(frame: &[u8]) -> Candidate {
    if frame.len() < 3 {
        return Candidate::Partial;
    }

    let command = match Command::try_from(frame[2]) {
        Ok(command) => command,
        Err(code) => {
            return Candidate::Rejected {
                reason: format!("unknown command 0x{:02X}", code),
                closing: None,
            };
        }
    };

    let integrity = command.integrity();
    let len = frame[1] as usize;
    if len < 1 + integrity.width() {
        return Candidate::Rejected {
            reason: format!(
                "declared length {} too short for command 0x{:02X}",
                len,
                command.code()
            ),
            closing: None,
        };
    }

    let total = len + 3;
    if frame.len() < total {
        return Candidate::Partial;
    }

    if frame[total - 1] != FRAME_DELIMITER {
        return Candidate::Rejected {
            reason: format!("missing end delimiter, found 0x{:02X}", frame[total - 1]),
            closing: None,
        };
    }

    let integrity_at = 2 + len - integrity.width();
    let expected = integrity.field(&frame[1..integrity_at]);
    let received = &frame[integrity_at..integrity_at + integrity.width()];
    if received != &expected[..] {
        return Candidate::Rejected {
            reason: format!(
                "{:?} mismatch: expected {:02X?}, got {:02X?}",
                integrity, expected, received
            ),
            closing: Some(total - 1),
        };
    }

    Candidate::Frame(Frame {
        command,
        payload: frame[3..integrity_at].to_vec(),
    })
}

/// Look for one frame in `bytes`.
///
/// Every `0x7E` is tried as a frame start, so stale bytes and fake headers
/// ahead of the real frame are passed over. The first candidate that verifies
/// wins. Otherwise the earliest candidate still waiting for bytes is reported
/// as `Incomplete`, and only when none is left does a rejected candidate
/// become a `ValidationFail`. A delimiter that closed a rejected candidate and
/// ends the buffer is not treated as a new start.
pub fn decode(bytes: &[u8]) -> Result<Decoded, UhfError> {
    let mut partial = None;
    let mut rejected = None;
    let mut closed_at = None;
    let mut offset = 0;

    while let Some(pos) = bytes[offset..].iter().position(|&b| b == FRAME_DELIMITER) {
        let start = offset + pos;
        offset = start + 1;

        match candidate(&bytes[start..]) {
            Candidate::Frame(frame) => return Ok(Decoded::Complete(frame)),
            Candidate::Partial => {
                let lone_closer = closed_at == Some(start) && offset == bytes.len();
                if !lone_closer && partial.is_none() {
                    partial = Some(start);
                }
            }
            Candidate::Rejected { reason, closing } => {
                debug!("Passing over delimiter at offset {}: {}", start, reason);
                if let Some(closing) = closing {
                    closed_at = Some(start + closing);
                }
                if rejected.is_none() {
                    rejected = Some(reason);
                }
            }
        }
    }

    match (partial, rejected) {
        (Some(garbage), _) => Ok(Decoded::Incomplete { garbage }),
        (None, Some(reason)) => Err(UhfError::ValidationFail(reason)),
        (None, None) => Ok(Decoded::Incomplete {
            garbage: bytes.len(),
        }),
    }
}
