//! Status interpretation and payload parsers for response frames.
//!
//! Every response payload starts with a status byte. What follows depends on
//! the command that was answered.

use log::warn;

use crate::error::UhfError;
use crate::frame::Frame;
use crate::types::{ModuleInfo, Tag};

/// Status byte carried by every response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    ReadFail,
    WriteFail,
    InventoryFail,
    AccessFail,
    MemoryOverrun,
    MemoryLocked,
    InsufficientPower,
    NonSpecific,
    Other(u8),
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Status::Success,
            0x09 => Status::ReadFail,
            0x10 => Status::WriteFail,
            0x15 => Status::InventoryFail,
            0x16 => Status::AccessFail,
            0xA3 => Status::MemoryOverrun,
            0xA4 => Status::MemoryLocked,
            0xAB => Status::InsufficientPower,
            0xAF => Status::NonSpecific,
            other => Status::Other(other),
        }
    }
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Success => 0x00,
            Status::ReadFail => 0x09,
            Status::WriteFail => 0x10,
            Status::InventoryFail => 0x15,
            Status::AccessFail => 0x16,
            Status::MemoryOverrun => 0xA3,
            Status::MemoryLocked => 0xA4,
            Status::InsufficientPower => 0xAB,
            Status::NonSpecific => 0xAF,
            Status::Other(code) => code,
        }
    }

    /// Map the status onto the result taxonomy
    pub fn into_result(self) -> Result<(), UhfError> {
        match self {
            Status::Success => Ok(()),
            // The module answered but no tag did
            Status::InventoryFail | Status::ReadFail | Status::WriteFail => {
                Err(UhfError::NoTagResponse)
            }
            Status::MemoryOverrun => Err(UhfError::MemoryOverrun(
                "module reported access beyond the end of the bank".into(),
            )),
            rejected => Err(UhfError::ValidationFail(format!(
                "module rejected the request: {:?} (0x{:02X})",
                rejected,
                rejected.code()
            ))),
        }
    }
}

/// Check the status byte and return the rest of the payload
pub fn interpret(frame: &Frame) -> Result<&[u8], UhfError> {
    let Some((&status, body)) = frame.payload.split_first() else {
        return Err(UhfError::ValidationFail(format!(
            "response to 0x{:02X} carries no status byte",
            frame.command.code()
        )));
    };

    let status = Status::from(status);
    if status != Status::Success {
        warn!("Command {:?} answered with {:?}", frame.command, status);
    }
    status.into_result()?;
    Ok(body)
}

/// Three length-prefixed strings: hardware version, software version, manufacturer
pub fn parse_module_info(body: &[u8]) -> Result<ModuleInfo, UhfError> {
    let mut rest = body;
    let mut fields = Vec::with_capacity(3);

    for name in ["hardware version", "software version", "manufacturer"] {
        let Some((&len, tail)) = rest.split_first() else {
            return Err(UhfError::ValidationFail(format!("info response ends before {}", name)));
        };
        let len = len as usize;
        if tail.len() < len {
            return Err(UhfError::ValidationFail(format!(
                "{} claims {} bytes but only {} remain",
                name,
                len,
                tail.len()
            )));
        }
        fields.push(String::from_utf8_lossy(&tail[..len]).to_string());
        rest = &tail[len..];
    }

    if !rest.is_empty() {
        return Err(UhfError::ValidationFail(format!(
            "{} trailing bytes after module info",
            rest.len()
        )));
    }

    let manufacturer = fields.pop().unwrap_or_default();
    let software_version = fields.pop().unwrap_or_default();
    let hardware_version = fields.pop().unwrap_or_default();
    Ok(ModuleInfo::new(hardware_version, software_version, manufacturer))
}

/// RSSI, PC word, EPC. An empty body means no tag was inventoried.
pub fn parse_tag(body: &[u8]) -> Result<Tag, UhfError> {
    if body.is_empty() {
        return Err(UhfError::NoTagResponse);
    }
    if body.len() < 3 {
        return Err(UhfError::ValidationFail(format!(
            "tag response too short: {} bytes",
            body.len()
        )));
    }

    let rssi = body[0];
    let pc = u16::from_be_bytes([body[1], body[2]]);
    let epc = &body[3..];

    // PC bits 15..11 hold the EPC length in words
    let declared = ((pc >> 11) as usize) * 2;
    if declared != epc.len() {
        return Err(UhfError::ValidationFail(format!(
            "PC 0x{:04X} declares {} EPC bytes, response carries {}",
            pc,
            declared,
            epc.len()
        )));
    }

    Ok(Tag::from_poll(epc.to_vec(), pc, rssi))
}

/// Bank data must be exactly the requested number of words
pub fn parse_bank_data(body: &[u8], word_count: u16) -> Result<Vec<u8>, UhfError> {
    let expected = word_count as usize * 2;
    if body.len() > expected {
        return Err(UhfError::MemoryOverrun(format!(
            "module returned {} bytes for a {}-word read",
            body.len(),
            word_count
        )));
    }
    if body.len() < expected {
        return Err(UhfError::ValidationFail(format!(
            "module returned {} bytes for a {}-word read",
            body.len(),
            word_count
        )));
    }
    Ok(body.to_vec())
}

pub fn parse_u8(body: &[u8]) -> Result<u8, UhfError> {
    match body {
        [value] => Ok(*value),
        _ => Err(UhfError::ValidationFail(format!(
            "expected 1 byte, got {}",
            body.len()
        ))),
    }
}

pub fn parse_u16(body: &[u8]) -> Result<u16, UhfError> {
    match body {
        [msb, lsb] => Ok(u16::from_be_bytes([*msb, *lsb])),
        _ => Err(UhfError::ValidationFail(format!(
            "expected 2 bytes, got {}",
            body.len()
        ))),
    }
}

/// Acknowledgement-only responses carry nothing after the status
pub fn expect_empty(body: &[u8]) -> Result<(), UhfError> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(UhfError::ValidationFail(format!(
            "unexpected {} bytes after acknowledgement",
            body.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Command;

    fn frame(command: Command, payload: &[u8]) -> Frame {
        Frame {
            command,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(Status::from(0x00).into_result().is_ok());
        assert_eq!(Status::from(0x15).into_result(), Err(UhfError::NoTagResponse));
        assert_eq!(Status::from(0x09).into_result(), Err(UhfError::NoTagResponse));
        assert!(matches!(
            Status::from(0xA3).into_result(),
            Err(UhfError::MemoryOverrun(_))
        ));
        assert!(matches!(
            Status::from(0x16).into_result(),
            Err(UhfError::ValidationFail(_))
        ));
        assert_eq!(Status::from(0x42), Status::Other(0x42));
        assert_eq!(Status::Other(0x42).code(), 0x42);
    }

    #[test]
    fn test_interpret_requires_status() {
        assert!(matches!(
            interpret(&frame(Command::GetInfo, &[])),
            Err(UhfError::ValidationFail(_))
        ));
        assert_eq!(interpret(&frame(Command::GetInfo, &[0x00, 0x01])).unwrap(), &[0x01]);
    }

    #[test]
    fn test_parse_module_info() {
        let body = [
            0x04, b'M', b'1', b'0', b'0', // hardware
            0x03, b'1', b'.', b'2', // software
            0x03, b'J', b'R', b'D', // manufacturer
        ];
        let info = parse_module_info(&body).unwrap();
        assert_eq!(info.hardware_version(), "M100");
        assert_eq!(info.software_version(), "1.2");
        assert_eq!(info.manufacturer(), "JRD");
    }

    #[test]
    fn test_parse_module_info_allows_empty_and_nul_fields() {
        let body = [0x00, 0x02, 0x00, b'x', 0x01, 0x00];
        let info = parse_module_info(&body).unwrap();
        assert_eq!(info.hardware_version(), "");
        assert_eq!(info.software_version(), "\0x");
        assert_eq!(info.manufacturer(), "\0");
    }

    #[test]
    fn test_parse_module_info_truncated() {
        let body = [0x04, b'M', b'1'];
        assert!(matches!(parse_module_info(&body), Err(UhfError::ValidationFail(_))));
    }

    #[test]
    fn test_parse_tag() {
        // PC 0x3000: 6 words of EPC
        let body = [
            0xC8, 0x30, 0x00, 0xE2, 0x00, 0x68, 0x16, 0x00, 0x00, 0x00, 0x60, 0x12, 0x34, 0x56,
            0x78,
        ];
        let tag = parse_tag(&body).unwrap();
        assert_eq!(tag.rssi(), 0xC8);
        assert_eq!(tag.pc(), 0x3000);
        assert_eq!(tag.epc_hex(), "E20068160000006012345678");
    }

    #[test]
    fn test_parse_tag_empty_is_no_tag() {
        assert_eq!(parse_tag(&[]), Err(UhfError::NoTagResponse));
    }

    #[test]
    fn test_parse_tag_length_mismatch() {
        let body = [0xC8, 0x30, 0x00, 0xE2, 0x00];
        assert!(matches!(parse_tag(&body), Err(UhfError::ValidationFail(_))));
    }

    #[test]
    fn test_parse_bank_data() {
        assert_eq!(parse_bank_data(&[1, 2, 3, 4], 2).unwrap(), vec![1, 2, 3, 4]);
        assert!(matches!(
            parse_bank_data(&[1, 2, 3, 4, 5, 6], 2),
            Err(UhfError::MemoryOverrun(_))
        ));
        assert!(matches!(
            parse_bank_data(&[1, 2], 2),
            Err(UhfError::ValidationFail(_))
        ));
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_u8(&[0x07]).unwrap(), 0x07);
        assert!(parse_u8(&[]).is_err());
        assert_eq!(parse_u16(&[0x0A, 0x28]).unwrap(), 2600);
        assert!(parse_u16(&[0x0A]).is_err());
        assert!(expect_empty(&[]).is_ok());
        assert!(expect_empty(&[0x00]).is_err());
    }
}
