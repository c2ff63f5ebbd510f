//! Tag memory, regulatory area and module identity types

use crate::error::UhfError;

/// Link speeds the module can be switched to
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

pub const DEFAULT_BAUD_RATE: u32 = 115200;

pub const MIN_POWER_DBM: u16 = 18;
pub const MAX_POWER_DBM: u16 = 26;

/// Tag memory banks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemoryBank {
    Reserved = 0x00,
    Epc = 0x01,
    Tid = 0x02,
    User = 0x03,
}

impl MemoryBank {
    pub const ALL: [MemoryBank; 4] = [
        MemoryBank::Reserved,
        MemoryBank::Epc,
        MemoryBank::Tid,
        MemoryBank::User,
    ];

    /// Largest addressable word count of the bank
    pub fn max_words(self) -> u16 {
        match self {
            MemoryBank::Reserved => 4,
            MemoryBank::Epc => 32,
            MemoryBank::Tid => 16,
            MemoryBank::User => 32,
        }
    }

    pub fn max_bytes(self) -> usize {
        self.max_words() as usize * 2
    }

    /// Writes to this bank need a non-zero access password
    pub fn write_requires_password(self) -> bool {
        matches!(self, MemoryBank::Reserved)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Regulatory region the module radiates in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkingArea {
    China900 = 0x01,
    Us = 0x02,
    Europe = 0x03,
    China800 = 0x04,
    Korea = 0x06,
}

impl WorkingArea {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn channel_count(self) -> u8 {
        match self {
            WorkingArea::China900 => 20,
            WorkingArea::Us => 52,
            WorkingArea::Europe => 15,
            WorkingArea::China800 => 20,
            WorkingArea::Korea => 32,
        }
    }

    /// Frequency of channel 0 in MHz
    pub fn base_frequency(self) -> f64 {
        match self {
            WorkingArea::China900 => 920.125,
            WorkingArea::Us => 902.25,
            WorkingArea::Europe => 865.1,
            WorkingArea::China800 => 840.125,
            WorkingArea::Korea => 917.1,
        }
    }

    /// Channel spacing in MHz
    pub fn channel_spacing(self) -> f64 {
        match self {
            WorkingArea::China900 | WorkingArea::China800 => 0.25,
            WorkingArea::Us => 0.5,
            WorkingArea::Europe | WorkingArea::Korea => 0.2,
        }
    }

    /// ETSI operation is listen-before-talk, not hopping
    pub fn supports_hopping(self) -> bool {
        !matches!(self, WorkingArea::Europe)
    }

    pub fn is_valid_channel(self, channel: u8) -> bool {
        channel < self.channel_count()
    }

    pub fn frequency_from_channel(self, channel: u8) -> f64 {
        self.base_frequency() + channel as f64 * self.channel_spacing()
    }

    /// Nearest channel to `frequency_mhz`, or `None` outside the area's band
    pub fn channel_from_frequency(self, frequency_mhz: f64) -> Option<u8> {
        let index = ((frequency_mhz - self.base_frequency()) / self.channel_spacing()).round();
        if !(0.0..f64::from(self.channel_count())).contains(&index) {
            return None;
        }
        Some(index as u8)
    }
}

impl TryFrom<u8> for WorkingArea {
    type Error = UhfError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(WorkingArea::China900),
            0x02 => Ok(WorkingArea::Us),
            0x03 => Ok(WorkingArea::Europe),
            0x04 => Ok(WorkingArea::China800),
            0x06 => Ok(WorkingArea::Korea),
            _ => Err(UhfError::ValidationFail(format!(
                "unknown working area code 0x{:02X}",
                code
            ))),
        }
    }
}

/// Lifecycle of a module handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Defaults only, nothing acknowledged yet
    Unconfigured,
    /// Baud rate and working area acknowledged
    Configured,
    /// Configured and transmit power acknowledged
    Active,
}

/// Identity strings reported by the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    hardware_version: String,
    software_version: String,
    manufacturer: String,
}

impl ModuleInfo {
    pub fn new(hardware_version: String, software_version: String, manufacturer: String) -> Self {
        Self {
            hardware_version,
            software_version,
            manufacturer,
        }
    }

    pub fn hardware_version(&self) -> &str {
        &self.hardware_version
    }

    pub fn software_version(&self) -> &str {
        &self.software_version
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }
}

/// An RFID tag, either returned by a poll or built by the caller to address one
#[derive(Debug, Clone, Default)]
pub struct Tag {
    epc: Vec<u8>,
    pc: u16,
    rssi: u8,
    banks: [Option<Vec<u8>>; 4],
    access_password: u32,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.epc == other.epc
    }
}

impl Tag {
    pub fn new(epc: Vec<u8>) -> Self {
        Self {
            epc,
            ..Self::default()
        }
    }

    pub(crate) fn from_poll(epc: Vec<u8>, pc: u16, rssi: u8) -> Self {
        Self {
            epc,
            pc,
            rssi,
            ..Self::default()
        }
    }

    pub fn epc(&self) -> &[u8] {
        &self.epc
    }

    /// EPC as an uppercase hex string
    pub fn epc_hex(&self) -> String {
        bytes_to_hex(&self.epc)
    }

    /// Protocol control word reported alongside the EPC
    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn rssi(&self) -> u8 {
        self.rssi
    }

    /// Zero means no password
    pub fn access_password(&self) -> u32 {
        self.access_password
    }

    pub fn set_access_password(&mut self, password: u32) {
        self.access_password = password;
    }

    pub fn bank(&self, bank: MemoryBank) -> Option<&[u8]> {
        self.banks[bank.index()].as_deref()
    }

    /// Replace the whole contents of a bank
    pub fn set_bank(&mut self, bank: MemoryBank, data: Vec<u8>) -> Result<(), UhfError> {
        if data.len() > bank.max_bytes() {
            return Err(UhfError::MemoryOverrun(format!(
                "{} bytes exceed the {:?} bank limit of {} bytes",
                data.len(),
                bank,
                bank.max_bytes()
            )));
        }
        self.banks[bank.index()] = Some(data);
        Ok(())
    }

    /// Store `data` read from `word_ptr` onwards, zero-filling any gap before it
    pub fn store_words(&mut self, bank: MemoryBank, word_ptr: u16, data: &[u8]) -> Result<(), UhfError> {
        let offset = word_ptr as usize * 2;
        let end = offset + data.len();
        if end > bank.max_bytes() {
            return Err(UhfError::MemoryOverrun(format!(
                "bytes {}..{} lie outside the {:?} bank",
                offset, end, bank
            )));
        }

        let contents = self.banks[bank.index()].get_or_insert_with(Vec::new);
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[offset..end].copy_from_slice(data);
        Ok(())
    }

    pub fn clear_bank(&mut self, bank: MemoryBank) {
        self.banks[bank.index()] = None;
    }
}

/// Uppercase hex, two digits per byte
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0xE2, 0x00, 0x0A]), "E2000A");
        assert_eq!(bytes_to_hex(&[]), "");
    }

    #[test]
    fn test_area_frequencies() {
        assert_eq!(WorkingArea::Us.base_frequency(), 902.25);
        assert_eq!(WorkingArea::Europe.base_frequency(), 865.1);
        assert_eq!(WorkingArea::China900.channel_spacing(), 0.25);
        // US: 902.25 + (10 * 0.5) = 907.25 MHz
        assert_eq!(WorkingArea::Us.frequency_from_channel(10), 907.25);
        assert_eq!(WorkingArea::Us.channel_from_frequency(907.25), Some(10));
    }

    #[test]
    fn test_channel_from_frequency_outside_band() {
        assert_eq!(WorkingArea::Europe.channel_from_frequency(865.1), Some(0));
        assert_eq!(WorkingArea::Europe.channel_from_frequency(867.9), Some(14));
        assert_eq!(WorkingArea::Europe.channel_from_frequency(868.1), None);
        assert_eq!(WorkingArea::Europe.channel_from_frequency(860.0), None);
        assert_eq!(WorkingArea::Us.channel_from_frequency(2400.0), None);
        assert_eq!(WorkingArea::Us.channel_from_frequency(f64::NAN), None);
    }

    #[test]
    fn test_area_channel_bounds() {
        assert!(WorkingArea::Europe.is_valid_channel(14));
        assert!(!WorkingArea::Europe.is_valid_channel(15));
        assert!(WorkingArea::Us.is_valid_channel(51));
        assert!(!WorkingArea::Us.is_valid_channel(52));
    }

    #[test]
    fn test_area_try_from() {
        assert_eq!(WorkingArea::try_from(0x02).unwrap(), WorkingArea::Us);
        assert_eq!(WorkingArea::try_from(0x06).unwrap(), WorkingArea::Korea);
        assert!(matches!(
            WorkingArea::try_from(0x05),
            Err(UhfError::ValidationFail(_))
        ));
    }

    #[test]
    fn test_area_hopping_support() {
        assert!(WorkingArea::Us.supports_hopping());
        assert!(!WorkingArea::Europe.supports_hopping());
    }

    #[test]
    fn test_bank_limits() {
        assert_eq!(MemoryBank::Epc.max_words(), 32);
        assert_eq!(MemoryBank::Reserved.max_bytes(), 8);
        assert!(MemoryBank::Reserved.write_requires_password());
        assert!(!MemoryBank::User.write_requires_password());
    }

    #[test]
    fn test_tag_equality_is_by_epc() {
        let mut a = Tag::new(vec![0xE2, 0x00]);
        let b = Tag::new(vec![0xE2, 0x00]);
        a.set_access_password(0x1234);
        assert_eq!(a, b);
        assert_ne!(a, Tag::new(vec![0xE2, 0x01]));
    }

    #[test]
    fn test_tag_set_bank_bound() {
        let mut tag = Tag::new(vec![0x01]);
        assert!(tag.set_bank(MemoryBank::Tid, vec![0; 32]).is_ok());
        assert!(matches!(
            tag.set_bank(MemoryBank::Tid, vec![0; 33]),
            Err(UhfError::MemoryOverrun(_))
        ));
        assert_eq!(tag.bank(MemoryBank::Tid).map(|b| b.len()), Some(32));
    }

    #[test]
    fn test_tag_store_words_at_offset() {
        let mut tag = Tag::new(vec![0x01]);
        tag.store_words(MemoryBank::User, 1, &[0xAA, 0xBB]).unwrap();
        assert_eq!(tag.bank(MemoryBank::User), Some(&[0x00, 0x00, 0xAA, 0xBB][..]));

        tag.store_words(MemoryBank::User, 0, &[0x11, 0x22]).unwrap();
        assert_eq!(tag.bank(MemoryBank::User), Some(&[0x11, 0x22, 0xAA, 0xBB][..]));
    }

    #[test]
    fn test_tag_store_words_overrun_leaves_bank_alone() {
        let mut tag = Tag::new(vec![0x01]);
        let result = tag.store_words(MemoryBank::Reserved, 3, &[0; 4]);
        assert!(matches!(result, Err(UhfError::MemoryOverrun(_))));
        assert!(tag.bank(MemoryBank::Reserved).is_none());
    }
}
