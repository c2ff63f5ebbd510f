//! Protocol driver for M100-class UHF RFID reader modules (EPC Gen2 / ISO 18000-6C).
//!
//! The driver frames commands, validates responses and keeps the module's
//! acknowledged configuration. Bytes move through any [`RfidTransport`].
//!
//! Every operation returns `Result<_, UhfError>`: `Ok` is success with its
//! payload, and the error says whether the frame was corrupt
//! ([`UhfError::ValidationFail`]), no tag answered ([`UhfError::NoTagResponse`]),
//! a bank bound was hit ([`UhfError::MemoryOverrun`]) or an argument was refused
//! before anything was sent ([`UhfError::RejectedConfiguration`]).
//!
//! # Features
//!
//! - `uart-esp32` - UART transport for ESP32 using esp-idf-svc
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! # Example
//!
//! ```ignore
//! use m100_uhf::{MemoryBank, SerialTransport, UhfError, UhfModule, WorkingArea};
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 115200)?;
//! let mut module = UhfModule::new(transport);
//!
//! module.set_baud_rate(115200)?;
//! module.set_working_area(WorkingArea::Europe)?;
//! module.set_transmitting_power(26)?;
//!
//! match module.single_poll() {
//!     Ok(mut tag) => {
//!         module.set_select(&tag)?;
//!         module.read_label_data_storage(&mut tag, MemoryBank::Tid, 0, 6)?;
//!         println!("{} TID {:02X?}", tag.epc_hex(), tag.bank(MemoryBank::Tid));
//!     }
//!     Err(UhfError::NoTagResponse) => println!("no tag in range"),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

mod buffer;
mod checksum;
mod config;
mod error;
mod frame;
mod reader;
mod response;
mod transport;
mod types;

#[cfg(feature = "uart-esp32")]
mod uart;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use buffer::FrameBuffer;
pub use checksum::{checksum, crc16_genibus};
pub use config::ModuleConfig;
pub use error::UhfError;
pub use frame::{
    Command, Decoded, FRAME_DELIMITER, Frame, Integrity, MAX_FRAME_LEN, MIN_FRAME_LEN, decode,
    encode, encode_into,
};
pub use reader::UhfModule;
pub use response::Status;
pub use transport::RfidTransport;
pub use types::{
    DEFAULT_BAUD_RATE, MAX_POWER_DBM, MIN_POWER_DBM, MemoryBank, ModuleInfo, ModuleState,
    SUPPORTED_BAUD_RATES, Tag, WorkingArea,
};

#[cfg(feature = "uart-esp32")]
pub use uart::UartTransport;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
