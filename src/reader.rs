use log::{debug, error, info, warn};

use crate::buffer::FrameBuffer;
use crate::config::ModuleConfig;
use crate::error::UhfError;
use crate::frame::{self, Command, Decoded, Frame};
use crate::response::{self, expect_empty, interpret};
use crate::transport::RfidTransport;
use crate::types::{
    MemoryBank, ModuleInfo, ModuleState, SUPPORTED_BAUD_RATES, Tag, WorkingArea, MAX_POWER_DBM,
    MIN_POWER_DBM,
};

/// Driver handle for one module on one serial line.
///
/// Every command is a blocking request/response exchange. Cached configuration
/// only ever reflects values the module has acknowledged.
pub struct UhfModule<T: RfidTransport> {
    transport: T,
    config: ModuleConfig,
    buffer: FrameBuffer,
    info: Option<ModuleInfo>,
    baud_rate: u32,
    area: WorkingArea,
    channel: u8,
    power_dbm: u16,
    freq_hopping: bool,
    baud_acknowledged: bool,
    area_acknowledged: bool,
    power_acknowledged: bool,
}

impl<T: RfidTransport> UhfModule<T> {
    const DEFAULT_AREA: WorkingArea = WorkingArea::Us;

    // Select parameters: target S0, action 0, EPC bank, mask starts after CRC and PC
    const SELECT_PARAM: u8 = MemoryBank::Epc as u8;
    const SELECT_EPC_POINTER_BITS: u32 = 0x20;
    const MAX_SELECT_MASK_BYTES: usize = 31;

    const HOPPING_ENABLED: u8 = 0xFF;
    const HOPPING_DISABLED: u8 = 0x00;

    /// Create a handle with the default configuration
    pub fn new(transport: T) -> Self {
        Self::build(transport, ModuleConfig::default())
    }

    pub fn with_config(transport: T, config: ModuleConfig) -> Result<Self, UhfError> {
        config.validate()?;
        Ok(Self::build(transport, config))
    }

    fn build(transport: T, config: ModuleConfig) -> Self {
        Self {
            transport,
            buffer: FrameBuffer::new(config.frame_capacity),
            info: None,
            baud_rate: config.baud_rate,
            area: Self::DEFAULT_AREA,
            channel: 0,
            power_dbm: MAX_POWER_DBM,
            freq_hopping: false,
            baud_acknowledged: false,
            area_acknowledged: false,
            power_acknowledged: false,
            config,
        }
    }

    pub fn state(&self) -> ModuleState {
        if !(self.baud_acknowledged && self.area_acknowledged) {
            ModuleState::Unconfigured
        } else if !self.power_acknowledged {
            ModuleState::Configured
        } else {
            ModuleState::Active
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn working_area(&self) -> WorkingArea {
        self.area
    }

    pub fn working_channel(&self) -> u8 {
        self.channel
    }

    /// Transmit power in dBm
    pub fn transmitting_power(&self) -> u16 {
        self.power_dbm
    }

    pub fn freq_hopping(&self) -> bool {
        self.freq_hopping
    }

    /// Identity strings from the last successful [`get_module_info`](Self::get_module_info)
    pub fn module_info(&self) -> Option<&ModuleInfo> {
        self.info.as_ref()
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    // ========================================================================
    // Module identity
    // ========================================================================

    /// Fetch the identity strings, replacing any cached copy
    pub fn get_module_info(&mut self) -> Result<&ModuleInfo, UhfError> {
        let frame = self.exec(Command::GetInfo, &[])?;
        let info = response::parse_module_info(interpret(&frame)?)?;
        debug!(
            "Module info: hw={:?} sw={:?} manufacturer={:?}",
            info.hardware_version(),
            info.software_version(),
            info.manufacturer()
        );
        let info = self.info.insert(info);
        Ok(&*info)
    }

    pub fn hardware_version(&mut self) -> Result<&str, UhfError> {
        Ok(self.cached_info()?.hardware_version())
    }

    pub fn software_version(&mut self) -> Result<&str, UhfError> {
        Ok(self.cached_info()?.software_version())
    }

    pub fn manufacturer(&mut self) -> Result<&str, UhfError> {
        Ok(self.cached_info()?.manufacturer())
    }

    fn cached_info(&mut self) -> Result<&ModuleInfo, UhfError> {
        if self.info.is_none() {
            self.get_module_info()?;
        }
        self.info
            .as_ref()
            .ok_or_else(|| UhfError::ValidationFail("module info unavailable".into()))
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Change the link speed of the module, then of the host transport
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), UhfError> {
        if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
            return Err(UhfError::RejectedConfiguration(format!(
                "Baud rate {} not supported (choose one of {:?})",
                baud_rate, SUPPORTED_BAUD_RATES
            )));
        }

        let rate_code = (baud_rate / 100) as u16;
        self.acknowledge(Command::SetBaudRate, &rate_code.to_be_bytes())?;

        self.baud_rate = baud_rate;
        self.baud_acknowledged = true;
        info!("Module baud rate set to {}", baud_rate);

        self.transport
            .set_baud_rate(baud_rate)
            .map_err(|e| UhfError::Transport(format!("{:?}", e)))
    }

    /// Set the regulatory region.
    ///
    /// Moving to a different area resets the cached channel to 0, and clears the
    /// hopping flag if the new area does not hop.
    pub fn set_working_area(&mut self, area: WorkingArea) -> Result<(), UhfError> {
        self.acknowledge(Command::SetWorkingArea, &[area.code()])?;

        if area != self.area {
            self.channel = 0;
            if !area.supports_hopping() {
                self.freq_hopping = false;
            }
        }
        self.area = area;
        self.area_acknowledged = true;
        info!("Working area set to {:?}", area);
        Ok(())
    }

    /// Select a channel index within the current working area
    pub fn set_working_channel(&mut self, channel: u8) -> Result<(), UhfError> {
        if !self.area.is_valid_channel(channel) {
            return Err(UhfError::RejectedConfiguration(format!(
                "Channel {} out of range for {:?} (0-{})",
                channel,
                self.area,
                self.area.channel_count() - 1
            )));
        }

        self.acknowledge(Command::SetWorkingChannel, &[channel])?;
        self.channel = channel;
        info!(
            "Working channel set to {} ({:.3} MHz)",
            channel,
            self.area.frequency_from_channel(channel)
        );
        Ok(())
    }

    /// Set the radiated power in whole dBm, 18 to 26
    pub fn set_transmitting_power(&mut self, power_dbm: u16) -> Result<(), UhfError> {
        if !(MIN_POWER_DBM..=MAX_POWER_DBM).contains(&power_dbm) {
            return Err(UhfError::RejectedConfiguration(format!(
                "Transmit power {} dBm outside {}-{} dBm",
                power_dbm, MIN_POWER_DBM, MAX_POWER_DBM
            )));
        }

        let power = power_dbm * 100;
        self.acknowledge(Command::SetTransmitPower, &power.to_be_bytes())?;
        self.power_dbm = power_dbm;
        self.power_acknowledged = true;
        info!("Transmit power set to {} dBm", power_dbm);
        Ok(())
    }

    /// Enable or disable automatic frequency hopping
    pub fn set_freq_hopping(&mut self, enabled: bool) -> Result<(), UhfError> {
        if enabled && !self.area.supports_hopping() {
            return Err(UhfError::RejectedConfiguration(format!(
                "{:?} does not allow frequency hopping",
                self.area
            )));
        }

        let flag = if enabled {
            Self::HOPPING_ENABLED
        } else {
            Self::HOPPING_DISABLED
        };
        self.acknowledge(Command::SetFrequencyHopping, &[flag])?;
        self.freq_hopping = enabled;
        info!("Frequency hopping {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Read the working area from the module and resync the cached value
    pub fn get_working_area(&mut self) -> Result<WorkingArea, UhfError> {
        let frame = self.exec(Command::GetWorkingArea, &[])?;
        let area = WorkingArea::try_from(response::parse_u8(interpret(&frame)?)?)?;
        self.area = area;
        Ok(area)
    }

    /// Read the working channel from the module and resync the cached value
    pub fn get_working_channel(&mut self) -> Result<u8, UhfError> {
        let frame = self.exec(Command::GetWorkingChannel, &[])?;
        let channel = response::parse_u8(interpret(&frame)?)?;
        if !self.area.is_valid_channel(channel) {
            return Err(UhfError::ValidationFail(format!(
                "module reports channel {} outside {:?}",
                channel, self.area
            )));
        }
        self.channel = channel;
        Ok(channel)
    }

    /// Read the transmit power in dBm and resync the cached value
    pub fn get_transmitting_power(&mut self) -> Result<u16, UhfError> {
        let frame = self.exec(Command::GetTransmitPower, &[])?;
        let power_raw = response::parse_u16(interpret(&frame)?)?;
        self.power_dbm = power_raw / 100;
        Ok(self.power_dbm)
    }

    // ========================================================================
    // Tag commands
    // ========================================================================

    /// Inventory once and return the tag that answered
    pub fn single_poll(&mut self) -> Result<Tag, UhfError> {
        self.note_state(Command::SinglePoll);
        let frame = self.exec(Command::SinglePoll, &[])?;
        let tag = response::parse_tag(interpret(&frame)?)?;
        debug!("Polled tag {} (RSSI {})", tag.epc_hex(), tag.rssi());
        Ok(tag)
    }

    /// Address subsequent reads and writes to the tag with this EPC
    pub fn set_select(&mut self, tag: &Tag) -> Result<(), UhfError> {
        let params = Self::select_params(tag)?;
        self.note_state(Command::SetSelect);
        self.acknowledge(Command::SetSelect, &params)
    }

    /// Read `word_count` words from the start of `bank` into `tag`
    pub fn read_label_data_storage(
        &mut self,
        tag: &mut Tag,
        bank: MemoryBank,
        access_pwd: u32,
        word_count: u16,
    ) -> Result<(), UhfError> {
        self.read_bank(tag, bank, access_pwd, 0, word_count)
    }

    /// Read `word_count` words of `bank` starting at `word_ptr` into `tag`.
    ///
    /// Reads whichever tag the module currently has selected. `tag` is only
    /// touched on success. A Reserved bank read that covers words 2-3 also
    /// refreshes the tag's access password.
    pub fn read_bank(
        &mut self,
        tag: &mut Tag,
        bank: MemoryBank,
        access_pwd: u32,
        word_ptr: u16,
        word_count: u16,
    ) -> Result<(), UhfError> {
        if word_count == 0 {
            return Err(UhfError::RejectedConfiguration(
                "Word count must be at least 1".into(),
            ));
        }
        Self::check_bank_bounds(bank, word_ptr, word_count)?;

        let mut params = Vec::with_capacity(9);
        params.extend_from_slice(&access_pwd.to_be_bytes());
        params.push(bank as u8);
        params.extend_from_slice(&word_ptr.to_be_bytes());
        params.extend_from_slice(&word_count.to_be_bytes());

        self.note_state(Command::ReadData);
        let frame = self.exec(Command::ReadData, &params)?;
        let data = response::parse_bank_data(interpret(&frame)?, word_count)?;

        tag.store_words(bank, word_ptr, &data)?;
        if bank == MemoryBank::Reserved {
            if let Some(pwd) = tag.bank(bank).and_then(|b| b.get(4..8)) {
                tag.set_access_password(u32::from_be_bytes([pwd[0], pwd[1], pwd[2], pwd[3]]));
            }
        }
        debug!("Read {} words of {:?} from word {}", word_count, bank, word_ptr);
        Ok(())
    }

    /// Write `saved_tag`'s copy of `bank` into `selected_tag`.
    ///
    /// Selects `selected_tag` first, then writes the saved bank contents from
    /// word `source_address` onwards to the same address on the selected tag.
    /// Reserved bank writes need a non-zero `access_pwd`.
    pub fn write_label_data_storage(
        &mut self,
        saved_tag: &Tag,
        selected_tag: &Tag,
        bank: MemoryBank,
        source_address: u16,
        access_pwd: u32,
    ) -> Result<(), UhfError> {
        if bank.write_requires_password() && access_pwd == 0 {
            return Err(UhfError::RejectedConfiguration(format!(
                "Writing the {:?} bank requires a non-zero access password",
                bank
            )));
        }

        let Some(source) = saved_tag.bank(bank) else {
            return Err(UhfError::RejectedConfiguration(format!(
                "Source tag holds no {:?} data",
                bank
            )));
        };

        let offset = source_address as usize * 2;
        if offset >= source.len() {
            return Err(UhfError::RejectedConfiguration(format!(
                "Nothing to write from word {} ({} bytes saved)",
                source_address,
                source.len()
            )));
        }
        let data = &source[offset..];
        if data.len() % 2 != 0 {
            return Err(UhfError::RejectedConfiguration(
                "Data length must be even (word-aligned)".into(),
            ));
        }

        let word_count = (data.len() / 2) as u16;
        Self::check_bank_bounds(bank, source_address, word_count)?;
        let select = Self::select_params(selected_tag)?;

        let mut params = Vec::with_capacity(9 + data.len());
        params.extend_from_slice(&access_pwd.to_be_bytes());
        params.push(bank as u8);
        params.extend_from_slice(&source_address.to_be_bytes());
        params.extend_from_slice(&word_count.to_be_bytes());
        params.extend_from_slice(data);

        self.note_state(Command::WriteData);
        self.acknowledge(Command::SetSelect, &select)?;
        self.acknowledge(Command::WriteData, &params)?;
        debug!(
            "Wrote {} words of {:?} at word {} to {}",
            word_count,
            bank,
            source_address,
            selected_tag.epc_hex()
        );
        Ok(())
    }

    fn select_params(tag: &Tag) -> Result<Vec<u8>, UhfError> {
        let epc = tag.epc();
        if epc.is_empty() {
            return Err(UhfError::RejectedConfiguration(
                "Cannot select a tag without an EPC".into(),
            ));
        }
        if epc.len() > Self::MAX_SELECT_MASK_BYTES {
            return Err(UhfError::RejectedConfiguration(format!(
                "EPC of {} bytes exceeds the {}-byte select mask",
                epc.len(),
                Self::MAX_SELECT_MASK_BYTES
            )));
        }

        let mut params = Vec::with_capacity(7 + epc.len());
        params.push(Self::SELECT_PARAM);
        params.extend_from_slice(&Self::SELECT_EPC_POINTER_BITS.to_be_bytes());
        params.push((epc.len() * 8) as u8);
        params.push(0x00); // no truncation
        params.extend_from_slice(epc);
        Ok(params)
    }

    fn check_bank_bounds(bank: MemoryBank, word_ptr: u16, word_count: u16) -> Result<(), UhfError> {
        let end = word_ptr as u32 + word_count as u32;
        if end > bank.max_words() as u32 {
            return Err(UhfError::MemoryOverrun(format!(
                "Words {}..{} exceed the {:?} bank ({} words)",
                word_ptr,
                end,
                bank,
                bank.max_words()
            )));
        }
        Ok(())
    }

    fn note_state(&self, command: Command) {
        let state = self.state();
        if state != ModuleState::Active {
            debug!("Issuing {:?} while module is {:?}", command, state);
        }
    }

    // ========================================================================
    // Exchange
    // ========================================================================

    /// Run an exchange whose response carries nothing but a success status
    fn acknowledge(&mut self, command: Command, params: &[u8]) -> Result<(), UhfError> {
        let frame = self.exec(command, params)?;
        expect_empty(interpret(&frame)?)
    }

    fn exec(&mut self, command: Command, params: &[u8]) -> Result<Frame, UhfError> {
        self.buffer.reset();
        frame::encode_into(&mut self.buffer, command, params)?;

        self.transport
            .clear_input()
            .map_err(|e| UhfError::Transport(format!("{:?}", e)))?;
        debug!("Sending {:?}: {:02X?}", command, self.buffer.as_slice());
        let written = self
            .transport
            .write(self.buffer.as_slice())
            .map_err(|e| UhfError::Transport(format!("{:?}", e)))?;
        let frame_len = self.buffer.len();
        self.buffer.reset();
        if written != frame_len {
            return Err(UhfError::Transport(format!(
                "Short write: {} of {} bytes",
                written, frame_len
            )));
        }

        if !self.config.settle_delay.is_zero() {
            std::thread::sleep(self.config.settle_delay);
        }

        let received = self.receive();
        self.buffer.reset();
        let frame = received?;

        if frame.command != command {
            return Err(UhfError::ValidationFail(format!(
                "Expected response to {:?}, got {:?}",
                command, frame.command
            )));
        }
        Ok(frame)
    }

    /// Accumulate bytes until one frame decodes or the transport goes quiet
    fn receive(&mut self) -> Result<Frame, UhfError> {
        let timeout_ms = self.config.response_timeout.as_millis().min(u32::MAX as u128) as u32;
        let mut chunk = vec![0u8; self.config.read_chunk];
        let max_received = self.buffer.capacity() * 4;
        let mut received = 0;

        loop {
            let room = self.buffer.capacity() - self.buffer.len();
            if room == 0 {
                return Err(UhfError::ValidationFail(format!(
                    "No complete frame within {} bytes",
                    self.buffer.capacity()
                )));
            }
            let want = room.min(chunk.len());

            let bytes_read = match self.transport.read(&mut chunk[..want], timeout_ms) {
                Ok(bytes_read) => bytes_read,
                Err(e) => {
                    error!("Read error: {:?}", e);
                    return Err(UhfError::Transport(format!("{:?}", e)));
                }
            };

            if bytes_read == 0 {
                return if self.buffer.is_empty() {
                    debug!("No response within {} ms", timeout_ms);
                    Err(UhfError::NoTagResponse)
                } else {
                    Err(UhfError::ValidationFail(format!(
                        "Timed out holding {} bytes of an incomplete frame: {:02X?}",
                        self.buffer.len(),
                        self.buffer.as_slice()
                    )))
                };
            }

            received += bytes_read;
            if received > max_received {
                return Err(UhfError::ValidationFail(format!(
                    "No frame found in {} bytes of input",
                    received
                )));
            }

            debug!("Received {} bytes: {:02X?}", bytes_read, &chunk[..bytes_read]);
            self.buffer.append(&chunk[..bytes_read])?;

            match frame::decode(self.buffer.as_slice())? {
                Decoded::Complete(frame) => return Ok(frame),
                Decoded::Incomplete { garbage } if garbage > 0 => {
                    warn!("Discarding {} bytes ahead of frame start", garbage);
                    self.buffer.discard_front(garbage);
                }
                Decoded::Incomplete { .. } => {}
            }
        }
    }
}
