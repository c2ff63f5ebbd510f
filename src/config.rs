//! Handle configuration: link speed the transport was opened at, and timing.

use std::time::Duration;

use crate::error::UhfError;
use crate::frame::{MAX_FRAME_LEN, MIN_FRAME_LEN};
use crate::types::{DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};

#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Speed the transport is currently running at
    pub baud_rate: u32,

    /// Timeout handed to each transport read
    pub response_timeout: Duration,

    /// Pause between sending a command and the first read
    pub settle_delay: Duration,

    /// Bytes requested per transport read
    pub read_chunk: usize,

    /// Frame buffer ceiling
    pub frame_capacity: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout: Duration::from_millis(500),
            settle_delay: Duration::from_millis(200),
            read_chunk: 64,
            frame_capacity: MAX_FRAME_LEN,
        }
    }
}

impl ModuleConfig {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk;
        self
    }

    pub fn with_frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), UhfError> {
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(UhfError::RejectedConfiguration(format!(
                "unsupported baud rate {}",
                self.baud_rate
            )));
        }
        if self.frame_capacity < MIN_FRAME_LEN {
            return Err(UhfError::RejectedConfiguration(format!(
                "frame capacity {} is below the smallest frame ({} bytes)",
                self.frame_capacity, MIN_FRAME_LEN
            )));
        }
        if self.read_chunk == 0 {
            return Err(UhfError::RejectedConfiguration(
                "read chunk must be at least 1 byte".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ModuleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.frame_capacity, 258);
    }

    #[test]
    fn test_rejects_unsupported_baud() {
        let config = ModuleConfig::default().with_baud_rate(14400);
        assert!(matches!(
            config.validate(),
            Err(UhfError::RejectedConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_tiny_buffer() {
        let config = ModuleConfig::default().with_frame_capacity(4);
        assert!(matches!(
            config.validate(),
            Err(UhfError::RejectedConfiguration(_))
        ));
    }
}
