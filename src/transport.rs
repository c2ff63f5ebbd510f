/// Byte link between the driver and one M100 module.
/// The module handle owns one and drives it with blocking request/response exchanges.
///
/// A read that times out without data must return `Ok(0)`; the driver treats
/// that as the module not answering.
pub trait RfidTransport {
    /// Backend error, surfaced as `UhfError::Transport`
    type Error: std::fmt::Debug;

    /// Send a complete encoded frame
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read up to `buf.len()` bytes, waiting at most `timeout_ms` for the first one
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Drop any bytes received but not yet read
    fn clear_input(&mut self) -> Result<(), Self::Error>;

    /// Switch the host side of the link to a new speed
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error>;
}
