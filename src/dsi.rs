//! MIPI-DSI command transport.
//!
//! The panel logic never talks to a bus directly. It describes packets and
//! hands them to a [`DsiHost`], batching them in a [`DcsBuffer`] so that a
//! whole register sequence is transmitted in one go.

use crate::error::DsiError;
use crate::mode::DscConfig;
use log::{trace, warn};

/// Standard DCS command bytes used by the panels.
pub mod dcs {
    /// Switch the panel into normal (non-partial, non-idle) display mode.
    pub const ENTER_NORMAL_MODE: u8 = 0x13;
    /// Write display brightness value (DBV), big-endian.
    pub const SET_DISPLAY_BRIGHTNESS: u8 = 0x51;
    /// Write CTRL display (backlight control, dimming).
    pub const WRITE_CONTROL_DISPLAY: u8 = 0x53;
    /// Enter idle mode (reduced color depth, used for AOD).
    pub const ENTER_IDLE_MODE: u8 = 0x39;
    /// Exit idle mode.
    pub const EXIT_IDLE_MODE: u8 = 0x38;
    /// Turn the display output on.
    pub const SET_DISPLAY_ON: u8 = 0x29;
    /// Turn the display output off.
    pub const SET_DISPLAY_OFF: u8 = 0x28;
    /// Enter sleep mode.
    pub const ENTER_SLEEP_MODE: u8 = 0x10;
    /// Exit sleep mode.
    pub const EXIT_SLEEP_MODE: u8 = 0x11;
    /// Enable the tearing-effect output.
    pub const SET_TEAR_ON: u8 = 0x35;
    /// Set the TE scanline.
    pub const SET_TEAR_SCANLINE: u8 = 0x44;
    /// Select gamma curve.
    pub const SET_GAMMA_CURVE: u8 = 0x26;
    /// Set column address window.
    pub const SET_COLUMN_ADDRESS: u8 = 0x2A;
    /// Set page address window.
    pub const SET_PAGE_ADDRESS: u8 = 0x2B;
}

/// Bit 0x20 of `WRCTRLD`: brightness control block on.
pub const WRCTRLD_BCTRL_BIT: u8 = 0x20;
/// Bit 0x08 of `WRCTRLD`: dimming on.
pub const WRCTRLD_DIMMING_BIT: u8 = 0x08;

/// A MIPI-DSI host controller able to carry panel commands.
///
/// Implementations may queue packets written with [`DsiHost::write`] and
/// transmit them when [`DsiHost::flush`] is called.
pub trait DsiHost {
    /// Queue or send a single write packet (command byte plus parameters).
    fn write(&mut self, payload: &[u8]) -> Result<(), DsiError>;

    /// Transmit everything written since the previous flush.
    fn flush(&mut self) -> Result<(), DsiError> {
        Ok(())
    }

    /// Read `buf.len()` bytes from DCS register `cmd`, returning how many were read.
    fn dcs_read(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, DsiError>;

    /// Enable or disable display stream compression on the link.
    fn set_compression(&mut self, enable: bool) -> Result<(), DsiError> {
        let _ = enable;
        Ok(())
    }

    /// Send the picture parameter set for `dsc`.
    fn write_pps(&mut self, dsc: &DscConfig) -> Result<(), DsiError> {
        let _ = dsc;
        Ok(())
    }
}

impl<T: DsiHost + ?Sized> DsiHost for &mut T {
    fn write(&mut self, payload: &[u8]) -> Result<(), DsiError> {
        (**self).write(payload)
    }

    fn flush(&mut self) -> Result<(), DsiError> {
        (**self).flush()
    }

    fn dcs_read(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, DsiError> {
        (**self).dcs_read(cmd, buf)
    }

    fn set_compression(&mut self, enable: bool) -> Result<(), DsiError> {
        (**self).set_compression(enable)
    }

    fn write_pps(&mut self, dsc: &DscConfig) -> Result<(), DsiError> {
        (**self).write_pps(dsc)
    }
}

/// Per-transaction scratch buffer of DSI packets.
///
/// [`add`](Self::add) only queues; nothing reaches the host until
/// [`flush`](Self::flush) or one of the `*_and_flush` helpers runs.
pub struct DcsBuffer<'a> {
    host: &'a mut dyn DsiHost,
    pending: Vec<Vec<u8>>,
}

impl<'a> DcsBuffer<'a> {
    /// Start an empty batch on `host`.
    pub fn new(host: &'a mut dyn DsiHost) -> Self {
        Self {
            host,
            pending: Vec::new(),
        }
    }

    /// Queue one packet.
    pub fn add(&mut self, payload: &[u8]) -> &mut Self {
        self.pending.push(payload.to_vec());
        self
    }

    /// Queue one packet and transmit the batch.
    pub fn add_and_flush(&mut self, payload: &[u8]) -> Result<(), DsiError> {
        self.add(payload);
        self.flush()
    }

    /// Transmit a single packet immediately, after anything already queued.
    pub fn write(&mut self, payload: &[u8]) -> Result<(), DsiError> {
        self.add_and_flush(payload)
    }

    /// Number of packets waiting for a flush.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Transmit every queued packet as one batch.
    ///
    /// On failure the remaining packets are dropped so the next batch
    /// starts clean.
    pub fn flush(&mut self) -> Result<(), DsiError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        trace!("flushing {} DSI packets", self.pending.len());
        let packets = std::mem::take(&mut self.pending);
        for packet in &packets {
            self.host.write(packet)?;
        }
        self.host.flush()
    }

    /// Flush, then read `buf.len()` bytes from register `cmd`.
    pub fn read(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, DsiError> {
        self.flush()?;
        self.host.dcs_read(cmd, buf)
    }

    /// Flush, then toggle link compression.
    pub fn set_compression(&mut self, enable: bool) -> Result<(), DsiError> {
        self.flush()?;
        self.host.set_compression(enable)
    }

    /// Flush, then send the picture parameter set.
    pub fn write_pps(&mut self, dsc: &DscConfig) -> Result<(), DsiError> {
        self.flush()?;
        self.host.write_pps(dsc)
    }
}

impl Drop for DcsBuffer<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!("dropping {} unflushed DSI packets", self.pending.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDsi;

    #[test]
    fn test_add_does_not_transmit_until_flush() {
        let mut dsi = MockDsi::new();
        {
            let mut buf = DcsBuffer::new(&mut dsi);
            buf.add(&[0xF0, 0x5A, 0x5A]).add(&[0xB9, 0x04]);
            assert_eq!(buf.pending(), 2);
        }
        assert!(dsi.packets().is_empty());
    }

    #[test]
    fn test_add_and_flush_sends_batch_in_order() {
        let mut dsi = MockDsi::new();
        {
            let mut buf = DcsBuffer::new(&mut dsi);
            buf.add(&[0xF0, 0x5A, 0x5A]);
            buf.add_and_flush(&[0xF0, 0xA5, 0xA5]).unwrap();
        }
        assert_eq!(
            dsi.packets(),
            vec![vec![0xF0, 0x5A, 0x5A], vec![0xF0, 0xA5, 0xA5]]
        );
        assert_eq!(dsi.flush_count(), 1);
    }

    #[test]
    fn test_failed_flush_drops_rest_of_batch() {
        let mut dsi = MockDsi::new();
        dsi.fail_writes_after(1);
        {
            let mut buf = DcsBuffer::new(&mut dsi);
            buf.add(&[0x01]).add(&[0x02]).add(&[0x03]);
            assert!(buf.flush().is_err());
            assert_eq!(buf.pending(), 0);
        }
        assert_eq!(dsi.packets(), vec![vec![0x01]]);
    }
}
