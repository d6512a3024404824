//! Mock transport and display core for testing.
//!
//! [`MockDsi`] records every packet a panel transmits and serves canned
//! register reads. [`MockHost`] runs a fake monotonic clock that only moves
//! when the panel sleeps, waits for vblank, or the test advances it.
//!
//! # Example
//!
//! ```
//! use ct3_panel::{DisplayPanel, MockDsi, MockHost, Panel, PanelConfig};
//!
//! let mut panel = Panel::probe("google,gs-ct3e", MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
//! panel.set_mode("1080x2424@60:60").unwrap();
//! panel.prepare().unwrap();
//! panel.enable().unwrap();
//! assert_eq!(panel.dsi().packets().last(), Some(&vec![0x29]));
//! ```

use crate::dsi::DsiHost;
use crate::error::{DsiError, PanelError};
use crate::host::PanelHost;
use crate::mode::DscConfig;
use crate::thermal::BrightnessZone;

use embedded_hal::delay::DelayNs;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Frame period the mock vblank wait advances the clock by.
const VBLANK_PERIOD: Duration = Duration::from_micros(8333);

/// A DSI host that records packets instead of sending them.
#[derive(Debug, Default)]
pub struct MockDsi {
    packets: Vec<Vec<u8>>,
    flushes: usize,
    writes_left: Option<usize>,
    responses: HashMap<u8, Vec<u8>>,
    queued: HashMap<u8, VecDeque<Vec<u8>>>,
    reads: Vec<u8>,
    compression: bool,
    pps_sent: usize,
}

impl MockDsi {
    /// A transport that accepts every write and has no readable registers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every packet written so far, in order.
    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.packets.clone()
    }

    /// Whether `payload` was written at least once.
    pub fn sent(&self, payload: &[u8]) -> bool {
        self.packets.iter().any(|packet| packet == payload)
    }

    /// Position of the first packet equal to `payload`.
    pub fn position(&self, payload: &[u8]) -> Option<usize> {
        self.packets.iter().position(|packet| packet == payload)
    }

    /// Number of batch flushes.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Accept `n` more writes, then fail every write after them.
    pub fn fail_writes_after(&mut self, n: usize) {
        self.writes_left = Some(n);
    }

    /// Accept writes again.
    pub fn stop_failing(&mut self) {
        self.writes_left = None;
    }

    /// Forget recorded packets, flushes and reads.
    pub fn clear(&mut self) {
        self.packets.clear();
        self.reads.clear();
        self.flushes = 0;
    }

    /// Answer every read of `reg` with `bytes`.
    pub fn set_read_response(&mut self, reg: u8, bytes: &[u8]) {
        self.responses.insert(reg, bytes.to_vec());
    }

    /// Answer the next read of `reg` with `bytes`, ahead of the standing response.
    pub fn queue_read_response(&mut self, reg: u8, bytes: &[u8]) {
        self.queued.entry(reg).or_default().push_back(bytes.to_vec());
    }

    /// Registers read so far, in order.
    pub fn reads(&self) -> &[u8] {
        &self.reads
    }

    /// Whether compression is enabled on the link.
    pub fn compression(&self) -> bool {
        self.compression
    }

    /// Number of picture parameter sets sent.
    pub fn pps_count(&self) -> usize {
        self.pps_sent
    }
}

impl DsiHost for MockDsi {
    fn write(&mut self, payload: &[u8]) -> Result<(), DsiError> {
        match &mut self.writes_left {
            Some(0) => {
                return Err(DsiError::Write {
                    cmd: payload.first().copied().unwrap_or_default(),
                    reason: "mock failure".to_string(),
                });
            }
            Some(left) => *left -= 1,
            None => {}
        }
        self.packets.push(payload.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DsiError> {
        self.flushes += 1;
        Ok(())
    }

    fn dcs_read(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, DsiError> {
        self.reads.push(cmd);
        let response = match self.queued.get_mut(&cmd).and_then(VecDeque::pop_front) {
            Some(bytes) => bytes,
            None => self.responses.get(&cmd).cloned().ok_or(DsiError::Read(cmd))?,
        };
        let n = response.len().min(buf.len());
        buf[..n].copy_from_slice(&response[..n]);
        Ok(n)
    }

    fn set_compression(&mut self, enable: bool) -> Result<(), DsiError> {
        self.compression = enable;
        Ok(())
    }

    fn write_pps(&mut self, _dsc: &DscConfig) -> Result<(), DsiError> {
        self.pps_sent += 1;
        Ok(())
    }
}

/// A display core with a fake clock.
#[derive(Debug)]
pub struct MockHost {
    start: Instant,
    elapsed: Duration,
    sleeps: Vec<Duration>,
    vblank: bool,
    vblank_waits: usize,
    notifications: usize,
    uevents: Vec<String>,
    uevent_device: bool,
    resets: Vec<bool>,
    thermal_zones: Vec<&'static str>,
    fail_thermal: bool,
}

impl MockHost {
    /// A host with vblank available and a uevent device registered.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Duration::ZERO,
            sleeps: Vec::new(),
            vblank: true,
            vblank_waits: 0,
            notifications: 0,
            uevents: Vec::new(),
            uevent_device: true,
            resets: Vec::new(),
            thermal_zones: Vec::new(),
            fail_thermal: false,
        }
    }

    /// Move the clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.elapsed += by;
    }

    /// Time since the mock was created, by the fake clock.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Every sleep requested, in order.
    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }

    /// Make vblank waits succeed (`true`) or report no CRTC.
    pub fn set_vblank_available(&mut self, available: bool) {
        self.vblank = available;
    }

    /// Number of vblank waits, successful or not.
    pub fn vblank_waits(&self) -> usize {
        self.vblank_waits
    }

    /// Number of mode-changed notifications.
    pub fn notify_count(&self) -> usize {
        self.notifications
    }

    /// Uevents sent, as environment strings.
    pub fn uevents(&self) -> &[String] {
        &self.uevents
    }

    /// Whether a device is registered to carry uevents.
    pub fn set_uevent_device(&mut self, registered: bool) {
        self.uevent_device = registered;
    }

    /// Reset line levels driven, in order.
    pub fn reset_history(&self) -> &[bool] {
        &self.resets
    }

    /// Names of the registered thermal zones.
    pub fn thermal_zones(&self) -> &[&'static str] {
        &self.thermal_zones
    }

    /// Make thermal zone registration fail.
    pub fn fail_thermal_registration(&mut self, fail: bool) {
        self.fail_thermal = fail;
    }

    fn sleep(&mut self, by: Duration) {
        self.sleeps.push(by);
        self.elapsed += by;
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for MockHost {
    fn delay_ns(&mut self, ns: u32) {
        self.sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        self.sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleep(Duration::from_millis(u64::from(ms)));
    }
}

impl PanelHost for MockHost {
    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    fn wait_for_vblank(&mut self) -> bool {
        self.vblank_waits += 1;
        if self.vblank {
            self.elapsed += VBLANK_PERIOD;
        }
        self.vblank
    }

    fn notify_mode_changed(&mut self) {
        self.notifications += 1;
    }

    fn send_uevent(&mut self, event: &str) -> bool {
        if !self.uevent_device {
            return false;
        }
        self.uevents.push(event.to_string());
        true
    }

    fn set_reset(&mut self, high: bool) {
        self.resets.push(high);
    }

    fn register_thermal_zone(&mut self, zone: BrightnessZone) -> Result<(), PanelError> {
        if self.fail_thermal {
            return Err(PanelError::RegistrationFailed("thermal zone"));
        }
        self.thermal_zones.push(zone.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_read_before_standing_response() {
        let mut dsi = MockDsi::new();
        dsi.set_read_response(0xBE, &[1, 2]);
        dsi.queue_read_response(0xBE, &[9]);

        let mut buf = [0u8; 2];
        assert_eq!(dsi.dcs_read(0xBE, &mut buf).unwrap(), 1);
        assert_eq!(buf[0], 9);
        assert_eq!(dsi.dcs_read(0xBE, &mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(dsi.dcs_read(0xDA, &mut buf), Err(DsiError::Read(0xDA)));
    }

    #[test]
    fn test_clock_moves_with_sleeps() {
        let mut host = MockHost::new();
        let t0 = host.now();
        host.delay_ms(120);
        host.advance(Duration::from_millis(5));
        assert_eq!(host.now() - t0, Duration::from_millis(125));
        assert_eq!(host.sleeps(), &[Duration::from_millis(120)]);
    }

    #[test]
    fn test_vblank_unavailable() {
        let mut host = MockHost::new();
        host.set_vblank_available(false);
        assert!(!host.wait_for_vblank());
        assert_eq!(host.vblank_waits(), 1);
        assert_eq!(host.elapsed(), Duration::ZERO);
    }
}
