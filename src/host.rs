//! Services the display core provides to a panel.

use crate::error::PanelError;
use crate::thermal::BrightnessZone;
use embedded_hal::delay::DelayNs;
use std::time::Instant;

/// Display core hooks used by [`Panel`](crate::Panel).
///
/// Delays come from the [`DelayNs`] supertrait so any embedded-hal delay
/// provider can be wrapped.
pub trait PanelHost: DelayNs {
    /// Monotonic time.
    fn now(&self) -> Instant {
        Instant::now()
    }

    /// Block until the next vblank of the attached CRTC.
    ///
    /// Returns `false` when no CRTC is attached or vblanks are unavailable.
    fn wait_for_vblank(&mut self) -> bool;

    /// The panel changed its refresh configuration.
    fn notify_mode_changed(&mut self) {}

    /// Emit a uevent with `event` as its environment string.
    ///
    /// Returns `false` when no device is registered to carry it.
    fn send_uevent(&mut self, event: &str) -> bool {
        let _ = event;
        false
    }

    /// Drive the panel reset line (`true` = released/high).
    fn set_reset(&mut self, high: bool) {
        let _ = high;
    }

    /// Register the brightness pseudo-thermal sensor.
    fn register_thermal_zone(&mut self, zone: BrightnessZone) -> Result<(), PanelError> {
        let _ = zone;
        Ok(())
    }
}

/// Sleep for at least `min_us`; `max_us` is the tolerated upper bound.
pub(crate) fn sleep_range_us(host: &mut dyn PanelHost, min_us: u32, max_us: u32) {
    debug_assert!(min_us <= max_us);
    host.delay_us(min_us);
}
