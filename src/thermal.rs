//! Backlight level reported as a pseudo-temperature.
//!
//! Board thermal policy reads the panel brightness through a virtual
//! thermal zone. Reads arrive from the thermal framework at any time, so
//! the backlight snapshot sits behind a mutex shared with the panel.

use crate::error::PanelError;
use std::sync::{Arc, Mutex};

/// Backlight properties shared with the thermal reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacklightState {
    /// Current brightness level.
    pub brightness: u16,
    /// Panel is in standby (off or not yet enabled).
    pub standby: bool,
}

/// Thermal zone whose temperature is the current brightness.
#[derive(Debug, Clone)]
pub struct BrightnessZone {
    name: &'static str,
    backlight: Arc<Mutex<BacklightState>>,
}

impl BrightnessZone {
    pub(crate) fn new(name: &'static str, backlight: Arc<Mutex<BacklightState>>) -> Self {
        Self { name, backlight }
    }

    /// Zone name, e.g. `"inner_brightness"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current brightness, or 0 while the panel is in standby.
    pub fn temperature(&self) -> Result<i32, PanelError> {
        let state = self
            .backlight
            .lock()
            .map_err(|_| PanelError::ThermalUnavailable)?;
        Ok(if state.standby {
            0
        } else {
            i32::from(state.brightness)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standby_reads_zero() {
        let backlight = Arc::new(Mutex::new(BacklightState {
            brightness: 1223,
            standby: true,
        }));
        let zone = BrightnessZone::new("inner_brightness", Arc::clone(&backlight));
        assert_eq!(zone.temperature().unwrap(), 0);

        backlight.lock().unwrap().standby = false;
        assert_eq!(zone.temperature().unwrap(), 1223);
    }

    #[test]
    fn test_readable_from_another_thread() {
        let backlight = Arc::new(Mutex::new(BacklightState {
            brightness: 500,
            standby: false,
        }));
        let zone = BrightnessZone::new("inner_brightness", backlight);
        let handle = std::thread::spawn(move || zone.temperature().unwrap());
        assert_eq!(handle.join().unwrap(), 500);
    }
}
