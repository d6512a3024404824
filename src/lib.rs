//! Panel driver core for the ct3a-ct3e AMOLED MIPI-DSI panels.
//!
//! This crate holds the parts of a DRM panel driver that do not depend on a
//! kernel: the per-panel command tables, the brightness and binned LP
//! tables, and the refresh state machine that drives auto frame insertion,
//! early exit and TE configuration.
//!
//! The transport and the display core are traits: implement [`DsiHost`] to
//! put DCS packets on the wire and [`PanelHost`] for timing, vblank and
//! uevents.
//!
//! # Example
//!
//! ```no_run
//! use ct3_panel::{DisplayPanel, DsiHost, Panel, PanelConfig, PanelError, PanelHost};
//!
//! fn bring_up<B: DsiHost, H: PanelHost>(dsi: B, host: H) -> Result<(), PanelError> {
//!     // Match the device tree node
//!     let mut panel = Panel::probe("google,gs-ct3a", dsi, host, PanelConfig::default())?;
//!
//!     // Identify the revision from the build code
//!     panel.identify(0x0000_A000);
//!     panel.read_id()?;
//!
//!     // Power on into 120 Hz
//!     panel.set_mode("2152x2076@120:120")?;
//!     panel.prepare()?;
//!     panel.enable()?;
//!
//!     // Let auto mode drop to 10 Hz when idle
//!     panel.set_min_vrefresh(10)?;
//!     panel.set_brightness(1024)?;
//!     panel.commit_done()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Use [`MockDsi`] and [`MockHost`] to drive a panel without hardware:
//!
//! ```
//! use ct3_panel::{DisplayPanel, MockDsi, MockHost, Panel, PanelConfig};
//!
//! let mut panel = Panel::probe("google,gs-ct3c", MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
//! panel.set_mode("1080x2424@60:60").unwrap();
//! panel.prepare().unwrap();
//! panel.enable().unwrap();
//! assert!(panel.dsi().sent(&[0x29]));
//! assert!(panel.state().power.is_active());
//! ```

#![warn(missing_docs)]

mod atomic;
mod brightness;
mod cmd;
mod config;
mod controller;
mod dsi;
mod error;
mod host;
mod mock;
mod mode;
mod refresh;
mod revision;
mod state;
mod thermal;
mod variants;

// Re-export public API
pub use atomic::{ClockOverride, ClockOverridePolicy, CrtcMode, CrtcState};
pub use brightness::{
    BinnedLp, BrightnessBand, BrightnessCapability, BrightnessConfig, Range, config_for_revision,
    select_binned_lp,
};
pub use cmd::{CmdSet, DsiCmd};
pub use config::PanelConfig;
pub use controller::{DisplayPanel, Panel};
pub use dsi::{DcsBuffer, DsiHost, WRCTRLD_BCTRL_BIT, WRCTRLD_DIMMING_BIT, dcs};
pub use error::{DsiError, PanelError};
pub use host::PanelHost;
pub use mock::{MockDsi, MockHost};
pub use mode::{
    Availability, DSC_RC_RANGES_8BPC, DisplayTiming, DscConfig, IdleMode, ModeFlags, ModeType, PanelMode,
    RcRange, Te2Timing,
};
pub use revision::{PanelRevision, RevisionMask};
pub use state::{Features, HbmMode, PanelState, PowerState, RefreshStatus, TeOption, TeState};
pub use thermal::{BacklightState, BrightnessZone};
pub use variants::{Luminance, PanelDesc, ResetTiming, compatibles};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_compatible_probes() {
        for compatible in compatibles() {
            let panel = Panel::probe(compatible, MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
            assert!(panel.desc().compatible.contains(&compatible));
            assert_eq!(panel.state().power, PowerState::Off);
        }
    }
}
