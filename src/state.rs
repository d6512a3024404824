//! Panel refresh state and the snapshot handed to callers.

use crate::revision::PanelRevision;
use bitflags::bitflags;

bitflags! {
    /// Panel operating features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u8 {
        /// Panel may start scanout early instead of waiting for the full frame.
        const EARLY_EXIT = 1 << 0;
        /// Normal-speed (60 Hz) operation instead of high speed.
        const OP_NS = 1 << 1;
        /// Panel inserts frames on its own and drops to the idle rate.
        const FRAME_AUTO = 1 << 2;
        /// Frame insertion driven by the host.
        const FRAME_MANUAL = 1 << 3;
        /// Zonal attenuation.
        const ZONAL_ATTENUATION = 1 << 4;
    }
}

/// Whether the panel may change its TE frequency on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TeOption {
    /// TE follows the refresh rate.
    #[default]
    Changeable,
    /// TE stays at a fixed frequency.
    Fixed,
}

/// TE configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeState {
    /// TE frequency in Hz.
    pub rate_hz: u32,
    /// Changeable or fixed.
    pub option: TeOption,
}

/// Features and rates, kept once as desired and once as confirmed on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshStatus {
    /// Feature bits.
    pub features: Features,
    /// Refresh rate in Hz.
    pub vrefresh: u32,
    /// Idle refresh rate in Hz, 0 when auto mode is off.
    pub idle_vrefresh: u32,
    /// TE configuration.
    pub te: TeState,
}

impl RefreshStatus {
    /// Status of a panel freshly powered at 60 Hz.
    pub const fn powered_on() -> Self {
        Self {
            features: Features::empty(),
            vrefresh: 60,
            idle_vrefresh: 0,
            te: TeState {
                rate_hz: 60,
                option: TeOption::Changeable,
            },
        }
    }
}

/// High brightness mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HbmMode {
    /// HBM off.
    #[default]
    Off,
    /// HBM on with IR-drop compensation active.
    OnIrcOn,
    /// HBM on with IR-drop compensation disabled.
    OnIrcOff,
}

impl HbmMode {
    /// Whether HBM is on.
    pub const fn is_on(self) -> bool {
        !matches!(self, HbmMode::Off)
    }

    /// Whether IRC is disabled.
    pub const fn is_irc_off(self) -> bool {
        matches!(self, HbmMode::OnIrcOff)
    }
}

/// Power state of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// Powered off.
    #[default]
    Off,
    /// Rails up and reset released, no pixels yet.
    Prepared,
    /// Displaying in a normal mode.
    Normal,
    /// Displaying in the low-power AOD mode.
    Lp,
}

impl PowerState {
    /// Whether the panel is showing pixels.
    pub const fn is_active(self) -> bool {
        matches!(self, PowerState::Normal | PowerState::Lp)
    }
}

/// A snapshot of the panel state.
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    /// Identified revision, `None` before [`identify`](crate::Panel::identify).
    pub revision: Option<PanelRevision>,
    /// Panel id string read from the DDIC.
    pub panel_id: Option<String>,
    /// Power state.
    pub power: PowerState,
    /// Name of the current mode.
    pub current_mode: Option<&'static str>,
    /// Desired features and rates.
    pub sw: RefreshStatus,
    /// Features and rates last confirmed on the panel.
    pub hw: RefreshStatus,
    /// Operating rate in Hz (60 for NS, 120 for HS).
    pub op_hz: u32,
    /// Idle rate the auto mode was last configured with.
    pub auto_mode_vrefresh: u32,
    /// Idle rate last published to the display core.
    pub panel_idle_vrefresh: u32,
    /// Dimming on.
    pub dimming_on: bool,
    /// HBM mode.
    pub hbm_mode: HbmMode,
    /// Last brightness level written.
    pub brightness: u16,
    /// Pixels switched off instead of writing DBV 0.
    pub is_pixel_off: bool,
    /// TE2 option last computed.
    pub te2_option: TeOption,
    /// Name of the binned LP entry in effect.
    pub binned_lp: Option<&'static str>,
    /// The connector needs a commit to apply an adjusted clock.
    pub needs_commit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hbm_mode_queries() {
        assert!(!HbmMode::Off.is_on());
        assert!(HbmMode::OnIrcOn.is_on());
        assert!(!HbmMode::OnIrcOn.is_irc_off());
        assert!(HbmMode::OnIrcOff.is_irc_off());
    }

    #[test]
    fn test_feature_diff() {
        let sw = Features::EARLY_EXIT | Features::FRAME_AUTO;
        let hw = Features::EARLY_EXIT | Features::OP_NS;
        let changed = sw ^ hw;
        assert!(changed.contains(Features::FRAME_AUTO));
        assert!(changed.contains(Features::OP_NS));
        assert!(!changed.contains(Features::EARLY_EXIT));
    }

    #[test]
    fn test_power_state_active() {
        assert!(PowerState::Normal.is_active());
        assert!(PowerState::Lp.is_active());
        assert!(!PowerState::Prepared.is_active());
    }
}
