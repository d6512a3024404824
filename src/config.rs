//! Runtime tunables of the refresh state machine.

/// Tunables normally exposed to userspace as sysfs knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PanelConfig {
    /// Lowest idle refresh rate auto mode may use; negative disables auto mode.
    pub min_vrefresh: i32,
    /// Delay after the last mode set before auto mode may engage, in ms.
    pub idle_delay_ms: u32,
    /// Allow the panel to idle at all.
    pub panel_idle_enabled: bool,
    /// Keep TE changeable even when early exit would fix it.
    pub force_changeable_te: bool,
    /// Keep TE2 changeable regardless of state.
    pub force_changeable_te2: bool,
    /// Wait one vblank when leaving self-refresh idle.
    pub panel_need_handle_idle_exit: bool,
    /// Factory calibration build: exposes the fixed 1/10/30 Hz modes and
    /// lets features be set manually.
    pub factory_build: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            min_vrefresh: 0,
            idle_delay_ms: 0,
            panel_idle_enabled: true,
            force_changeable_te: false,
            force_changeable_te2: false,
            panel_need_handle_idle_exit: false,
            factory_build: false,
        }
    }
}

impl PanelConfig {
    /// Configuration for a factory build.
    pub fn factory() -> Self {
        Self {
            factory_build: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PanelConfig::default();
        assert_eq!(config.min_vrefresh, 0);
        assert!(config.panel_idle_enabled);
        assert!(!config.factory_build);
        assert!(PanelConfig::factory().factory_build);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PanelConfig =
            serde_json::from_str(r#"{"min_vrefresh": 10, "idle_delay_ms": 500}"#).unwrap();
        assert_eq!(config.min_vrefresh, 10);
        assert_eq!(config.idle_delay_ms, 500);
        assert!(config.panel_idle_enabled);
    }
}
