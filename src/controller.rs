//! The panel controller: lifecycle, mode switching and refresh control.

use crate::atomic::{self, ClockOverride, CrtcState, OverrideContext};
use crate::brightness::{BinnedLp, BrightnessCapability, config_for_revision};
use crate::cmd::CmdSet;
use crate::config::PanelConfig;
use crate::dsi::{DcsBuffer, DsiHost};
use crate::error::PanelError;
use crate::host::{PanelHost, sleep_range_us};
use crate::mode::PanelMode;
use crate::revision::PanelRevision;
use crate::state::{HbmMode, PanelState, PowerState, RefreshStatus, TeOption};
use crate::thermal::{BacklightState, BrightnessZone};
use crate::variants::{self, PanelDesc, PanelVariant, apply_binned_lp};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// =============================================================================
// Display Panel Trait
// =============================================================================

/// DRM panel lifecycle hooks.
///
/// Implemented by [`Panel`]; code driving the lifecycle can be written
/// against the trait and exercised with any implementation.
pub trait DisplayPanel {
    /// Release reset and get the panel ready for commands.
    fn prepare(&mut self) -> Result<(), PanelError>;

    /// Run the power-on sequence for the current mode and turn the display on.
    fn enable(&mut self) -> Result<(), PanelError>;

    /// Turn the display off and put the panel to sleep.
    fn disable(&mut self) -> Result<(), PanelError>;

    /// Assert reset.
    fn unprepare(&mut self) -> Result<(), PanelError>;

    /// Modes exposed to the display core, LP modes excluded.
    fn get_modes(&self) -> Vec<&'static PanelMode>;

    /// Snapshot of the panel state.
    fn state(&self) -> PanelState;
}

// =============================================================================
// Shared Panel State
// =============================================================================

/// Everything the controller tracks for one panel.
pub(crate) struct PanelCore {
    pub desc: &'static PanelDesc,
    pub config: PanelConfig,
    pub revision: Option<PanelRevision>,
    pub panel_id: Option<String>,
    pub power: PowerState,
    pub current_mode: Option<&'static PanelMode>,
    pub sw: RefreshStatus,
    pub hw: RefreshStatus,
    pub op_hz: u32,
    pub auto_mode_vrefresh: u32,
    pub panel_idle_vrefresh: u32,
    pub self_refresh_active: bool,
    pub dimming_on: bool,
    pub hbm_mode: HbmMode,
    pub brightness: u16,
    pub is_pixel_off: bool,
    pub te2_option: TeOption,
    pub binned_lp: Option<&'static BinnedLp>,
    pub needs_commit: bool,
    pub last_commit: Option<Instant>,
    pub last_mode_set: Option<Instant>,
    pub last_self_refresh_active: Option<Instant>,
    pub backlight: Arc<Mutex<BacklightState>>,
}

impl PanelCore {
    pub(crate) fn new(desc: &'static PanelDesc, config: PanelConfig) -> Self {
        let brightness = config_for_revision(desc.brightness, PanelRevision::Latest)
            .map_or(0, |config| config.default_brightness);
        Self {
            desc,
            config,
            revision: None,
            panel_id: None,
            power: PowerState::Off,
            current_mode: None,
            sw: RefreshStatus::powered_on(),
            hw: RefreshStatus::powered_on(),
            op_hz: 120,
            auto_mode_vrefresh: 0,
            panel_idle_vrefresh: 0,
            self_refresh_active: false,
            dimming_on: false,
            hbm_mode: HbmMode::Off,
            brightness,
            is_pixel_off: false,
            te2_option: TeOption::Changeable,
            binned_lp: None,
            needs_commit: false,
            last_commit: None,
            last_mode_set: None,
            last_self_refresh_active: None,
            backlight: Arc::new(Mutex::new(BacklightState {
                brightness,
                standby: true,
            })),
        }
    }

    /// Identified revision, `Latest` until the panel has been identified.
    pub fn rev(&self) -> PanelRevision {
        self.revision.unwrap_or(PanelRevision::Latest)
    }

    pub fn current_mode(&self) -> Result<&'static PanelMode, PanelError> {
        self.current_mode.ok_or(PanelError::NoCurrentMode)
    }

    pub fn is_lp(&self) -> bool {
        self.current_mode.is_some_and(|mode| mode.is_lp_mode)
    }

    pub fn capability(&self) -> Option<&'static BrightnessCapability> {
        config_for_revision(self.desc.brightness, self.rev()).map(|config| &config.capability)
    }

    /// Record `level` and mirror it to the thermal reader.
    pub fn set_brightness_level(&mut self, level: u16) {
        self.brightness = level;
        if let Ok(mut backlight) = self.backlight.lock() {
            backlight.brightness = level;
        }
    }

    pub fn set_standby(&mut self, standby: bool) {
        if let Ok(mut backlight) = self.backlight.lock() {
            backlight.standby = standby;
        }
    }

    fn snapshot(&self) -> PanelState {
        PanelState {
            revision: self.revision,
            panel_id: self.panel_id.clone(),
            power: self.power,
            current_mode: self.current_mode.map(|mode| mode.name),
            sw: self.sw,
            hw: self.hw,
            op_hz: self.op_hz,
            auto_mode_vrefresh: self.auto_mode_vrefresh,
            panel_idle_vrefresh: self.panel_idle_vrefresh,
            dimming_on: self.dimming_on,
            hbm_mode: self.hbm_mode,
            brightness: self.brightness,
            is_pixel_off: self.is_pixel_off,
            te2_option: self.te2_option,
            binned_lp: self.binned_lp.map(|bin| bin.name),
            needs_commit: self.needs_commit,
        }
    }
}

/// Borrowed view handed to variant hooks for one operation.
pub(crate) struct PanelCx<'a> {
    pub dcs: DcsBuffer<'a>,
    pub host: &'a mut dyn PanelHost,
    pub core: &'a mut PanelCore,
}

impl PanelCx<'_> {
    pub fn rev(&self) -> PanelRevision {
        self.core.rev()
    }

    pub fn now(&self) -> Instant {
        self.host.now()
    }

    /// Send `set` for the current revision, honouring per-packet delays.
    pub fn send_cmdset(&mut self, set: &CmdSet) -> Result<(), PanelError> {
        let rev = self.core.rev();
        let host = &mut *self.host;
        set.send(&mut self.dcs, rev, &mut |ms| host.delay_ms(ms))?;
        Ok(())
    }

    pub fn sleep_us(&mut self, min_us: u32, max_us: u32) {
        sleep_range_us(&mut *self.host, min_us, max_us);
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.host.delay_ms(ms);
    }
}

// =============================================================================
// Panel
// =============================================================================

/// One probed panel.
///
/// Owns the DSI transport, the display core hooks and the refresh state.
/// Every operation takes `&mut self`, so callers serialize access; only the
/// brightness snapshot read by [`BrightnessZone`] is shared.
pub struct Panel<B: DsiHost, H: PanelHost> {
    dsi: B,
    host: H,
    core: PanelCore,
    variant: Box<dyn PanelVariant>,
    thermal: Option<BrightnessZone>,
}

impl<B: DsiHost, H: PanelHost> Panel<B, H> {
    /// Match `compatible` against the known panels and set up the controller.
    ///
    /// A thermal zone that fails to register is logged and left out.
    pub fn probe(compatible: &str, dsi: B, mut host: H, config: PanelConfig) -> Result<Self, PanelError> {
        let variant = variants::of_match(compatible)
            .ok_or_else(|| PanelError::UnknownCompatible(compatible.to_string()))?;
        let desc = variant.desc();
        let core = PanelCore::new(desc, config);

        let mut thermal = None;
        if let Some(name) = desc.thermal_zone {
            let zone = BrightnessZone::new(name, Arc::clone(&core.backlight));
            match host.register_thermal_zone(zone.clone()) {
                Ok(()) => thermal = Some(zone),
                Err(e) => error!("failed to register {name} thermal zone: {e}"),
            }
        }

        info!("probed {} panel ({compatible})", desc.name);
        Ok(Self {
            dsi,
            host,
            core,
            variant,
            thermal,
        })
    }

    fn parts(&mut self) -> (&mut dyn PanelVariant, PanelCx<'_>) {
        (
            self.variant.as_mut(),
            PanelCx {
                dcs: DcsBuffer::new(&mut self.dsi),
                host: &mut self.host,
                core: &mut self.core,
            },
        )
    }

    /// Static description of the matched panel.
    pub fn desc(&self) -> &'static PanelDesc {
        self.core.desc
    }

    /// The DSI transport.
    pub fn dsi(&self) -> &B {
        &self.dsi
    }

    /// Mutable access to the DSI transport.
    pub fn dsi_mut(&mut self) -> &mut B {
        &mut self.dsi
    }

    /// The display core hooks.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the display core hooks.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Identified revision.
    pub fn revision(&self) -> Option<PanelRevision> {
        self.core.revision
    }

    /// Decode the revision from the panel `id` and load its brightness defaults.
    pub fn identify(&mut self, id: u32) -> PanelRevision {
        let rev = self.variant.decode_revision(id);
        self.core.revision = Some(rev);
        if let Some(config) = config_for_revision(self.core.desc.brightness, rev) {
            self.core.set_brightness_level(config.default_brightness);
        }
        info!("panel_rev: {rev}");
        rev
    }

    /// Read the DDIC id string.
    pub fn read_id(&mut self) -> Result<String, PanelError> {
        let (variant, mut cx) = self.parts();
        match variant.read_id(&mut cx) {
            Ok(id) => {
                debug!("panel id: {id}");
                cx.core.panel_id = Some(id.clone());
                Ok(id)
            }
            Err(e) => {
                error!("unable to read panel id: {e}");
                Err(e)
            }
        }
    }

    /// Re-synchronise with a panel the bootloader already turned on.
    pub fn panel_init(&mut self) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.panel_init(&mut cx)
    }

    /// Switch to the mode named `name`.
    ///
    /// While the panel is off the mode is only recorded and applied by the
    /// next [`enable`](DisplayPanel::enable).
    pub fn set_mode(&mut self, name: &str) -> Result<(), PanelError> {
        let factory = self.core.config.factory_build;
        let mode = self
            .core
            .desc
            .find_mode(name, factory)
            .ok_or_else(|| PanelError::UnknownMode(name.to_string()))?;
        self.switch_mode(mode)
    }

    /// Switch to `mode`, which must be one of [`get_modes`](DisplayPanel::get_modes)
    /// or the panel's LP modes.
    ///
    /// Modes sharing a name (an MRR and a VRR mode at the same rate) can
    /// only be told apart this way.
    pub fn switch_mode(&mut self, mode: &'static PanelMode) -> Result<(), PanelError> {
        if !self.core.desc.owns_mode(mode, self.core.config.factory_build) {
            return Err(PanelError::UnknownMode(mode.name.to_string()));
        }

        if !self.core.power.is_active() {
            let (vrefresh, op_hz) = (mode.vrefresh(), self.core.op_hz);
            if !mode.is_lp_mode && vrefresh > op_hz {
                error!("cannot cache mode {}: op_hz={op_hz}", mode.name);
                return Err(PanelError::VrefreshAboveOpHz { vrefresh, op_hz });
            }
            debug!("panel off, caching mode {}", mode.name);
            self.core.current_mode = Some(mode);
            return Ok(());
        }

        let was_lp = self.core.is_lp();
        let (variant, mut cx) = self.parts();
        cx.core.last_mode_set = Some(cx.now());

        if mode.is_lp_mode && !was_lp {
            variant.set_lp_mode(&mut cx, mode)?;
            cx.core.power = PowerState::Lp;
        } else if !mode.is_lp_mode && was_lp {
            variant.set_nolp_mode(&mut cx, mode)?;
            cx.core.power = PowerState::Normal;
        } else {
            let seamless = cx.core.current_mode.is_none_or(|current| current.same_resolution(mode));
            if !seamless {
                warn!("mode {} needs a full modeset", mode.name);
                return Err(PanelError::NotSeamless(mode.name));
            }
            variant.mode_set(&mut cx, mode)?;
        }

        cx.core.current_mode = Some(mode);
        if mode.is_lp_mode && !was_lp {
            let brightness = cx.core.brightness;
            apply_binned_lp(&mut cx, brightness, true)?;
        }
        variant.update_te2(&mut cx)
    }

    /// Whether switching to `name` keeps the active area.
    pub fn is_mode_seamless(&self, name: &str) -> bool {
        let factory = self.core.config.factory_build;
        match (self.core.current_mode, self.core.desc.find_mode(name, factory)) {
            (Some(current), Some(next)) => current.same_resolution(next),
            _ => false,
        }
    }

    /// Write a brightness level.
    pub fn set_brightness(&mut self, level: u16) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.set_brightness(&mut cx, level)?;
        cx.core.set_brightness_level(level);
        Ok(())
    }

    /// Pick the binned LP entry for `brightness` while in the LP mode.
    pub fn set_binned_lp(&mut self, brightness: u16) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        if apply_binned_lp(&mut cx, brightness, false)? {
            variant.update_te2(&mut cx)?;
        }
        Ok(())
    }

    /// Switch high brightness mode.
    pub fn set_hbm_mode(&mut self, mode: HbmMode) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.set_hbm_mode(&mut cx, mode)
    }

    /// Turn brightness dimming on or off.
    pub fn set_dimming(&mut self, on: bool) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.set_dimming(&mut cx, on)
    }

    /// Set the operating rate (60 for NS, 120 for HS).
    pub fn set_op_hz(&mut self, hz: u32) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.set_op_hz(&mut cx, hz)
    }

    /// The compositor entered or left self refresh.
    ///
    /// Returns whether the refresh configuration changed.
    pub fn set_self_refresh(&mut self, enable: bool) -> Result<bool, PanelError> {
        let (variant, mut cx) = self.parts();
        if cx.core.self_refresh_active && !enable {
            cx.core.last_self_refresh_active = Some(cx.now());
        }
        cx.core.self_refresh_active = enable;
        // enable applies the idle rate
        if !cx.core.power.is_active() {
            return Ok(false);
        }
        let changed = variant.set_self_refresh(&mut cx, enable)?;
        if changed {
            variant.update_te2(&mut cx)?;
        }
        Ok(changed)
    }

    /// A frame commit finished.
    pub fn commit_done(&mut self) -> Result<(), PanelError> {
        if !self.core.power.is_active() {
            return Ok(());
        }
        let (variant, mut cx) = self.parts();
        let result = variant.commit_done(&mut cx);
        cx.core.last_commit = Some(cx.now());
        result
    }

    /// Recompute the TE2 option.
    pub fn update_te2(&mut self) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.update_te2(&mut cx)
    }

    /// Apply the clock override policy to a pending commit.
    pub fn atomic_check(&mut self, old: &CrtcState, new: &mut CrtcState) -> ClockOverride {
        let Some(policy) = self.core.desc.clock_override else {
            return ClockOverride::Unchanged;
        };
        let Some(mode) = self.core.current_mode else {
            return ClockOverride::Unchanged;
        };
        let ctx = OverrideContext {
            current_vrefresh: mode.vrefresh(),
            current_is_lp: mode.is_lp_mode,
            auto_mode_vrefresh: self.core.auto_mode_vrefresh,
        };

        let result = atomic::check(&policy, ctx, old, new);
        if policy.tracks_needs_commit {
            match result {
                ClockOverride::Raised => self.core.needs_commit = true,
                ClockOverride::Restored => self.core.needs_commit = false,
                ClockOverride::Unchanged => {}
            }
        }
        result
    }

    /// Prepare for a DSI clock change.
    pub fn pre_update_ffc(&mut self) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.pre_update_ffc(&mut cx)
    }

    /// Retune the panel for a DSI HS clock of `hs_clock_mbps`.
    pub fn update_ffc(&mut self, hs_clock_mbps: u32) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.update_ffc(&mut cx, hs_clock_mbps)
    }

    /// Hex dump of the named command set (`init`, `off` or `lp`) for the current revision.
    pub fn debugfs_cmdset(&self, name: &str) -> Option<String> {
        let desc = self.core.desc;
        let set = match name {
            "init" => Some(&desc.init_cmdset),
            "off" => Some(&desc.off_cmdset),
            "lp" => desc.lp_cmdset.as_ref(),
            _ => None,
        }?;
        Some(set.dump(self.core.rev()))
    }

    /// The brightness thermal zone, when registered.
    pub fn thermal_zone(&self) -> Option<&BrightnessZone> {
        self.thermal.as_ref()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &PanelConfig {
        &self.core.config
    }

    /// Set the lowest idle refresh rate; negative disables auto mode.
    pub fn set_min_vrefresh(&mut self, min_vrefresh: i32) -> Result<(), PanelError> {
        self.core.config.min_vrefresh = min_vrefresh;
        self.update_idle_mode()
    }

    /// Set the delay after a mode set before auto mode may engage.
    pub fn set_idle_delay_ms(&mut self, idle_delay_ms: u32) -> Result<(), PanelError> {
        self.core.config.idle_delay_ms = idle_delay_ms;
        self.update_idle_mode()
    }

    /// Allow or forbid idling.
    pub fn set_panel_idle_enabled(&mut self, enabled: bool) -> Result<(), PanelError> {
        self.core.config.panel_idle_enabled = enabled;
        self.update_idle_mode()
    }

    /// Keep TE changeable during early exit.
    pub fn set_force_changeable_te(&mut self, force: bool) {
        self.core.config.force_changeable_te = force;
    }

    /// Keep TE2 changeable.
    pub fn set_force_changeable_te2(&mut self, force: bool) -> Result<(), PanelError> {
        self.core.config.force_changeable_te2 = force;
        self.update_te2()
    }

    /// Wait one vblank when leaving self-refresh idle.
    pub fn set_panel_need_handle_idle_exit(&mut self, need: bool) {
        self.core.config.panel_need_handle_idle_exit = need;
    }

    fn update_idle_mode(&mut self) -> Result<(), PanelError> {
        if !self.core.desc.idle_supported || !self.core.power.is_active() {
            return Ok(());
        }
        let active = self.core.self_refresh_active;
        self.set_self_refresh(active).map(|_| ())
    }
}

impl<B: DsiHost, H: PanelHost> DisplayPanel for Panel<B, H> {
    fn prepare(&mut self) -> Result<(), PanelError> {
        self.host.set_reset(true);
        self.core.power = PowerState::Prepared;
        debug!("{} prepared", self.core.desc.name);
        Ok(())
    }

    fn enable(&mut self) -> Result<(), PanelError> {
        let mode = self.core.current_mode().inspect_err(|_| error!("no current mode set"))?;
        let (variant, mut cx) = self.parts();

        variant.enable(&mut cx, mode)?;
        cx.core.power = if mode.is_lp_mode {
            PowerState::Lp
        } else {
            PowerState::Normal
        };
        cx.core.set_standby(false);
        if mode.is_lp_mode {
            let brightness = cx.core.brightness;
            apply_binned_lp(&mut cx, brightness, true)?;
        }
        variant.update_te2(&mut cx)?;
        info!("{} enabled in {}", cx.core.desc.name, mode.name);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), PanelError> {
        let (variant, mut cx) = self.parts();
        variant.disable(&mut cx)?;
        cx.core.power = PowerState::Prepared;
        cx.core.set_standby(true);
        info!("{} disabled", cx.core.desc.name);
        Ok(())
    }

    fn unprepare(&mut self) -> Result<(), PanelError> {
        self.host.set_reset(false);
        self.core.power = PowerState::Off;
        Ok(())
    }

    fn get_modes(&self) -> Vec<&'static PanelMode> {
        self.core.desc.modes_for(self.core.config.factory_build).collect()
    }

    fn state(&self) -> PanelState {
        self.core.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDsi, MockHost};
    use crate::mode::DisplayTiming;

    fn probe(compatible: &str) -> Panel<MockDsi, MockHost> {
        Panel::probe(compatible, MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap()
    }

    #[test]
    fn test_probe_unknown_compatible() {
        let result = Panel::probe("google,gs-ct9z", MockDsi::new(), MockHost::new(), PanelConfig::default());
        assert!(matches!(result, Err(PanelError::UnknownCompatible(_))));
    }

    #[test]
    fn test_probe_initial_state() {
        let panel = probe("google,gs-ct3a");
        let state = panel.state();
        assert_eq!(state.op_hz, 120);
        assert_eq!(state.hw.vrefresh, 60);
        assert_eq!(state.hw.te.rate_hz, 60);
        assert_eq!(state.power, PowerState::Off);
        assert!(state.current_mode.is_none());
    }

    #[test]
    fn test_resolution_change_needs_full_modeset() {
        const FULL: DisplayTiming = DisplayTiming::new(60, 2152, 80, 30, 38, 2076, 8, 4, 14);
        const HALF: DisplayTiming = DisplayTiming::new(60, 1076, 80, 30, 38, 1038, 8, 4, 14);
        static MODES: [PanelMode; 2] = [
            PanelMode::new("2152x2076@60:60", FULL, 142, 137),
            PanelMode::new("1076x1038@60:60", HALF, 142, 137),
        ];
        let variant = variants::of_match("google,gs-ct3a").unwrap();
        let desc: &'static PanelDesc = Box::leak(Box::new(PanelDesc {
            modes: &MODES,
            ..*variant.desc()
        }));
        let mut panel = Panel {
            dsi: MockDsi::new(),
            host: MockHost::new(),
            core: PanelCore::new(desc, PanelConfig::default()),
            variant,
            thermal: None,
        };
        panel.set_mode("2152x2076@60:60").unwrap();
        panel.prepare().unwrap();
        panel.enable().unwrap();
        assert!(!panel.is_mode_seamless("1076x1038@60:60"));

        panel.dsi_mut().clear();
        let result = panel.set_mode("1076x1038@60:60");
        assert!(matches!(result, Err(PanelError::NotSeamless("1076x1038@60:60"))));
        assert_eq!(panel.state().current_mode, Some("2152x2076@60:60"));
        assert!(panel.dsi().packets().is_empty());
    }

    #[test]
    fn test_enable_without_mode_fails() {
        let mut panel = probe("google,gs-ct3c");
        panel.prepare().unwrap();
        assert!(matches!(panel.enable(), Err(PanelError::NoCurrentMode)));
    }

    #[test]
    fn test_mode_cached_while_off() {
        let mut panel = probe("google,gs-ct3e");
        let name = panel.get_modes()[0].name;
        panel.set_mode(name).unwrap();
        assert_eq!(panel.state().current_mode, Some(name));
        assert!(panel.dsi().packets().is_empty());
    }

    #[test]
    fn test_preferred_modes() {
        let panel = probe("google,gs-ct3a");
        let preferred: Vec<_> = panel.get_modes().into_iter().filter(|mode| mode.is_preferred()).collect();
        assert_eq!(preferred.len(), 2);
        assert!(preferred.iter().all(|mode| mode.vrefresh() == 60 || mode.is_vrr()));

        let panel = probe("google,gs-ct3c");
        assert!(panel.get_modes().iter().all(|mode| !mode.is_preferred()));
    }

    #[test]
    fn test_unknown_mode() {
        let mut panel = probe("google,gs-ct3e");
        assert!(matches!(panel.set_mode("1x1@1:1"), Err(PanelError::UnknownMode(_))));
    }

    #[test]
    fn test_debugfs_cmdset_names() {
        let panel = probe("google,gs-ct3a");
        assert!(panel.debugfs_cmdset("init").is_some_and(|dump| dump.starts_with("35\n")));
        assert!(panel.debugfs_cmdset("off").is_some());
        assert!(panel.debugfs_cmdset("gamma").is_none());
    }

    #[test]
    fn test_thermal_zone_follows_standby() {
        let mut panel = probe("google,gs-ct3a");
        let zone = panel.thermal_zone().cloned().unwrap();
        panel.identify(0x0000_8000);
        assert_eq!(zone.temperature().unwrap(), 0);

        let mode = panel.get_modes()[0].name;
        panel.set_mode(mode).unwrap();
        panel.prepare().unwrap();
        panel.enable().unwrap();
        assert_eq!(zone.temperature().unwrap(), i32::from(panel.state().brightness));
    }
}
