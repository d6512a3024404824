//! Refresh rate, auto mode and TE control.
//!
//! The panels that idle on their own (auto frame insertion) share one state
//! machine: a desired feature set (`sw`) is diffed against what the panel
//! last confirmed (`hw`) and only the difference is written. The variant
//! supplies the register bytes through [`PanelVariant::write_features`].

use crate::controller::{PanelCore, PanelCx};
use crate::error::PanelError;
use crate::host::{PanelHost, sleep_range_us};
use crate::mode::{IdleMode, PanelMode};
use crate::state::{Features, TeOption};
use crate::variants::PanelVariant;

use log::{debug, error, info, warn};
use std::time::Instant;

/// Auto mode needs just over two 120 Hz frames before it starts lowering
/// the rate; commits closer together than this do not need an early exit.
pub(crate) const EARLY_EXIT_THRESHOLD_US: u128 = 17_000;

/// Feature configuration about to be written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FeatureRequest {
    pub mode: &'static PanelMode,
    pub vrefresh: u32,
    pub idle_vrefresh: u32,
    pub te_freq: u32,
    pub features: Features,
    /// Bits that differ from the hardware state, every bit when enforced.
    pub changed: Features,
    pub enforce: bool,
}

impl FeatureRequest {
    pub fn is_vrr(&self) -> bool {
        self.mode.is_vrr()
    }

    pub fn has(&self, feature: Features) -> bool {
        self.features.contains(feature)
    }

    pub fn changed(&self, feature: Features) -> bool {
        self.changed.intersects(feature)
    }
}

/// Write the features in `sw` for `mode` and `idle_vrefresh`.
///
/// Without `enforce` the write is skipped when the request matches the
/// hardware state. `hw` is only updated once the variant's writes went
/// through.
pub(crate) fn set_panel_features(
    v: &mut dyn PanelVariant,
    cx: &mut PanelCx<'_>,
    mode: &'static PanelMode,
    idle_vrefresh: u32,
    enforce: bool,
) -> Result<(), PanelError> {
    let mut req = FeatureRequest {
        mode,
        vrefresh: mode.vrefresh(),
        idle_vrefresh,
        te_freq: mode.te_freq(),
        features: cx.core.sw.features,
        changed: Features::all(),
        enforce,
    };
    v.pin_features(cx.core, &mut req);
    cx.core.sw.features = req.features;

    let hw = cx.core.hw;
    if !enforce {
        req.changed = req.features ^ hw.features;
        if req.changed.is_empty()
            && req.vrefresh == hw.vrefresh
            && req.idle_vrefresh == hw.idle_vrefresh
            && req.te_freq == hw.te.rate_hz
        {
            debug!("no changes, skip update");
            return Ok(());
        }
    }

    debug!(
        "op={} ee={} fi={} fps={} idle_fps={} te={} vrr={}",
        req.has(Features::OP_NS),
        req.has(Features::EARLY_EXIT),
        req.has(Features::FRAME_AUTO),
        req.vrefresh,
        req.idle_vrefresh,
        req.te_freq,
        req.is_vrr()
    );

    cx.core.sw.te.rate_hz = req.te_freq;
    let te_option = v.write_features(cx, &req)?;

    let hw = &mut cx.core.hw;
    hw.vrefresh = req.vrefresh;
    hw.idle_vrefresh = req.idle_vrefresh;
    hw.te.rate_hz = req.te_freq;
    if let Some(option) = te_option {
        hw.te.option = option;
    }
    hw.features = req.features;
    Ok(())
}

/// Rewrite the features for the current mode and auto rate.
pub(crate) fn update_panel_features(
    v: &mut dyn PanelVariant,
    cx: &mut PanelCx<'_>,
    enforce: bool,
) -> Result<(), PanelError> {
    let mode = cx.core.current_mode()?;
    let idle_vrefresh = cx.core.auto_mode_vrefresh;
    set_panel_features(v, cx, mode, idle_vrefresh, enforce)
}

fn idle_time_delta_ms(core: &PanelCore, mode: &PanelMode, now: Instant) -> Option<u128> {
    let mut last = core.last_mode_set;
    if mode.idle_mode == IdleMode::OnSelfRefresh {
        last = last.max(core.last_self_refresh_active);
    }
    last.map(|since| now.saturating_duration_since(since).as_millis())
}

fn is_auto_mode_allowed(core: &PanelCore, mode: &PanelMode, now: Instant) -> bool {
    // no auto mode or early exit while dimming
    if core.dimming_on {
        return false;
    }
    let delay = u128::from(core.config.idle_delay_ms);
    if delay > 0 && idle_time_delta_ms(core, mode, now).is_some_and(|delta| delta < delay) {
        return false;
    }
    core.config.panel_idle_enabled
}

/// Lowest idle rate auto mode may use in `mode`, 0 to keep auto mode off.
///
/// The configured minimum is rounded up to 1, 10 or 30 Hz.
pub(crate) fn min_idle_vrefresh(core: &PanelCore, mode: &PanelMode, now: Instant) -> u32 {
    let min_vrefresh = core.config.min_vrefresh;
    if min_vrefresh < 0 || !is_auto_mode_allowed(core, mode, now) {
        return 0;
    }

    let idle = if min_vrefresh <= 1 {
        1
    } else if min_vrefresh <= 10 {
        10
    } else if min_vrefresh <= 30 {
        30
    } else {
        return 0;
    };

    let vrefresh = mode.vrefresh();
    if idle >= vrefresh {
        debug!("min idle vrefresh ({idle}) higher than target ({vrefresh})");
        return 0;
    }
    debug!("min_idle_vrefresh {idle}");
    idle
}

/// Switch auto mode to `idle_vrefresh` (0 for manual) and tell the host.
pub(crate) fn update_refresh_mode(
    v: &mut dyn PanelVariant,
    cx: &mut PanelCx<'_>,
    mode: &'static PanelMode,
    idle_vrefresh: u32,
) -> Result<(), PanelError> {
    info!("mode: {} set idle_vrefresh: {idle_vrefresh}", mode.name);

    let features = &mut cx.core.sw.features;
    if idle_vrefresh > 0 {
        features.insert(Features::FRAME_AUTO | Features::EARLY_EXIT);
    } else {
        features.remove(Features::FRAME_AUTO);
    }

    // Best guess until the next commit corrects it.
    cx.core.auto_mode_vrefresh = idle_vrefresh;
    cx.core.panel_idle_vrefresh = idle_vrefresh;
    set_panel_features(v, cx, mode, idle_vrefresh, false)?;
    cx.host.notify_mode_changed();
    debug!("display state is notified");
    Ok(())
}

/// Move to the refresh rate of `mode`.
pub(crate) fn change_frequency(
    v: &mut dyn PanelVariant,
    cx: &mut PanelCx<'_>,
    mode: &'static PanelMode,
) -> Result<(), PanelError> {
    let vrefresh = mode.vrefresh();
    let op_hz = cx.core.op_hz;
    if vrefresh > op_hz {
        error!("invalid freq setting: op_hz={op_hz}, vrefresh={vrefresh}");
        return Err(PanelError::VrefreshAboveOpHz { vrefresh, op_hz });
    }

    let idle_vrefresh = if mode.idle_mode == IdleMode::OnInactivity {
        min_idle_vrefresh(cx.core, mode, cx.now())
    } else {
        0
    };
    update_refresh_mode(v, cx, mode, idle_vrefresh)?;
    cx.core.sw.te.rate_hz = mode.te_freq();
    debug!("change to {vrefresh}Hz");
    Ok(())
}

/// Self refresh entered or left. Returns whether the configuration changed.
pub(crate) fn set_self_refresh(
    v: &mut dyn PanelVariant,
    cx: &mut PanelCx<'_>,
    enable: bool,
) -> Result<bool, PanelError> {
    debug!("self refresh: {enable}");
    let Some(mode) = cx.core.current_mode else {
        return Ok(false);
    };

    // LP mode always runs early exit; only the reported rate changes
    if mode.is_lp_mode {
        cx.core.panel_idle_vrefresh = u32::from(enable);
        cx.host.notify_mode_changed();
        return Ok(false);
    }

    let mut idle_vrefresh = min_idle_vrefresh(cx.core, mode, cx.now());

    if mode.idle_mode != IdleMode::OnSelfRefresh {
        if mode.idle_mode == IdleMode::OnInactivity && cx.core.auto_mode_vrefresh != idle_vrefresh {
            update_refresh_mode(v, cx, mode, idle_vrefresh)?;
            return Ok(true);
        }
        return Ok(false);
    }

    if !enable {
        idle_vrefresh = 0;
    }
    if cx.core.panel_idle_vrefresh == idle_vrefresh {
        return Ok(false);
    }

    update_refresh_mode(v, cx, mode, idle_vrefresh)?;

    if idle_vrefresh > 0 {
        let event = format!("PANEL_IDLE_ENTER=0,{},120", mode.vrefresh());
        if !cx.host.send_uevent(&event) {
            warn!("no device to send {event}");
        }
    } else if cx.core.config.panel_need_handle_idle_exit {
        // TE may still run at 120 Hz right after idle exit
        debug!("wait one vblank after exit idle");
        wait_one_vblank(&mut *cx.host);
    }
    Ok(true)
}

/// Called after each committed frame outside the LP mode.
///
/// If auto mode may already have lowered the rate, either kick the panel
/// with an early exit or drop back to manual mode.
pub(crate) fn update_idle_state(v: &mut dyn PanelVariant, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
    cx.core.panel_idle_vrefresh = 0;
    if !cx.core.sw.features.contains(Features::FRAME_AUTO) {
        return Ok(());
    }

    let now = cx.now();
    if let Some(last_commit) = cx.core.last_commit {
        let delta_us = now.saturating_duration_since(last_commit).as_micros();
        if delta_us < EARLY_EXIT_THRESHOLD_US {
            debug!("skip early exit. {delta_us}us since last commit");
            return Ok(());
        }
    }

    // early exit switches the panel to 120 Hz
    cx.core.last_mode_set = Some(now);

    if cx.core.config.idle_delay_ms == 0 && cx.core.config.force_changeable_te {
        debug!("sending early exit out cmd");
        v.send_early_exit(cx)
    } else {
        let mode = cx.core.current_mode()?;
        update_refresh_mode(v, cx, mode, 0)
    }
}

/// Block for one vblank, or a 120 Hz frame when no vblank is available.
pub(crate) fn wait_one_vblank(host: &mut dyn PanelHost) {
    if !host.wait_for_vblank() {
        sleep_range_us(host, 8350, 8500);
    }
}

/// Operating rate switch for panels with an NS/HS clock.
pub(crate) fn set_op_hz(v: &mut dyn PanelVariant, cx: &mut PanelCx<'_>, hz: u32) -> Result<(), PanelError> {
    let mode = cx.core.current_mode()?;
    if mode.is_vrr() {
        warn!("set_op_hz: should be set by mode switch when in vrr mode");
        return Err(PanelError::OpHzInVrrMode(mode.name));
    }

    let vrefresh = mode.vrefresh();
    if vrefresh > hz || (hz != 60 && hz != 120) {
        error!("invalid op_hz={hz} for vrefresh={vrefresh}");
        return Err(PanelError::InvalidOpHz { hz, vrefresh });
    }

    cx.core.op_hz = hz;
    cx.core.sw.features.set(Features::OP_NS, hz == 60);

    let active = cx.core.power.is_active();
    if active {
        update_panel_features(v, cx, false)?;
    }
    info!("{} op_hz at {hz}", if active { "set" } else { "cache" });

    if hz == 120 {
        // the first frame after NS to HS can underrun; push it to the next TE
        debug!("wait one vblank after NS to HS");
        wait_one_vblank(&mut *cx.host);
    }
    Ok(())
}

/// TE2 option for the current state.
pub(crate) fn te2_option(core: &PanelCore) -> TeOption {
    let Some(mode) = core.current_mode else {
        return TeOption::Changeable;
    };
    if core.config.force_changeable_te2 {
        return TeOption::Changeable;
    }
    if mode.is_lp_mode || (core.sw.features.contains(Features::EARLY_EXIT) && core.auto_mode_vrefresh < 30) {
        TeOption::Fixed
    } else {
        TeOption::Changeable
    }
}
