//! Panel variants and the registry that matches them to compatible strings.
//!
//! Each variant pairs a static [`PanelDesc`] (modes, command sets,
//! brightness tables) with a [`PanelVariant`] implementation that emits the
//! variant-specific command bytes. Sequences several variants share live
//! here as free functions.

mod ct3a;
mod ct3b;
mod ct3c;
mod ct3d;
mod ct3e;

use crate::atomic::ClockOverridePolicy;
use crate::brightness::{BinnedLp, BrightnessConfig, select_binned_lp};
use crate::cmd::{CmdSet, add_for_revision};
use crate::controller::{PanelCore, PanelCx};
use crate::error::PanelError;
use crate::mode::{DscConfig, PanelMode};
use crate::refresh::{self, FeatureRequest};
use crate::revision::PanelRevision;
use crate::state::{HbmMode, TeOption};

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use std::fmt::Write as _;

/// Peak, average and minimum luminance, in units of 0.0001 nits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Luminance {
    /// Peak luminance.
    pub max: u32,
    /// Full-frame average luminance.
    pub max_avg: u32,
    /// Minimum luminance.
    pub min: u32,
}

/// Reset line timing used by the power-on sequence, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTiming {
    /// Time to hold reset high before pulsing it, `None` to skip.
    pub high_ms: Option<u32>,
    /// Length of the low pulse.
    pub low_ms: u32,
    /// Settle time after releasing reset.
    pub settle_ms: u32,
}

/// Static description of a panel.
#[derive(Debug)]
pub struct PanelDesc {
    /// Short name, e.g. `"ct3a"`.
    pub name: &'static str,
    /// Device tree compatible strings.
    pub compatible: &'static [&'static str],
    /// Normal modes.
    pub modes: &'static [PanelMode],
    /// Low-power (AOD) modes.
    pub lp_modes: &'static [PanelMode],
    /// Brightness bins of the LP mode.
    pub binned_lp: &'static [BinnedLp],
    /// The first bin turns the backlight off.
    pub has_off_binned_lp_entry: bool,
    /// Brightness settings per revision.
    pub brightness: &'static [BrightnessConfig],
    /// Luminance limits reported for HDR.
    pub luminance: Luminance,
    /// Power-on initialization sequence.
    pub init_cmdset: CmdSet,
    /// Power-off sequence.
    pub off_cmdset: CmdSet,
    /// LP entry sequence, for variants that use the generic LP entry.
    pub lp_cmdset: Option<CmdSet>,
    /// Supports idle (auto frame insertion).
    pub idle_supported: bool,
    /// Name of the brightness thermal zone, if the panel registers one.
    pub thermal_zone: Option<&'static str>,
    /// Reset line timing.
    pub reset: ResetTiming,
    /// DSC parameters sent as the PPS.
    pub dsc: Option<DscConfig>,
    /// Mode clock override policy for atomic checks.
    pub clock_override: Option<ClockOverridePolicy>,
}

impl PanelDesc {
    /// Normal modes exposed on a factory or production build.
    pub fn modes_for(&'static self, factory_build: bool) -> impl Iterator<Item = &'static PanelMode> {
        self.modes
            .iter()
            .filter(move |mode| mode.availability.allows(factory_build))
    }

    /// First mode named `name`, normal modes before LP modes.
    pub fn find_mode(&'static self, name: &str, factory_build: bool) -> Option<&'static PanelMode> {
        self.modes_for(factory_build)
            .chain(self.lp_modes.iter())
            .find(|mode| mode.name == name)
    }

    /// Whether `mode` is one of this panel's modes on the given build.
    pub fn owns_mode(&'static self, mode: &PanelMode, factory_build: bool) -> bool {
        self.modes_for(factory_build)
            .chain(self.lp_modes.iter())
            .any(|own| std::ptr::eq(own, mode))
    }
}

/// Hooks a panel variant implements.
///
/// Every hook receives the borrowed panel context. Defaults cover the
/// behaviour most variants share.
pub(crate) trait PanelVariant: Send {
    fn desc(&self) -> &'static PanelDesc;

    /// Map the panel id to a revision.
    fn decode_revision(&self, id: u32) -> PanelRevision {
        let code = PanelRevision::code_from_build(PanelRevision::build_code(id));
        standard_revision(code)
    }

    fn read_id(&mut self, cx: &mut PanelCx<'_>) -> Result<String, PanelError> {
        read_slsi_id(cx)
    }

    fn panel_init(&mut self, _cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        Ok(())
    }

    fn enable(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError>;

    fn disable(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        let desc = cx.core.desc;
        cx.send_cmdset(&desc.off_cmdset)
    }

    fn set_brightness(&mut self, cx: &mut PanelCx<'_>, level: u16) -> Result<(), PanelError>;

    fn set_hbm_mode(&mut self, cx: &mut PanelCx<'_>, mode: HbmMode) -> Result<(), PanelError>;

    fn set_dimming(&mut self, cx: &mut PanelCx<'_>, on: bool) -> Result<(), PanelError>;

    fn set_lp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        enter_lp(cx, mode)
    }

    fn set_nolp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError>;

    fn mode_set(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError>;

    fn set_op_hz(&mut self, _cx: &mut PanelCx<'_>, _hz: u32) -> Result<(), PanelError> {
        Err(PanelError::NotSupported("op_hz"))
    }

    fn commit_done(&mut self, _cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        Ok(())
    }

    /// Returns whether the refresh configuration changed.
    fn set_self_refresh(&mut self, _cx: &mut PanelCx<'_>, _enable: bool) -> Result<bool, PanelError> {
        Ok(false)
    }

    fn update_te2(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.core.te2_option = refresh::te2_option(cx.core);
        Ok(())
    }

    fn pre_update_ffc(&mut self, _cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        Ok(())
    }

    fn update_ffc(&mut self, _cx: &mut PanelCx<'_>, _hs_clock_mbps: u32) -> Result<(), PanelError> {
        Ok(())
    }

    /// Adjust a feature request before it is diffed against the hardware state.
    fn pin_features(&self, _core: &PanelCore, _req: &mut FeatureRequest) {}

    /// Emit the feature registers for `req`.
    ///
    /// Returns the TE option programmed, or `None` when TE was left alone.
    fn write_features(
        &mut self,
        _cx: &mut PanelCx<'_>,
        _req: &FeatureRequest,
    ) -> Result<Option<TeOption>, PanelError> {
        Err(PanelError::NotSupported("panel features"))
    }

    /// Make the panel leave auto mode at the next frame.
    fn send_early_exit(&mut self, _cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

type Constructor = fn() -> Box<dyn PanelVariant>;

static REGISTRY: [(&PanelDesc, Constructor); 5] = [
    (&ct3a::DESC, || Box::new(ct3a::Ct3a::default())),
    (&ct3b::DESC, || Box::new(ct3b::Ct3b::default())),
    (&ct3c::DESC, || Box::new(ct3c::Ct3c)),
    (&ct3d::DESC, || Box::new(ct3d::Ct3d::default())),
    (&ct3e::DESC, || Box::new(ct3e::Ct3e)),
];

/// Every compatible string a panel can be probed with.
pub fn compatibles() -> impl Iterator<Item = &'static str> {
    REGISTRY
        .iter()
        .flat_map(|(desc, _)| desc.compatible.iter().copied())
}

pub(crate) fn of_match(compatible: &str) -> Option<Box<dyn PanelVariant>> {
    REGISTRY
        .iter()
        .find(|(desc, _)| desc.compatible.contains(&compatible))
        .map(|(_, construct)| construct())
}

// =============================================================================
// Shared Sequences
// =============================================================================

/// Decode a revision code with the layout most panels use, `Latest` if unknown.
pub(crate) fn standard_revision(code: u8) -> PanelRevision {
    PanelRevision::from_code(code).unwrap_or_else(|| {
        warn!("unknown rev from panel ({code:#x}), default to latest");
        PanelRevision::Latest
    })
}

/// Lower-case hex of `bytes`.
pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn read_exact(cx: &mut PanelCx<'_>, reg: u8, buf: &mut [u8]) -> Result<(), PanelError> {
    let got = cx.dcs.read(reg, buf)?;
    if got != buf.len() {
        return Err(PanelError::ShortRead {
            reg,
            expected: buf.len(),
            got,
        });
    }
    Ok(())
}

const SLSI_DDIC_ID_REG: u8 = 0xD6;
const SLSI_DDIC_ID_LEN: usize = 6;

/// DDIC id of the Samsung LSI driver ICs.
pub(crate) fn read_slsi_id(cx: &mut PanelCx<'_>) -> Result<String, PanelError> {
    let mut buf = [0u8; SLSI_DDIC_ID_LEN];
    cx.dcs.write(&[0xF0, 0x5A, 0x5A])?;
    let read = read_exact(cx, SLSI_DDIC_ID_REG, &mut buf);
    cx.dcs.write(&[0xF0, 0xA5, 0xA5])?;
    read?;
    Ok(hex(&buf))
}

const NT_DDIC_ID_REG: u8 = 0xF2;
const NT_DDIC_ID_LEN: usize = 8;

/// DDIC id of the Novatek driver ICs, read from the `81` register page.
pub(crate) fn read_nt_id(cx: &mut PanelCx<'_>) -> Result<String, PanelError> {
    let mut buf = [0u8; NT_DDIC_ID_LEN];
    cx.dcs.write(&[0xFF, 0xAA, 0x55, 0xA5, 0x81])?;
    let read = read_exact(cx, NT_DDIC_ID_REG, &mut buf);
    cx.dcs.write(&[0xFF, 0xAA, 0x55, 0xA5, 0x00])?;
    if let Err(e) = &read {
        warn!("unable to read DDIC id: {e}");
    }
    read?;
    Ok(hex(&buf))
}

/// Write the DBV register, big-endian.
pub(crate) fn write_brightness(cx: &mut PanelCx<'_>, level: u16) -> Result<(), PanelError> {
    let [hi, lo] = level.to_be_bytes();
    cx.dcs.add_and_flush(&[crate::dsi::dcs::SET_DISPLAY_BRIGHTNESS, hi, lo])?;
    Ok(())
}

/// Generic LP entry: the description's LP command set.
pub(crate) fn enter_lp(cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
    let desc = cx.core.desc;
    if let Some(lp) = &desc.lp_cmdset {
        cx.send_cmdset(lp)?;
    }
    info!("enter {}hz LP mode", mode.vrefresh());
    Ok(())
}

/// Switch to the LP brightness bin for `brightness`.
///
/// Returns whether a bin was written. Outside the LP mode, or when the
/// bin is already active and `force` is not set, nothing is sent.
pub(crate) fn apply_binned_lp(
    cx: &mut PanelCx<'_>,
    brightness: u16,
    force: bool,
) -> Result<bool, PanelError> {
    if !cx.core.is_lp() {
        debug!("not in LP mode, skip binned LP");
        return Ok(false);
    }
    let desc = cx.core.desc;
    let Some(bin) = select_binned_lp(desc.binned_lp, brightness) else {
        return Ok(false);
    };
    if !force && cx.core.binned_lp.is_some_and(|current| std::ptr::eq(current, bin)) {
        return Ok(false);
    }

    let rev = cx.rev();
    add_for_revision(&mut cx.dcs, bin.cmds, rev);
    cx.dcs.flush()?;

    let is_off = desc.has_off_binned_lp_entry && desc.binned_lp.first().is_some_and(|first| std::ptr::eq(first, bin));
    cx.core.set_standby(is_off);
    cx.core.binned_lp = Some(bin);
    debug!("binned LP {} for brightness {brightness}", bin.name);
    Ok(true)
}

/// Power-on keeps the current rate when `mode` is faster than the operating rate.
pub(crate) fn keep_rate_above_op_hz(result: Result<(), PanelError>) -> Result<(), PanelError> {
    match result {
        Err(PanelError::VrefreshAboveOpHz { vrefresh, op_hz }) => {
            warn!("keep current rate on enable: {vrefresh}Hz above op_hz={op_hz}");
            Ok(())
        }
        other => other,
    }
}

/// Wait until the frame in flight has been scanned out.
///
/// With a vblank available the wait is one TE width past vblank; without
/// one the whole frame period is slept.
pub(crate) fn wait_for_vsync_done(cx: &mut PanelCx<'_>, te_us: u32, period_us: u32) {
    if cx.host.wait_for_vblank() {
        cx.sleep_us(te_us, te_us + 10);
    } else {
        let total = period_us + te_us;
        cx.sleep_us(total, total + 10);
    }
}

/// Pulse the reset line with the description's timing.
pub(crate) fn reset(cx: &mut PanelCx<'_>) {
    let timing = cx.core.desc.reset;
    if let Some(high_ms) = timing.high_ms {
        cx.host.set_reset(true);
        cx.host.delay_ms(high_ms);
    }
    cx.host.set_reset(false);
    cx.host.delay_ms(timing.low_ms);
    cx.host.set_reset(true);
    cx.host.delay_ms(timing.settle_ms);
    debug!("reset done");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_panel_has_both_compatibles() {
        let all: HashSet<_> = compatibles().collect();
        for name in ["ct3a", "ct3b", "ct3c", "ct3d", "ct3e"] {
            assert!(all.contains(format!("google,gs-{name}").as_str()));
            assert!(all.contains(format!("google,{name}").as_str()));
        }
    }

    #[test]
    fn test_of_match() {
        assert_eq!(of_match("google,ct3d").map(|v| v.desc().name), Some("ct3d"));
        assert!(of_match("google,gs-ct3x").is_none());
    }

    #[test]
    fn test_find_mode_prefers_normal_modes() {
        for (desc, _) in REGISTRY.iter() {
            for mode in desc.modes_for(false) {
                let found = desc.find_mode(mode.name, false).unwrap();
                assert!(!found.is_lp_mode);
                assert!(desc.owns_mode(found, false));
            }
            for lp in desc.lp_modes {
                assert!(desc.owns_mode(lp, false));
            }
        }
    }

    #[test]
    fn test_lp_modes_are_separate() {
        for (desc, _) in REGISTRY.iter() {
            assert!(!desc.lp_modes.is_empty(), "{}", desc.name);
            assert!(desc.lp_modes.iter().all(|mode| mode.is_lp_mode), "{}", desc.name);
            assert!(desc.modes.iter().all(|mode| !mode.is_lp_mode), "{}", desc.name);
        }
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x00, 0xAB, 0x0F]), "00ab0f");
    }
}
