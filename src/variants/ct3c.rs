//! ct3c: 1080x2424 outer display. Fixed 60/120 Hz, no auto frame insertion.

use super::{
    Luminance, PanelDesc, PanelVariant, ResetTiming, apply_binned_lp, enter_lp, keep_rate_above_op_hz, reset,
    standard_revision, wait_for_vsync_done, write_brightness,
};
use crate::brightness::{BinnedLp, BrightnessBand, BrightnessCapability, BrightnessConfig, Range};
use crate::cmd::{CmdSet, DsiCmd};
use crate::controller::PanelCx;
use crate::dsi::{WRCTRLD_BCTRL_BIT, WRCTRLD_DIMMING_BIT, dcs};
use crate::error::PanelError;
use crate::mode::{DSC_RC_RANGES_8BPC, DisplayTiming, DscConfig, PanelMode};
use crate::revision::{PanelRevision, RevisionMask};
use crate::state::HbmMode;

use log::{debug, info, warn};

const UNLOCK: &[u8] = &[0xF0, 0x5A, 0x5A];
const LOCK: &[u8] = &[0xF0, 0xA5, 0xA5];
const LTPS_UPDATE: &[u8] = &[0xF7, 0x0F];
const PIXEL_OFF: &[u8] = &[0x22];

const WIDTH_MM: u16 = 65;
const HEIGHT_MM: u16 = 146;

/// TE width of the LP mode, used when no mode is current.
const LP_TE_USEC: u32 = 1109;

const fn timing(fps: u32) -> DisplayTiming {
    DisplayTiming::new(fps, 1080, 44, 16, 20, 2424, 10, 6, 10)
}

static MODES: [PanelMode; 2] = [
    PanelMode::new("1080x2424@60:60", timing(60), WIDTH_MM, HEIGHT_MM).te_usec(8615),
    PanelMode::new("1080x2424@120:120", timing(120), WIDTH_MM, HEIGHT_MM).te_usec(276),
];

static LP_MODES: [PanelMode; 1] = [PanelMode::new("1080x2424@30:30", timing(30), WIDTH_MM, HEIGHT_MM)
    .te_usec(LP_TE_USEC)
    .lp()];

const GE_EVT1_1: RevisionMask = RevisionMask::ge(PanelRevision::Evt1_1);
const PROTO1_1_EVT1: RevisionMask = RevisionMask::PROTO1_1.union(RevisionMask::EVT1);

static LP_CMDS: [DsiCmd; 1] = [DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x24]).rev(GE_EVT1_1)];

static LP_LOW_CMDS: [DsiCmd; 6] = [
    DsiCmd::new(UNLOCK).rev(RevisionMask::PROTO1),
    // gamma IP bypass
    DsiCmd::new(&[0x91, 0x01]).rev(RevisionMask::PROTO1),
    // AOD 10 nits
    DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x25]).rev(RevisionMask::PROTO1),
    DsiCmd::new(LOCK).rev(RevisionMask::PROTO1),
    DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x25]).rev(PROTO1_1_EVT1),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x01, 0x7E]).rev(GE_EVT1_1),
];

static LP_HIGH_CMDS: [DsiCmd; 6] = [
    DsiCmd::new(UNLOCK).rev(RevisionMask::PROTO1),
    DsiCmd::new(&[0x91, 0x01]).rev(RevisionMask::PROTO1),
    // AOD 50 nits
    DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x24]).rev(RevisionMask::PROTO1),
    DsiCmd::new(LOCK).rev(RevisionMask::PROTO1),
    DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x24]).rev(PROTO1_1_EVT1),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x03, 0x1A]).rev(GE_EVT1_1),
];

static BINNED_LP: [BinnedLp; 2] = [
    // 40 nits
    BinnedLp::new("low", 717, &LP_LOW_CMDS).timing(12, 12 + 50),
    BinnedLp::new("high", 3427, &LP_HIGH_CMDS).timing(12, 12 + 50),
];

static OFF_CMDS: [DsiCmd; 2] = [
    DsiCmd::new(&[dcs::SET_DISPLAY_OFF]),
    DsiCmd::new(&[dcs::ENTER_SLEEP_MODE]).delay(120),
];

const LT_EVT1: RevisionMask = RevisionMask::lt(PanelRevision::Evt1);

static INIT_CMDS: [DsiCmd; 19] = [
    DsiCmd::new(&[dcs::SET_TEAR_ON]),
    DsiCmd::new(UNLOCK),
    // TE width
    DsiCmd::new(&[0xB9, 0x01]).rev(GE_EVT1_1),
    // FREQ CON
    DsiCmd::new(&[0xB0, 0x00, 0x27, 0xF2]),
    DsiCmd::new(&[0xF2, 0x02]),
    // TE2 on for 60 HS, 120 HS and AOD
    DsiCmd::new(&[0xB0, 0x00, 0x69, 0xCB]),
    DsiCmd::new(&[0xCB, 0x10, 0x00, 0x30]),
    DsiCmd::new(&[0xB0, 0x00, 0xE9, 0xCB]),
    DsiCmd::new(&[0xCB, 0x10, 0x00, 0x30]),
    DsiCmd::new(&[0xB0, 0x01, 0x69, 0xCB]),
    DsiCmd::new(&[0xCB, 0x10, 0x00, 0x2D]),
    // TSP sync
    DsiCmd::new(&[0xB0, 0x00, 0x0D, 0xB9]).rev(LT_EVT1),
    DsiCmd::new(&[0xB9, 0xB1, 0xA1]).rev(LT_EVT1),
    DsiCmd::new(LTPS_UPDATE),
    // ELVSS cal offset
    DsiCmd::new(&[0xB0, 0x00, 0x02, 0x63]).rev(RevisionMask::PROTO1_1),
    DsiCmd::new(&[0x63, 0x15, 0x0A, 0x15, 0x0A, 0x15, 0x0A]).rev(RevisionMask::PROTO1_1),
    DsiCmd::new(LOCK),
    // CASET 1080, PASET 2424
    DsiCmd::new(&[dcs::SET_COLUMN_ADDRESS, 0x00, 0x00, 0x04, 0x37]),
    DsiCmd::new(&[dcs::SET_PAGE_ADDRESS, 0x00, 0x00, 0x09, 0x77]),
];

static BRIGHTNESS: [BrightnessConfig; 1] = [BrightnessConfig {
    revisions: RevisionMask::ANY,
    // 140 nits
    default_brightness: 1290,
    capability: BrightnessCapability {
        normal: BrightnessBand {
            nits: Range::new(2, 1200),
            level: Range::new(184, 3427),
            percentage: Range::new(0, 67),
        },
        hbm: BrightnessBand {
            nits: Range::new(1200, 1800),
            level: Range::new(3428, 4095),
            percentage: Range::new(67, 100),
        },
    },
}];

pub(super) static DESC: PanelDesc = PanelDesc {
    name: "ct3c",
    compatible: &["google,gs-ct3c", "google,ct3c"],
    modes: &MODES,
    lp_modes: &LP_MODES,
    binned_lp: &BINNED_LP,
    has_off_binned_lp_entry: false,
    brightness: &BRIGHTNESS,
    luminance: Luminance {
        max: 10_000_000,
        max_avg: 1_200_000,
        min: 5,
    },
    init_cmdset: CmdSet {
        name: "init",
        cmds: &INIT_CMDS,
    },
    off_cmdset: CmdSet {
        name: "off",
        cmds: &OFF_CMDS,
    },
    lp_cmdset: Some(CmdSet {
        name: "lp",
        cmds: &LP_CMDS,
    }),
    idle_supported: false,
    thermal_zone: None,
    reset: ResetTiming {
        high_ms: None,
        low_ms: 1,
        settle_ms: 1,
    },
    // DSC 1.1 SCR V4
    dsc: Some(DscConfig {
        version_major: 1,
        version_minor: 1,
        slice_count: 2,
        slice_width: 540,
        slice_height: 101,
        pic_width: 1080,
        pic_height: 2424,
        bits_per_component: 8,
        bits_per_pixel: 128,
        initial_xmit_delay: 512,
        initial_dec_delay: 594,
        first_line_bpg_offset: 15,
        nfl_bpg_offset: 308,
        slice_bpg_offset: 258,
        scale_increment_interval: 2241,
        scale_decrement_interval: 7,
        final_offset: 4336,
        rc_range_params: DSC_RC_RANGES_8BPC,
    }),
    clock_override: None,
};

/// Register writes of the proto 1.0 rate switch.
struct ProtoRate {
    f6: &'static [u8],
    cb88: &'static [u8],
    cba6: &'static [u8],
    cbbf: &'static [u8],
    cb1fd: &'static [u8],
}

const PROTO_NS: ProtoRate = ProtoRate {
    f6: &[0xF6, 0x21, 0x0E],
    cb88: &[0xCB, 0x14, 0x13],
    cba6: &[0xCB, 0x03, 0x0A, 0x0F, 0x11],
    cbbf: &[0xCB, 0x06, 0x33, 0xF8, 0x06, 0x47, 0xD8, 0x06, 0x33, 0xD8, 0x06, 0x47],
    cb1fd: &[0xCB, 0x1B, 0x1B],
};

const PROTO_HS: ProtoRate = ProtoRate {
    f6: &[0xF6, 0x43, 0x1C],
    cb88: &[0xCB, 0x27, 0x26],
    cba6: &[0xCB, 0x07, 0x14, 0x20, 0x22],
    cbbf: &[0xCB, 0x0B, 0x19, 0xF8, 0x0B, 0x8D, 0xD8, 0x0B, 0x19, 0xD8, 0x0B, 0x8D],
    cb1fd: &[0xCB, 0x36, 0x36],
};

const EM_OFF_60HZ: &[u8] = &[
    0x65, 0x13, 0x20, 0x11, 0x38, 0x11, 0x38, 0x11, 0x38, 0x11, 0x38, 0x10, 0x1D, 0x0E, 0x9B, 0x0D, 0x18, 0x0B, 0x94,
    0x0A, 0x15, 0x08, 0x97, 0x07, 0x15, 0x02, 0x90, 0x02, 0x90, 0x01, 0x48, 0x01, 0x48,
];

const EM_OFF_120HZ: &[u8] = &[
    0x65, 0x09, 0x90, 0x08, 0x9C, 0x08, 0x9C, 0x08, 0x9C, 0x08, 0x9C, 0x08, 0x0E, 0x07, 0x4D, 0x06, 0x8C, 0x05, 0xCA,
    0x05, 0x0B, 0x04, 0x4C, 0x03, 0x8A, 0x01, 0x48, 0x01, 0x48, 0x00, 0xA4, 0x00, 0xA4,
];

#[derive(Debug)]
pub(super) struct Ct3c;

impl Ct3c {
    fn update_wrctrld(cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        let mut val = WRCTRLD_BCTRL_BIT;
        if cx.core.dimming_on {
            val |= WRCTRLD_DIMMING_BIT;
        }
        debug!(
            "wrctrld:{val:#x}, hbm_on: {}, dimming_on: {}",
            cx.core.hbm_mode.is_on(),
            cx.core.dimming_on
        );
        cx.dcs.add_and_flush(&[dcs::WRITE_CONTROL_DISPLAY, val])?;
        Ok(())
    }

    fn te_change(cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.dcs.add(UNLOCK).add(&[0xB9, 0x01]);
        cx.dcs.add_and_flush(LOCK)?;
        Ok(())
    }

    fn proto_change_frequency(cx: &mut PanelCx<'_>, vrefresh: u32) -> Result<(), PanelError> {
        let op_hz = cx.core.op_hz;
        if vrefresh > op_hz {
            return Err(PanelError::VrefreshAboveOpHz { vrefresh, op_hz });
        }

        cx.dcs.add(UNLOCK).add(&[0xB0, 0x00, 0x27, 0xF2]);
        let rate = if op_hz == 60 {
            cx.dcs
                .add(&[0xF2, 0x82])
                .add(&[0x60, 0x00])
                .add(&[0xB0, 0x00, 0x0E, 0xF2])
                .add(&[0xF2, 0x00, 0x0C]);
            &PROTO_NS
        } else {
            cx.dcs
                .add(&[0xF2, 0x02])
                .add(&[0x60, if vrefresh == 120 { 0x00 } else { 0x08 }])
                .add(&[0xB0, 0x00, 0x07, 0xF2]);
            if vrefresh == 120 {
                cx.dcs.add(&[0xF2, 0x00, 0x0C]);
            } else {
                cx.dcs.add(&[0xF2, 0x09, 0x9C]);
            }
            &PROTO_HS
        };
        cx.dcs
            .add(&[0xB0, 0x00, 0x4C, 0xF6])
            .add(rate.f6)
            .add(&[0xB0, 0x00, 0x88, 0xCB])
            .add(rate.cb88)
            .add(&[0xB0, 0x00, 0x8E, 0xCB])
            .add(rate.cb88)
            .add(&[0xB0, 0x00, 0xA6, 0xCB])
            .add(rate.cba6)
            .add(&[0xB0, 0x00, 0xBF, 0xCB])
            .add(rate.cbbf)
            .add(&[0xB0, 0x01, 0xFD, 0xCB])
            .add(rate.cb1fd)
            .add(LTPS_UPDATE);
        cx.dcs.add_and_flush(LOCK)?;

        info!("change to {vrefresh}Hz, op_hz={op_hz}");
        Ok(())
    }

    fn evt_change_frequency(cx: &mut PanelCx<'_>, vrefresh: u32) -> Result<(), PanelError> {
        cx.dcs.add(UNLOCK);
        // EM off
        if vrefresh == 60 {
            cx.dcs.add(&[0xB0, 0x01, 0xD4, 0x65]).add(EM_OFF_60HZ);
        } else {
            cx.dcs.add(&[0xB0, 0x01, 0xB4, 0x65]).add(EM_OFF_120HZ);
        }
        // gamma
        cx.dcs.add(&[0xB0, 0x00, 0x2A, 0x6A]).add(&[0x6A, 0x00, 0x00, 0x00]);
        // frequency and porch
        if vrefresh == 60 {
            cx.dcs
                .add(&[0x60, 0x00, 0x00])
                .add(&[0xB0, 0x00, 0x0E, 0xF2])
                .add(&[0xF2, 0x09, 0x9C]);
        } else {
            cx.dcs
                .add(&[0x60, 0x08, 0x00])
                .add(&[0xB0, 0x00, 0x07, 0xF2])
                .add(&[0xF2, 0x00, 0x0C]);
        }
        cx.dcs.add(LTPS_UPDATE);
        cx.dcs.add_and_flush(LOCK)?;

        Self::te_change(cx)?;
        info!("change to {vrefresh}Hz");
        Ok(())
    }

    fn change_frequency(cx: &mut PanelCx<'_>, mode: &PanelMode) -> Result<(), PanelError> {
        let vrefresh = mode.vrefresh();
        if vrefresh != 60 && vrefresh != 120 {
            warn!("invalid refresh rate {vrefresh}hz");
            return Ok(());
        }

        match cx.rev() {
            PanelRevision::Proto1 => Self::proto_change_frequency(cx, vrefresh),
            PanelRevision::Evt1 => Self::evt_change_frequency(cx, vrefresh),
            _ => {
                cx.dcs
                    .add(UNLOCK)
                    .add(&[0x60, if vrefresh == 120 { 0x08 } else { 0x00 }])
                    .add(LTPS_UPDATE);
                cx.dcs.add_and_flush(LOCK)?;
                info!("change to {vrefresh}Hz");
                Ok(())
            }
        }
    }

    fn set_10bit(cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.dcs.add(UNLOCK).add(&[0xB0, 0x28, 0xF2]).add(&[0xF2, 0xCC]);
        cx.dcs.add_and_flush(LOCK)?;
        Ok(())
    }
}

impl PanelVariant for Ct3c {
    fn desc(&self) -> &'static PanelDesc {
        &DESC
    }

    fn decode_revision(&self, id: u32) -> PanelRevision {
        let build_code = PanelRevision::build_code(id);
        let mut code = PanelRevision::code_from_build(build_code);
        // proto panels report one sub revision ahead
        if build_code & 0xE0 == 0 {
            code = code.wrapping_sub(1);
        }
        standard_revision(code)
    }

    fn enable(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        info!("enable");
        reset(cx);

        cx.dcs.write(&[dcs::EXIT_SLEEP_MODE])?;
        cx.delay_ms(120);

        Self::set_10bit(cx)?;
        cx.send_cmdset(&DESC.init_cmdset)?;
        keep_rate_above_op_hz(Self::change_frequency(cx, mode))?;

        cx.dcs.set_compression(true)?;
        if let Some(dsc) = &DESC.dsc {
            cx.dcs.write_pps(dsc)?;
        }
        // DSC enable, flushed with WRCTRLD
        cx.dcs.add(&[0xC2, 0x14]).add(&[0x9D, 0x01]);
        Self::update_wrctrld(cx)?;

        if mode.is_lp_mode {
            enter_lp(cx, mode)?;
        }

        cx.dcs.write(&[dcs::SET_DISPLAY_ON])?;
        Ok(())
    }

    fn set_brightness(&mut self, cx: &mut PanelCx<'_>, level: u16) -> Result<(), PanelError> {
        if cx.core.is_lp() {
            // pixel-off in AOD risks a black screen
            if cx.core.is_pixel_off {
                cx.dcs.write(&[dcs::ENTER_NORMAL_MODE])?;
                cx.core.is_pixel_off = false;
            }
            apply_binned_lp(cx, level, false)?;
            return Ok(());
        }

        if level == 0 {
            if !cx.core.is_pixel_off {
                cx.dcs.write(PIXEL_OFF)?;
                cx.core.is_pixel_off = true;
                debug!("pixel off instead of dbv 0");
            }
            return Ok(());
        }
        if cx.core.is_pixel_off {
            cx.dcs.write(&[dcs::ENTER_NORMAL_MODE])?;
            cx.core.is_pixel_off = false;
        }

        let max = cx
            .core
            .capability()
            .ok_or(PanelError::NotSupported("brightness capability"))?
            .hbm
            .level
            .max;
        let level = if level > max {
            warn!("capped to dbv({max})");
            max
        } else {
            level
        };
        write_brightness(cx, level)
    }

    fn set_hbm_mode(&mut self, cx: &mut PanelCx<'_>, mode: HbmMode) -> Result<(), PanelError> {
        cx.core.hbm_mode = mode;
        let irc_off = mode.is_irc_off();
        let rev = cx.rev();

        cx.dcs.add(UNLOCK);
        if rev == PanelRevision::Proto1 {
            // FGZ (IRC off) or flat gamma
            cx.dcs
                .add(&[0xB0, 0x01, 0x18, 0x68])
                .add(&[0x68, if irc_off { 0x82 } else { 0x00 }])
                .add(&[0xB0, 0x01, 0x19, 0x68])
                .add(&[
                    0x68, 0x00, 0x00, 0x00, 0x96, 0xFA, 0x0C, 0x80, 0x00, 0x00, 0x0A, 0xD5, 0xFF, 0x94, 0x00, 0x00,
                ]);
        } else {
            cx.dcs.add(&[0xB0, 0x01, 0x22, 0x68]);
            let fgz: &[u8] = match (irc_off, rev) {
                (false, _) => &[0x68, 0x00, 0x00, 0xFF, 0x90],
                (true, PanelRevision::Proto1_1) => &[0x68, 0x2D, 0xF1, 0xFF, 0x94],
                (true, PanelRevision::Evt1) => &[0x68, 0x40, 0x00, 0xFF, 0x9C],
                (true, _) => &[0x68, 0x28, 0xED, 0xFF, 0x94],
            };
            cx.dcs.add(fgz);
        }
        cx.dcs.add_and_flush(LOCK)?;

        info!("hbm_on={} hbm_ircoff={}", mode.is_on(), irc_off);
        Ok(())
    }

    fn set_dimming(&mut self, cx: &mut PanelCx<'_>, on: bool) -> Result<(), PanelError> {
        cx.core.dimming_on = on;
        if cx.core.is_lp() {
            warn!("in lp mode, skip to update");
            return Ok(());
        }
        Self::update_wrctrld(cx)
    }

    fn set_lp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        enter_lp(cx, mode)?;
        Self::te_change(cx)
    }

    fn set_nolp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        if !cx.core.power.is_active() {
            return Ok(());
        }
        let (vrefresh, te_usec) = cx
            .core
            .current_mode
            .map_or((30, LP_TE_USEC), |current| (current.vrefresh(), current.te_usec));

        cx.dcs.add(&[dcs::SET_DISPLAY_OFF]);
        // AOD off
        cx.dcs
            .add(UNLOCK)
            .add(&[0x91, 0x02])
            .add(&[dcs::WRITE_CONTROL_DISPLAY, 0x20]);
        cx.dcs.add_and_flush(LOCK)?;

        Self::update_wrctrld(cx)?;
        Self::change_frequency(cx, mode)?;

        wait_for_vsync_done(cx, te_usec, 1_000_000 / vrefresh.max(1));
        // TE variability
        cx.sleep_us(1000, 1010);

        cx.dcs.add_and_flush(&[dcs::SET_DISPLAY_ON])?;
        info!("exit LP mode");
        Ok(())
    }

    fn mode_set(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        Self::change_frequency(cx, mode)
    }

    fn set_op_hz(&mut self, cx: &mut PanelCx<'_>, hz: u32) -> Result<(), PanelError> {
        let mode = cx.core.current_mode()?;
        let vrefresh = mode.vrefresh();
        if vrefresh > hz || (hz != 60 && hz != 120) {
            return Err(PanelError::InvalidOpHz { hz, vrefresh });
        }

        cx.core.op_hz = hz;
        let rev = cx.rev();
        if rev == PanelRevision::Proto1 {
            Self::change_frequency(cx, mode)?;
            info!("set op_hz at {hz}");
        } else {
            info!("panel rev {rev} always operates at op_hz=120");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proto_revision_offset() {
        // proto: build code 0x04 reads as sub 1, meaning PROTO1
        assert_eq!(Ct3c.decode_revision(0x0000_0400), PanelRevision::Proto1);
        assert_eq!(Ct3c.decode_revision(0x0000_0800), PanelRevision::Proto1_1);
        assert_eq!(Ct3c.decode_revision(0x0000_4000), PanelRevision::Dvt1);
        // wraps to an unknown code
        assert_eq!(Ct3c.decode_revision(0x0000_0000), PanelRevision::Latest);
    }

    #[test]
    fn test_binned_lp_per_revision() {
        let low = &BINNED_LP[0];
        let proto: Vec<_> = low.cmds.iter().filter(|cmd| cmd.rev.matches(PanelRevision::Proto1)).collect();
        assert_eq!(proto.len(), 4);
        let dvt: Vec<_> = low.cmds.iter().filter(|cmd| cmd.rev.matches(PanelRevision::Dvt1)).collect();
        assert_eq!(dvt.len(), 1);
        assert_eq!(dvt[0].payload, &[0x51, 0x01, 0x7E]);
    }

    #[test]
    fn test_modes_have_te_widths() {
        assert!(MODES.iter().chain(LP_MODES.iter()).all(|mode| mode.te_usec > 0));
        assert_eq!(LP_MODES[0].vrefresh(), 30);
    }
}
