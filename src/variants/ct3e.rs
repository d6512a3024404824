//! ct3e: 1080x2424 Samsung LSI panel, fixed 60/120 Hz.

use super::{Luminance, PanelDesc, PanelVariant, ResetTiming, apply_binned_lp, enter_lp, reset, wait_for_vsync_done, write_brightness};
use crate::brightness::{BinnedLp, BrightnessBand, BrightnessCapability, BrightnessConfig, Range};
use crate::cmd::{CmdSet, DsiCmd};
use crate::controller::PanelCx;
use crate::dsi::{WRCTRLD_BCTRL_BIT, WRCTRLD_DIMMING_BIT, dcs};
use crate::error::PanelError;
use crate::mode::{DisplayTiming, DscConfig, PanelMode, RcRange};
use crate::revision::RevisionMask;
use crate::state::HbmMode;

use log::{debug, info, warn};

const UNLOCK: &[u8] = &[0xF0, 0x5A, 0x5A];
const LOCK: &[u8] = &[0xF0, 0xA5, 0xA5];
const PIXEL_OFF: &[u8] = &[0x22];

const WIDTH_MM: u16 = 65;
const HEIGHT_MM: u16 = 146;

const LP_TE_USEC: u32 = 1109;

const fn timing(fps: u32) -> DisplayTiming {
    DisplayTiming::new(fps, 1080, 44, 16, 20, 2424, 10, 6, 10)
}

static MODES: [PanelMode; 2] = [
    PanelMode::new("1080x2424@60:60", timing(60), WIDTH_MM, HEIGHT_MM).te_usec(8605),
    PanelMode::new("1080x2424@120:120", timing(120), WIDTH_MM, HEIGHT_MM).te_usec(276),
];

static LP_MODES: [PanelMode; 1] = [PanelMode::new("1080x2424@30:30", timing(30), WIDTH_MM, HEIGHT_MM)
    .te_usec(LP_TE_USEC)
    .lp()];

static LP_CMDS: [DsiCmd; 1] = [DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x24])];

static LP_LOW_CMDS: [DsiCmd; 1] = [DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x01, 0x7E])];
static LP_HIGH_CMDS: [DsiCmd; 1] = [DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x03, 0x1A])];

static BINNED_LP: [BinnedLp; 2] = [
    // 40 nits
    BinnedLp::new("low", 717, &LP_LOW_CMDS).timing(12, 12 + 50),
    BinnedLp::new("high", 3427, &LP_HIGH_CMDS).timing(12, 12 + 50),
];

static OFF_CMDS: [DsiCmd; 2] = [
    DsiCmd::new(&[dcs::SET_DISPLAY_OFF]),
    DsiCmd::new(&[dcs::ENTER_SLEEP_MODE]).delay(120),
];

static INIT_CMDS: [DsiCmd; 11] = [
    DsiCmd::new(&[dcs::SET_TEAR_ON]),
    // TE2
    DsiCmd::new(UNLOCK),
    DsiCmd::new(&[0xB0, 0x00, 0x26, 0xB9]),
    DsiCmd::new(&[0xB9, 0x00, 0x00, 0x10, 0x00, 0x00, 0x3D, 0x00, 0x09, 0x90, 0x00, 0x09, 0x90]),
    // CASET 1080, PASET 2424
    DsiCmd::new(&[dcs::SET_COLUMN_ADDRESS, 0x00, 0x00, 0x04, 0x37]),
    DsiCmd::new(&[dcs::SET_PAGE_ADDRESS, 0x00, 0x00, 0x09, 0x77]),
    // TSP hsync
    DsiCmd::new(&[0xB0, 0x00, 0x42, 0xB9]),
    DsiCmd::new(&[0xB9, 0x19]),
    DsiCmd::new(&[0xB0, 0x00, 0x46, 0xB9]),
    DsiCmd::new(&[0xB9, 0xB0]),
    DsiCmd::new(LOCK),
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
    name: "ct3e",
    compatible: &["google,gs-ct3e", "google,ct3e"],
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
        high_ms: Some(1),
        low_ms: 1,
        settle_ms: 1,
    },
    dsc: Some(DscConfig {
        version_major: 1,
        version_minor: 2,
        slice_count: 2,
        slice_width: 540,
        slice_height: 101,
        pic_width: 1080,
        pic_height: 2424,
        bits_per_component: 8,
        bits_per_pixel: 128,
        initial_xmit_delay: 512,
        initial_dec_delay: 526,
        first_line_bpg_offset: 12,
        nfl_bpg_offset: 246,
        slice_bpg_offset: 258,
        scale_increment_interval: 2517,
        scale_decrement_interval: 7,
        final_offset: 4336,
        rc_range_params: [
            RcRange::new(0, 4, 2),
            RcRange::new(0, 4, 0),
            RcRange::new(1, 5, 0),
            RcRange::new(1, 6, 62),
            RcRange::new(3, 7, 60),
            RcRange::new(3, 7, 58),
            RcRange::new(3, 7, 56),
            RcRange::new(3, 8, 56),
            RcRange::new(3, 9, 56),
            RcRange::new(3, 10, 54),
            RcRange::new(5, 11, 54),
            RcRange::new(5, 12, 52),
            RcRange::new(5, 13, 52),
            RcRange::new(7, 13, 52),
            RcRange::new(13, 15, 52),
        ],
    }),
    clock_override: None,
};

#[derive(Debug)]
pub(super) struct Ct3e;

impl Ct3e {
    fn change_frequency(cx: &mut PanelCx<'_>, mode: &PanelMode) -> Result<(), PanelError> {
        let vrefresh = mode.vrefresh();
        if vrefresh != 60 && vrefresh != 120 {
            warn!("invalid refresh rate {vrefresh}hz");
            return Ok(());
        }
        cx.dcs
            .add(UNLOCK)
            .add(&[0x83, if vrefresh == 120 { 0x00 } else { 0x08 }])
            .add(&[0xF7, 0x2F]);
        cx.dcs.add_and_flush(LOCK)?;
        info!("change to {vrefresh}Hz");
        Ok(())
    }

    fn update_wrctrld(cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        let mut val = WRCTRLD_BCTRL_BIT;
        if cx.core.dimming_on {
            val |= WRCTRLD_DIMMING_BIT;
        }
        debug!(
            "wrctrld: {val:#x}, hbm: {}, dimming: {}",
            cx.core.hbm_mode.is_on(),
            cx.core.dimming_on
        );
        cx.dcs.add_and_flush(&[dcs::WRITE_CONTROL_DISPLAY, val])?;
        Ok(())
    }
}

impl PanelVariant for Ct3e {
    fn desc(&self) -> &'static PanelDesc {
        &DESC
    }

    fn enable(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        info!("enable");
        reset(cx);

        cx.dcs.write(&[dcs::EXIT_SLEEP_MODE])?;
        cx.delay_ms(120);

        cx.send_cmdset(&DESC.init_cmdset)?;
        Self::change_frequency(cx, mode)?;

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

        let Some(cap) = cx.core.capability() else {
            return Err(PanelError::NotSupported("brightness capability"));
        };
        let max = cap.hbm.level.max;
        if level > max {
            warn!("capped to dbv({max})");
        }
        write_brightness(cx, level.min(max))
    }

    fn set_hbm_mode(&mut self, cx: &mut PanelCx<'_>, mode: HbmMode) -> Result<(), PanelError> {
        cx.core.hbm_mode = mode;

        // EM cycle
        cx.dcs.add(UNLOCK).add(&[0xB0, 0x00, 0x01, 0xBD]);
        if mode.is_on() {
            cx.dcs.add(&[0xBD, 0x80]).add(&[0xB0, 0x00, 0x2E, 0xBD]).add(&[0xBD, 0x00, 0x01]);
        } else {
            cx.dcs.add(&[0xBD, 0x81]).add(&[0xB0, 0x00, 0x2E, 0xBD]).add(&[0xBD, 0x00, 0x02]);
        }
        cx.dcs.add(&[0xF7, 0x2F]);
        cx.dcs.add_and_flush(LOCK)?;

        debug!("hbm_on={} hbm_ircoff={}", mode.is_on(), mode.is_irc_off());
        Ok(())
    }

    fn set_dimming(&mut self, cx: &mut PanelCx<'_>, on: bool) -> Result<(), PanelError> {
        cx.core.dimming_on = on;
        if cx.core.is_lp() {
            warn!("in lp mode; skip updating dimming_on");
            return Ok(());
        }
        Self::update_wrctrld(cx)
    }

    fn set_nolp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        if !cx.core.power.is_active() {
            return Ok(());
        }
        let (vrefresh, te_usec) = cx
            .core
            .current_mode
            .map_or((30, LP_TE_USEC), |current| (current.vrefresh(), current.te_usec));

        // AOD off
        cx.dcs.add(UNLOCK).add(&[dcs::WRITE_CONTROL_DISPLAY, 0x20]);
        cx.dcs.add_and_flush(LOCK)?;

        Self::update_wrctrld(cx)?;
        Self::change_frequency(cx, mode)?;

        wait_for_vsync_done(cx, te_usec, 1_000_000 / vrefresh.max(1));
        // TE variability
        cx.sleep_us(1000, 1010);

        info!("exit LP mode");
        Ok(())
    }

    fn mode_set(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        Self::change_frequency(cx, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::PanelRevision;

    #[test]
    fn test_standard_revision_decode() {
        assert_eq!(Ct3e.decode_revision(0x0000_4000), PanelRevision::Dvt1);
        assert_eq!(Ct3e.decode_revision(0x0000_0400), PanelRevision::Proto1_1);
    }

    #[test]
    fn test_init_is_wrapped_in_test_keys() {
        assert_eq!(INIT_CMDS[1].payload, UNLOCK);
        assert_eq!(INIT_CMDS.last().map(|cmd| cmd.payload), Some(LOCK));
    }

    #[test]
    fn test_lp_mode_timing() {
        assert!(LP_MODES[0].is_lp_mode);
        assert_eq!(LP_MODES[0].vrefresh(), 30);
        assert_eq!(LP_MODES[0].te_usec, LP_TE_USEC);
    }
}
