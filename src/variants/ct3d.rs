//! ct3d: 1080x2424 Novatek panel with FFC hopping and BEH self check.

use super::{Luminance, PanelDesc, PanelVariant, ResetTiming, apply_binned_lp, enter_lp, read_nt_id, reset};
use crate::atomic::ClockOverridePolicy;
use crate::brightness::{BinnedLp, BrightnessBand, BrightnessCapability, BrightnessConfig, Range};
use crate::cmd::{CmdSet, DsiCmd};
use crate::controller::{PanelCore, PanelCx};
use crate::dsi::dcs;
use crate::error::PanelError;
use crate::mode::{DisplayTiming, DscConfig, ModeType, PanelMode, RcRange};
use crate::refresh;
use crate::revision::{PanelRevision, RevisionMask};
use crate::state::HbmMode;

use log::{debug, info, warn};

const PAGE0: &[u8] = &[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x00];
const PAGE1: &[u8] = &[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x01];
const PAGE4: &[u8] = &[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x04];
const PAGE8: &[u8] = &[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x08];
const CMD3_PAGE1: &[u8] = &[0xFF, 0xAA, 0x55, 0xA5, 0x81];

const DIMMING_FRAMES: u8 = 32;

const BEH_REG: u8 = 0xBE;
const BEH_LEN: usize = 10;
const BEH_RETRIES: u32 = 3;

/// DSI HS clock the panel boots with.
pub const HS_CLOCK_DEFAULT_MBPS: u32 = 865;
/// Alternative DSI HS clock with its own FFC table.
pub const HS_CLOCK_ALTERNATIVE_MBPS: u32 = 756;

/// Width of TE2 when no timing is known, in lines.
const TE2_DEFAULT_WIDTH: u8 = 0x2D;

const WIDTH_MM: u16 = 64;
const HEIGHT_MM: u16 = 145;

const fn timing(fps: u32) -> DisplayTiming {
    DisplayTiming::new(fps, 1080, 32, 12, 16, 2424, 12, 4, 15)
}

static MODES: [PanelMode; 2] = [
    PanelMode::new("1080x2424@60:60", timing(60), WIDTH_MM, HEIGHT_MM)
        .mode_type(ModeType::PREFERRED)
        .te_usec(8604)
        .te2(0, 45),
    PanelMode::new("1080x2424@120:120", timing(120), WIDTH_MM, HEIGHT_MM)
        .te_usec(274)
        .te2(0, 45),
];

static LP_MODES: [PanelMode; 1] = [PanelMode::new("1080x2424@30:30", timing(30), WIDTH_MM, HEIGHT_MM)
    .mode_type(ModeType::DRIVER)
    .lp()];

static LP_CMDS: [DsiCmd; 8] = [
    // no black insertion in AOD
    DsiCmd::new(PAGE0),
    DsiCmd::new(&[0xC0, 0x54]),
    DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x20]),
    DsiCmd::new(&[dcs::ENTER_IDLE_MODE]),
    // AOD hclk
    DsiCmd::new(CMD3_PAGE1),
    DsiCmd::new(&[0x6F, 0x0E]),
    DsiCmd::new(&[0xF5, 0x20]),
    // lock TE2 at 30 Hz
    DsiCmd::new(&[0x5A, 0x04]),
];

const GE_EVT1_1: RevisionMask = RevisionMask::ge(PanelRevision::Evt1_1);
const LT_EVT1_1: RevisionMask = RevisionMask::lt(PanelRevision::Evt1_1);

static LP_OFF_CMDS: [DsiCmd; 2] = [
    DsiCmd::new(&[0x6F, 0x04]),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x00, 0x00]),
];

static LP_NIGHT_CMDS: [DsiCmd; 3] = [
    // 2 nits
    DsiCmd::new(&[0x6F, 0x04]),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x00, 0x03]).rev(GE_EVT1_1),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x03, 0x33]).rev(LT_EVT1_1),
];

static LP_LOW_CMDS: [DsiCmd; 3] = [
    // 10 nits
    DsiCmd::new(&[0x6F, 0x04]),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x07, 0xB2]).rev(GE_EVT1_1),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x03, 0x33]).rev(LT_EVT1_1),
];

static LP_HIGH_CMDS: [DsiCmd; 2] = [
    // 50 nits
    DsiCmd::new(&[0x6F, 0x04]),
    DsiCmd::new(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x0F, 0xFE]),
];

static BINNED_LP: [BinnedLp; 4] = [
    BinnedLp::new("off", 0, &LP_OFF_CMDS),
    // night threshold 4 nits
    BinnedLp::new("night", 105, &LP_NIGHT_CMDS).timing(0, 32),
    // low threshold 40 nits
    BinnedLp::new("low", 871, &LP_LOW_CMDS).timing(0, 32),
    BinnedLp::new("high", 3628, &LP_HIGH_CMDS).timing(0, 32),
];

static OFF_CMDS: [DsiCmd; 2] = [
    DsiCmd::new(&[dcs::SET_DISPLAY_OFF]).delay(100),
    DsiCmd::new(&[dcs::ENTER_SLEEP_MODE]).delay(120),
];

const FFC_DEFAULT: &[u8] = &[
    0xC3, 0xDD, 0x06, 0x20, 0x0E, 0xFF, 0x00, 0x06, 0x20, 0x0E, 0xFF, 0x00, 0x04, 0x79, 0x0E, 0x06, 0x12, 0x13, 0x04,
    0x79, 0x0E, 0x06, 0x12, 0x13, 0x04, 0x79, 0x0E, 0x06, 0x12, 0x13, 0x04, 0x79, 0x0E, 0x06, 0x12, 0x13, 0x04, 0x79,
    0x0E, 0x06, 0x12, 0x13,
];

const FFC_ALTERNATIVE: &[u8] = &[
    0xC3, 0xDD, 0x06, 0x20, 0x0C, 0xFF, 0x00, 0x06, 0x20, 0x0C, 0xFF, 0x00, 0x04, 0x63, 0x0C, 0x05, 0xD9, 0x10, 0x04,
    0x63, 0x0C, 0x05, 0xD9, 0x10, 0x04, 0x63, 0x0C, 0x05, 0xD9, 0x10, 0x04, 0x63, 0x0C, 0x05, 0xD9, 0x10, 0x04, 0x63,
    0x0C, 0x05, 0xD9, 0x10,
];

const GAMMA_RATE: &[u8] = &[
    0xB5, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x2A, 0x25, 0x25, 0x1B, 0x1B, 0x13, 0x13,
    0x0C, 0x0C, 0x0C, 0x0C, 0x07,
];

static INIT_CMDS: [DsiCmd; 65] = [
    // CMD2 page 0
    DsiCmd::new(PAGE0),
    DsiCmd::new(&[0x6F, 0x06]),
    DsiCmd::new(&[0xB5, 0x7F, 0x00, 0x2C, 0x00]),
    DsiCmd::new(&[0x6F, 0x11]),
    DsiCmd::new(&[0xB5, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C]),
    DsiCmd::new(&[0x6F, 0x1B]),
    DsiCmd::new(&[0xBA, 0x18]),
    DsiCmd::new(&[0x6F, 0x2D]),
    DsiCmd::new(GAMMA_RATE),
    DsiCmd::new(&[0x6F, 0x44]),
    DsiCmd::new(GAMMA_RATE),
    // CMD2 page 1
    DsiCmd::new(PAGE1),
    DsiCmd::new(&[0x6F, 0x05]),
    DsiCmd::new(&[0xC5, 0x15, 0x15, 0x15, 0xDD]),
    // FFC off, then the table for the default clock
    DsiCmd::new(&[0xC3, 0x00]),
    DsiCmd::new(FFC_DEFAULT),
    // CMD2 page 3
    DsiCmd::new(&[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x03]),
    // AOD TE width 1.9 ms
    DsiCmd::new(&[0x6F, 0x22]),
    DsiCmd::new(&[0xB3, 0x70, 0x7F]),
    // AOD power saving off
    DsiCmd::new(&[0xC7, 0x00]),
    // CMD2 page 4: longer DBI flash update cycle
    DsiCmd::new(PAGE4),
    DsiCmd::new(&[0xBB, 0xB3, 0x01, 0xBC]),
    // CMD2 page 7: round algorithm off
    DsiCmd::new(&[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x07]),
    DsiCmd::new(&[0xC0, 0x00]),
    // CMD3 page 0
    DsiCmd::new(&[0xFF, 0xAA, 0x55, 0xA5, 0x80]),
    DsiCmd::new(&[0x6F, 0x19]),
    DsiCmd::new(&[0xF2, 0x00]),
    DsiCmd::new(&[0x6F, 0x1A]),
    DsiCmd::new(&[0xF4, 0x55]),
    DsiCmd::new(&[0x6F, 0x2D]),
    DsiCmd::new(&[0xFC, 0x44]),
    DsiCmd::new(&[0x6F, 0x11]),
    DsiCmd::new(&[0xF8, 0x01, 0x7B]),
    DsiCmd::new(&[0x6F, 0x2D]),
    DsiCmd::new(&[0xF8, 0x01, 0x1D]),
    // CMD3 page 1
    DsiCmd::new(CMD3_PAGE1),
    DsiCmd::new(&[0x6F, 0x05]),
    DsiCmd::new(&[0xFE, 0x3C]),
    DsiCmd::new(&[0x6F, 0x02]),
    DsiCmd::new(&[0xF9, 0x04]),
    DsiCmd::new(&[0x6F, 0x1E]),
    DsiCmd::new(&[0xFB, 0x0F]),
    DsiCmd::new(&[0x6F, 0x0D]),
    DsiCmd::new(&[0xFB, 0x84]),
    DsiCmd::new(&[0x6F, 0x0F]),
    DsiCmd::new(&[0xF5, 0x20]),
    // CMD3 page 2
    DsiCmd::new(&[0xFF, 0xAA, 0x55, 0xA5, 0x82]),
    DsiCmd::new(&[0x6F, 0x09]),
    DsiCmd::new(&[0xF2, 0x55]),
    // CMD3 page 3
    DsiCmd::new(&[0xFF, 0xAA, 0x55, 0xA5, 0x83]),
    DsiCmd::new(&[0x6F, 0x12]),
    DsiCmd::new(&[0xFE, 0x41]),
    // CMD3 off
    DsiCmd::new(&[0xFF, 0xAA, 0x55, 0xA5, 0x00]),
    DsiCmd::new(&[dcs::SET_TEAR_SCANLINE, 0x00, 0x00]),
    DsiCmd::new(&[dcs::SET_TEAR_ON, 0x00, 0x2D]),
    // BC dimming off
    DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x20]),
    DsiCmd::new(&[dcs::SET_COLUMN_ADDRESS, 0x00, 0x00, 0x04, 0x37]),
    DsiCmd::new(&[dcs::SET_PAGE_ADDRESS, 0x00, 0x00, 0x09, 0x77]),
    // normal gamma
    DsiCmd::new(&[dcs::SET_GAMMA_CURVE, 0x00]),
    // CMD1, DPC temperature 25
    DsiCmd::new(&[0x81, 0x01, 0x19]),
    DsiCmd::new(&[0x03, 0x01]),
    DsiCmd::new(&[0x90, 0x03, 0x03]),
    // two DSC slices of 24 lines, DSC 1.2a
    DsiCmd::new(&[
        0x91, 0x89, 0xA8, 0x00, 0x18, 0xD2, 0x00, 0x02, 0x25, 0x02, 0x35, 0x00, 0x07, 0x04, 0x86, 0x04, 0x3D, 0x10,
        0xF0,
    ]),
    DsiCmd::new(&[0x2F, 0x02]),
    DsiCmd::new(&[dcs::EXIT_SLEEP_MODE]).delay(70),
];

static BRIGHTNESS: [BrightnessConfig; 1] = [BrightnessConfig {
    revisions: RevisionMask::ANY,
    default_brightness: 1816,
    capability: BrightnessCapability {
        normal: BrightnessBand {
            nits: Range::new(2, 1200),
            level: Range::new(1, 3628),
            percentage: Range::new(0, 67),
        },
        hbm: BrightnessBand {
            nits: Range::new(1200, 1800),
            level: Range::new(3629, 3939),
            percentage: Range::new(67, 100),
        },
    },
}];

pub(super) static DESC: PanelDesc = PanelDesc {
    name: "ct3d",
    compatible: &["google,gs-ct3d", "google,ct3d"],
    modes: &MODES,
    lp_modes: &LP_MODES,
    binned_lp: &BINNED_LP,
    has_off_binned_lp_entry: true,
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
        settle_ms: 20,
    },
    dsc: Some(DscConfig {
        slice_count: 2,
        slice_height: 24,
        first_line_bpg_offset: 13,
        rc_range_params: [
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(0, 0, 0),
            RcRange::signed(4, 10, -10),
            RcRange::signed(5, 10, -10),
            RcRange::signed(5, 11, -10),
            RcRange::signed(5, 11, -12),
            RcRange::signed(8, 12, -12),
            RcRange::signed(12, 13, -12),
        ],
        ..DscConfig::EMPTY
    }),
    clock_override: Some(ClockOverridePolicy {
        on_self_refresh_exit: false,
        on_lp_exit_to_60hz: true,
        restore_needs_active_changed: false,
        tracks_needs_commit: true,
    }),
};

/// TE2 rising edge and width for the current mode, as register bytes.
///
/// Falls back to the default width when no mode is set or the timing is
/// inverted or out of register range. `None` when the current mode carries
/// no TE2 timing.
fn te2_edges(core: &PanelCore) -> Option<(u8, u8)> {
    let Some(mode) = core.current_mode else {
        debug!("panel is not ready, use default TE2 setting");
        return Some((0, TE2_DEFAULT_WIDTH));
    };
    let timing = if mode.is_lp_mode {
        core.binned_lp.and_then(|bin| bin.te2_timing)
    } else {
        mode.te2_timing
    }?;
    let Some(width) = timing.falling_edge.checked_sub(timing.rising_edge) else {
        warn!("invalid TE2 timing, use default setting");
        return Some((0, TE2_DEFAULT_WIDTH));
    };
    match (u8::try_from(timing.rising_edge), u8::try_from(width)) {
        (Ok(rising), Ok(width)) => Some((rising, width)),
        _ => {
            warn!("TE2 timing {}..{} out of range, use default setting", timing.rising_edge, timing.falling_edge);
            Some((0, TE2_DEFAULT_WIDTH))
        }
    }
}

#[derive(Debug)]
pub(super) struct Ct3d {
    /// HBM2 (peak DBV with ACD level 3) is active.
    hbm2_enabled: bool,
    /// DSI HS clock the FFC table is tuned for.
    hs_clock_mbps: u32,
}

impl Default for Ct3d {
    fn default() -> Self {
        Self {
            hbm2_enabled: false,
            hs_clock_mbps: HS_CLOCK_DEFAULT_MBPS,
        }
    }
}

impl Ct3d {
    fn hbm_max(cx: &PanelCx<'_>) -> Option<u16> {
        cx.core.capability().map(|cap| cap.hbm.level.max)
    }

    /// Queue the HBM2 entry: peak DBV and ACD level 3.
    fn add_hbm2(&mut self, cx: &mut PanelCx<'_>) {
        cx.dcs
            .add(&[dcs::SET_DISPLAY_BRIGHTNESS, 0x0F, 0xFF])
            .add(&[0x55, 0x04])
            .add(PAGE0)
            .add(&[0x6F, 0x0C])
            .add(&[0xB0, 0x0E, 0x2C, 0x32]);
        self.hbm2_enabled = true;
    }

    /// Queue the HBM2 exit if it was on.
    fn add_hbm2_off(&mut self, cx: &mut PanelCx<'_>) {
        if self.hbm2_enabled {
            // ACD off
            cx.dcs.add(&[0x55, 0x00]);
        }
        self.hbm2_enabled = false;
    }

    /// Queue the per-rate gamma and IRC registers.
    fn add_rate_gamma(cx: &mut PanelCx<'_>, vrefresh: u32, gamma: u8, irc: u8) {
        if vrefresh == 120 {
            cx.dcs.add(&[0x2F, 0x00]).add(&[dcs::SET_GAMMA_CURVE, gamma]);
            if cx.rev() < PanelRevision::Pvt {
                cx.dcs.add(PAGE0).add(&[0x6F, 0x03]).add(&[0xC0, irc]);
            }
        } else {
            cx.dcs.add(&[0x2F, 0x02]).add(PAGE0).add(&[0x6F, 0x03]).add(&[0xC0, irc]);
        }
    }

    fn update_irc(&mut self, cx: &mut PanelCx<'_>, hbm: HbmMode, vrefresh: u32) -> Result<(), PanelError> {
        let level = cx.core.brightness;
        if hbm.is_irc_off() {
            if Self::hbm_max(cx) == Some(level) {
                self.add_hbm2(cx);
            } else {
                self.add_hbm2_off(cx);
            }
            info!("HBM2 enabled: {}", self.hbm2_enabled);
            cx.dcs.add(&[0x5F, 0x01]);
            Self::add_rate_gamma(cx, vrefresh, 0x02, 0x40);
        } else {
            cx.dcs.add(&[0x5F, 0x00]);
            Self::add_rate_gamma(cx, vrefresh, 0x00, 0x10);
            let [hi, lo] = level.to_be_bytes();
            cx.dcs.add(&[dcs::SET_DISPLAY_BRIGHTNESS, hi, lo]);
        }
        // empty write to flush
        cx.dcs.add_and_flush(&[0x00])?;
        Ok(())
    }

    fn change_frequency(&mut self, cx: &mut PanelCx<'_>, mode: &PanelMode) -> Result<(), PanelError> {
        let vrefresh = mode.vrefresh();
        if vrefresh != 60 && vrefresh != 120 {
            warn!("invalid refresh rate {vrefresh}hz");
            return Ok(());
        }

        let hbm = cx.core.hbm_mode;
        if hbm.is_on() {
            self.update_irc(cx, hbm, vrefresh)?;
        } else if vrefresh == 120 {
            cx.dcs.add(&[0x2F, 0x00]);
            cx.dcs.add_and_flush(&[dcs::SET_GAMMA_CURVE, 0x00])?;
        } else {
            cx.dcs.add(&[0x2F, 0x02]).add(PAGE0).add(&[0x6F, 0x03]);
            cx.dcs.add_and_flush(&[0xC0, 0x10])?;
        }
        debug!("change to {vrefresh}hz");
        Ok(())
    }

    fn dimming_frame_setting(cx: &mut PanelCx<'_>, frames: u8) -> Result<(), PanelError> {
        // zero means a single frame
        let frames = frames.max(1);
        cx.dcs.add(PAGE0).add(&[0xB2, 0x19]).add(&[0x6F, 0x05]);
        cx.dcs.add_and_flush(&[0xB2, frames, frames])?;
        Ok(())
    }

    /// Read the BEh sanity pattern. Read failures count as a mismatch.
    fn beh_ok(cx: &mut PanelCx<'_>) -> Result<bool, PanelError> {
        cx.dcs.write(PAGE4)?;
        let mut buf = [0u8; BEH_LEN];
        match cx.dcs.read(BEH_REG, &mut buf) {
            Ok(BEH_LEN) => {}
            Ok(got) => {
                warn!("unable to read BEh values ({got} bytes)");
                return Ok(false);
            }
            Err(e) => {
                warn!("unable to read BEh values: {e}");
                return Ok(false);
            }
        }
        Ok(matches!(buf, [0, 2, 0, _, _, 0, _, 0, 6, 3]))
    }

    /// SPI clock of the DDIC flash, 23 or 34 MHz.
    fn change_spi_speed(cx: &mut PanelCx<'_>, mhz: u32) -> Result<(), PanelError> {
        let slow = mhz == 23;
        cx.dcs
            .add(PAGE4)
            .add(&[0xC2, if slow { 0x14 } else { 0x12 }])
            .add(PAGE8);
        cx.dcs.add_and_flush(&[0xC2, if slow { 0x00 } else { 0x33 }])?;
        Ok(())
    }

    /// Verify BEh, cycling sleep at the slow SPI clock until it reads back.
    fn verify_beh(cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        if Self::beh_ok(cx)? {
            return Ok(());
        }
        warn!("reading BEh failed at first try");
        Self::change_spi_speed(cx, 23)?;

        let mut retry = 0;
        let mut ok = false;
        while retry < BEH_RETRIES && !ok {
            cx.dcs.write(&[dcs::ENTER_SLEEP_MODE])?;
            cx.delay_ms(120);
            cx.dcs.write(&[dcs::EXIT_SLEEP_MODE])?;
            cx.delay_ms(120);
            ok = Self::beh_ok(cx)?;
            retry += 1;
        }

        if ok {
            info!("read BEh after {retry} retries");
        } else {
            warn!("failed to read BEh {retry} times");
        }
        Self::change_spi_speed(cx, 34)
    }
}

impl PanelVariant for Ct3d {
    fn desc(&self) -> &'static PanelDesc {
        &DESC
    }

    fn read_id(&mut self, cx: &mut PanelCx<'_>) -> Result<String, PanelError> {
        read_nt_id(cx)
    }

    fn panel_init(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        Self::dimming_frame_setting(cx, DIMMING_FRAMES)
    }

    fn enable(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        debug!("enable");
        reset(cx);
        cx.send_cmdset(&DESC.init_cmdset)?;
        self.change_frequency(cx, mode)?;
        Self::verify_beh(cx)?;
        Self::dimming_frame_setting(cx, DIMMING_FRAMES)?;

        if mode.is_lp_mode {
            enter_lp(cx, mode)?;
        }
        cx.dcs.write(&[dcs::SET_DISPLAY_ON])?;
        self.hs_clock_mbps = HS_CLOCK_DEFAULT_MBPS;
        Ok(())
    }

    fn disable(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        self.hbm2_enabled = false;
        cx.send_cmdset(&DESC.off_cmdset)
    }

    fn set_brightness(&mut self, cx: &mut PanelCx<'_>, level: u16) -> Result<(), PanelError> {
        if cx.core.is_lp() {
            apply_binned_lp(cx, level, false)?;
            return Ok(());
        }

        if cx.core.hbm_mode.is_irc_off() && Self::hbm_max(cx) == Some(level) {
            self.add_hbm2(cx);
            cx.dcs.flush()?;
            info!("HBM2 enabled: {}", self.hbm2_enabled);
        } else {
            if self.hbm2_enabled {
                info!("HBM2 enabled: off");
            }
            self.add_hbm2_off(cx);
            let [hi, lo] = level.to_be_bytes();
            cx.dcs.add_and_flush(&[dcs::SET_DISPLAY_BRIGHTNESS, hi, lo])?;
        }
        Ok(())
    }

    fn set_hbm_mode(&mut self, cx: &mut PanelCx<'_>, mode: HbmMode) -> Result<(), PanelError> {
        if cx.core.hbm_mode == mode {
            return Ok(());
        }
        let vrefresh = cx.core.current_mode()?.vrefresh();

        cx.dcs.add(PAGE0).add(&[0x6F, 0x11]);
        if mode.is_on() {
            cx.dcs.add_and_flush(&[0xB2, 0x00, 0x00, 0x41])?;
        } else {
            cx.dcs.add_and_flush(&[0xB2, 0x01, 0x01, 0x43])?;
        }
        self.update_irc(cx, mode, vrefresh)?;

        cx.core.hbm_mode = mode;
        info!("hbm_on={} hbm_ircoff={}", mode.is_on(), mode.is_irc_off());
        Ok(())
    }

    fn set_dimming(&mut self, cx: &mut PanelCx<'_>, on: bool) -> Result<(), PanelError> {
        cx.core.dimming_on = on;
        if cx.core.is_lp() {
            warn!("in lp mode, skip dimming update");
            return Ok(());
        }
        cx.dcs.write(&[dcs::WRITE_CONTROL_DISPLAY, if on { 0x28 } else { 0x20 }])?;
        debug!("dimming_on={on}");
        Ok(())
    }

    fn set_nolp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        if !cx.core.power.is_active() {
            return Ok(());
        }

        // exit AOD
        cx.dcs
            .add(PAGE0)
            .add(&[0xC0, 0x54])
            .add(&[dcs::EXIT_IDLE_MODE])
            .add(CMD3_PAGE1)
            .add(&[0x6F, 0x0E])
            .add(&[0xF5, 0x2B])
            .add(&[0x5A, 0x04]);
        let wrctrld = if cx.core.dimming_on { 0x28 } else { 0x20 };
        cx.dcs.add_and_flush(&[dcs::WRITE_CONTROL_DISPLAY, wrctrld])?;

        self.change_frequency(cx, mode)?;
        info!("exit LP mode");
        Ok(())
    }

    fn mode_set(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        self.change_frequency(cx, mode)
    }

    fn update_te2(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.core.te2_option = refresh::te2_option(cx.core);
        let Some((rising, width)) = te2_edges(cx.core) else {
            return Ok(());
        };
        debug!("TE2 updated: rising={rising:#x}, width={width:#x}");
        cx.dcs.add(&[dcs::SET_TEAR_SCANLINE, 0x00, rising]);
        cx.dcs.add_and_flush(&[dcs::SET_TEAR_ON, 0x00, width])?;
        Ok(())
    }

    fn pre_update_ffc(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        debug!("FFC off");
        cx.dcs.add(PAGE1);
        cx.dcs.add_and_flush(&[0xC3, 0x00])?;
        Ok(())
    }

    fn update_ffc(&mut self, cx: &mut PanelCx<'_>, hs_clock_mbps: u32) -> Result<(), PanelError> {
        debug!("hs_clk_mbps: current={}, target={hs_clock_mbps}", self.hs_clock_mbps);

        let table = match hs_clock_mbps {
            HS_CLOCK_DEFAULT_MBPS => Some(FFC_DEFAULT),
            HS_CLOCK_ALTERNATIVE_MBPS => Some(FFC_ALTERNATIVE),
            _ => {
                warn!("invalid hs_clk_mbps={hs_clock_mbps} for FFC");
                None
            }
        };
        if let Some(table) = table.filter(|_| self.hs_clock_mbps != hs_clock_mbps) {
            info!("updating FFC for hs_clk_mbps={hs_clock_mbps}");
            self.hs_clock_mbps = hs_clock_mbps;
            cx.dcs.add(PAGE1).add(table);
        }

        // FFC on
        cx.dcs.add(PAGE1);
        cx.dcs.add_and_flush(&[0xC3, 0xDD])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;

    #[test]
    fn test_ffc_tables_differ_only_in_timing() {
        assert_eq!(FFC_DEFAULT.len(), FFC_ALTERNATIVE.len());
        assert_eq!(&FFC_DEFAULT[..3], &FFC_ALTERNATIVE[..3]);
        assert_ne!(FFC_DEFAULT, FFC_ALTERNATIVE);
    }

    #[test]
    fn test_binned_lp_has_off_entry() {
        assert!(DESC.has_off_binned_lp_entry);
        assert_eq!(BINNED_LP[0].bl_threshold, 0);
        assert!(BINNED_LP[0].te2_timing.is_none());
        assert!(BINNED_LP[1..].iter().all(|bin| bin.te2_timing.is_some()));
    }

    #[test]
    fn test_night_bin_depends_on_revision() {
        let dbv = |rev| {
            LP_NIGHT_CMDS
                .iter()
                .filter(|cmd| cmd.rev.matches(rev))
                .map(|cmd| cmd.payload)
                .collect::<Vec<_>>()
        };
        assert_eq!(dbv(PanelRevision::Evt1)[1], &[0x51, 0x03, 0x33]);
        assert_eq!(dbv(PanelRevision::Pvt)[1], &[0x51, 0x00, 0x03]);
    }

    #[test]
    fn test_te2_edges_fit_registers() {
        static WIDE: PanelMode = PanelMode::new("1080x2424@60:60", timing(60), WIDTH_MM, HEIGHT_MM).te2(0x10, 0x140);
        static INVERTED: PanelMode = PanelMode::new("1080x2424@60:60", timing(60), WIDTH_MM, HEIGHT_MM).te2(0x20, 0x10);

        let mut core = PanelCore::new(&DESC, PanelConfig::default());
        assert_eq!(te2_edges(&core), Some((0, TE2_DEFAULT_WIDTH)));

        core.current_mode = DESC.modes.iter().find(|mode| mode.te2_timing.is_some());
        let timing = core.current_mode.and_then(|mode| mode.te2_timing).unwrap();
        let expected = (timing.rising_edge as u8, (timing.falling_edge - timing.rising_edge) as u8);
        assert_eq!(te2_edges(&core), Some(expected));

        core.current_mode = Some(&WIDE);
        assert_eq!(te2_edges(&core), Some((0, TE2_DEFAULT_WIDTH)));
        core.current_mode = Some(&INVERTED);
        assert_eq!(te2_edges(&core), Some((0, TE2_DEFAULT_WIDTH)));
    }

    #[test]
    fn test_init_ends_with_sleep_out() {
        let last = INIT_CMDS.last().unwrap();
        assert_eq!(last.payload, &[dcs::EXIT_SLEEP_MODE]);
        assert_eq!(last.delay_ms, 70);
    }
}
