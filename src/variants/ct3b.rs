//! ct3b: Novatek driven sibling of ct3a with a single HS VRR mode.

use super::{
    Luminance, PanelDesc, PanelVariant, ResetTiming, apply_binned_lp, keep_rate_above_op_hz, read_nt_id, reset,
    write_brightness,
};
use crate::atomic::ClockOverridePolicy;
use crate::brightness::{BinnedLp, BrightnessBand, BrightnessCapability, BrightnessConfig, Range};
use crate::cmd::{CmdSet, DsiCmd};
use crate::controller::{PanelCore, PanelCx};
use crate::dsi::{WRCTRLD_BCTRL_BIT, WRCTRLD_DIMMING_BIT, dcs};
use crate::error::PanelError;
use crate::mode::{Availability, DisplayTiming, DscConfig, IdleMode, ModeFlags, ModeType, PanelMode, RcRange};
use crate::refresh::{self, FeatureRequest};
use crate::revision::{PanelRevision, RevisionMask};
use crate::state::{Features, HbmMode, TeOption};

use log::{debug, info, warn};

const PAGE0: &[u8] = &[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x00];
const PAGE81: &[u8] = &[0xFF, 0xAA, 0x55, 0xA5, 0x81];

/// Frames of the brightness dimming transition.
const DIMMING_FRAMES: u8 = 32;

const TE_USEC_120HZ_HS: u32 = 888;

const WIDTH_MM: u16 = 147;
const HEIGHT_MM: u16 = 141;

const fn timing(fps: u32) -> DisplayTiming {
    DisplayTiming::new(fps, 2152, 80, 30, 38, 2076, 6, 4, 14)
}

static MODES: [PanelMode; 6] = [
    PanelMode::new("2152x2076@1:1", timing(1), WIDTH_MM, HEIGHT_MM).availability(Availability::FactoryOnly),
    PanelMode::new("2152x2076@10:10", timing(10), WIDTH_MM, HEIGHT_MM).availability(Availability::FactoryOnly),
    PanelMode::new("2152x2076@30:30", timing(30), WIDTH_MM, HEIGHT_MM).availability(Availability::FactoryOnly),
    PanelMode::new("2152x2076@60:60", timing(60), WIDTH_MM, HEIGHT_MM)
        .flags(ModeFlags::BTS_OP_RATE)
        .mode_type(ModeType::PREFERRED)
        .idle(IdleMode::OnInactivity),
    PanelMode::new("2152x2076@120:120", timing(120), WIDTH_MM, HEIGHT_MM)
        .flags(ModeFlags::BTS_OP_RATE)
        .te_usec(TE_USEC_120HZ_HS)
        .idle(IdleMode::OnInactivity),
    PanelMode::new("2152x2076@120:120", timing(120), WIDTH_MM, HEIGHT_MM)
        .flags(ModeFlags::TE_FREQ_X1)
        .mode_type(ModeType::VRR.union(ModeType::PREFERRED))
        .te_usec(TE_USEC_120HZ_HS)
        .availability(Availability::ProductionOnly),
];

static LP_MODES: [PanelMode; 1] = [PanelMode::new(
    "2152x2076@30:30",
    DisplayTiming::new(30, 2152, 80, 32, 36, 2076, 6, 4, 14),
    WIDTH_MM,
    HEIGHT_MM,
)
.mode_type(ModeType::DRIVER)
.lp()];

static BINNED_LP: [BinnedLp; 2] = [
    // 10 nits
    BinnedLp::new(
        "low",
        1094,
        &[DsiCmd::new(&[0x6F, 0x04]), DsiCmd::new(&[0x51, 0x03, 0x33])],
    )
    .timing(0, 32),
    // 50 nits
    BinnedLp::new(
        "high",
        3739,
        &[DsiCmd::new(&[0x6F, 0x04]), DsiCmd::new(&[0x51, 0x0F, 0xFE])],
    )
    .timing(0, 32),
];

static OFF_CMDS: [DsiCmd; 2] = [
    DsiCmd::new(&[dcs::SET_DISPLAY_OFF]),
    DsiCmd::new(&[dcs::ENTER_SLEEP_MODE]).delay(120),
];

const LT_EVT1_1: RevisionMask = RevisionMask::lt(PanelRevision::Evt1_1);
const GE_EVT1_1: RevisionMask = RevisionMask::ge(PanelRevision::Evt1_1);

const B5_GAMMA: &[u8] = &[
    0xB5, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x2C, 0x25, 0x25, 0x20, 0x20, 0x16,
    0x16, 0x08, 0x08, 0x04, 0x04, 0x04,
];
const BA_ZERO: &[u8] = &[
    0xBA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

static INIT_CMDS: [DsiCmd; 118] = [
    DsiCmd::new(PAGE0),
    DsiCmd::new(&[0x6F, 0x06]),
    DsiCmd::new(&[0xB5, 0x7F, 0x00, 0x59, 0x67]),
    DsiCmd::new(&[0x6F, 0x11]),
    DsiCmd::new(&[0xB5, 0x59, 0x59, 0x59, 0x59, 0x59]),
    DsiCmd::new(&[0x6F, 0x2D]),
    DsiCmd::new(B5_GAMMA),
    DsiCmd::new(&[0x6F, 0x44]),
    DsiCmd::new(B5_GAMMA),
    DsiCmd::new(&[0x6F, 0x1B]),
    DsiCmd::new(&[0xBA, 0x08]),
    DsiCmd::new(&[0x6F, 0x1C]),
    DsiCmd::new(&[
        0xBA, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ]),
    DsiCmd::new(&[0x6F, 0x2C]),
    DsiCmd::new(BA_ZERO),
    DsiCmd::new(&[0x6F, 0x3C]),
    DsiCmd::new(BA_ZERO),
    DsiCmd::new(&[0x6F, 0x4C]),
    DsiCmd::new(BA_ZERO),
    DsiCmd::new(&[0x6F, 0x5C]),
    DsiCmd::new(&[
        0xBA, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    ]),
    DsiCmd::new(&[0x6F, 0x6C]),
    DsiCmd::new(&[
        0xBA, 0x01, 0x03, 0x0B, 0x77, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ])
    .rev(LT_EVT1_1),
    DsiCmd::new(&[
        0xBA, 0x00, 0x01, 0x03, 0x0B, 0x77, 0x01, 0x05, 0x3B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ])
    .rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x7C]),
    DsiCmd::new(&[
        0xBA, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ])
    .rev(LT_EVT1_1),
    DsiCmd::new(&[
        0xBA, 0x00, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ])
    .rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x8C]),
    DsiCmd::new(BA_ZERO),
    DsiCmd::new(&[0x6F, 0x9C]),
    DsiCmd::new(&[0xBA, 0x11, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
    DsiCmd::new(&[0x6F, 0xA4]),
    DsiCmd::new(&[0xBA, 0x00, 0x00, 0x00, 0x00]),
    DsiCmd::new(&[0x6F, 0xA8]),
    DsiCmd::new(&[0xBA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]).rev(LT_EVT1_1),
    DsiCmd::new(&[0xBA, 0x00, 0x00, 0x10, 0x11, 0x00, 0x00, 0x00, 0x00]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0xB0]),
    DsiCmd::new(&[0xBA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]).rev(LT_EVT1_1),
    DsiCmd::new(&[0xBA, 0x00, 0x00, 0x10, 0x11, 0x00, 0x00, 0x00, 0x00]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x08]),
    DsiCmd::new(&[0xBB, 0x01, 0x00, 0x00, 0x00]),
    DsiCmd::new(&[0x6F, 0x0C]),
    DsiCmd::new(&[0xBB, 0x00, 0x00, 0x00, 0x00]),
    DsiCmd::new(&[0x6F, 0x10]),
    DsiCmd::new(&[0xBB, 0x00, 0x00, 0x00, 0x00]),
    DsiCmd::new(&[0x6F, 0x14]),
    DsiCmd::new(&[0xBB, 0x00, 0x00, 0x00, 0x00]),
    DsiCmd::new(&[0x6F, 0x18]),
    DsiCmd::new(&[0xBB, 0x01, 0x02, 0x01, 0x00]),
    DsiCmd::new(&[0x6F, 0x1C]),
    DsiCmd::new(&[0xBB, 0x01, 0x00]),
    DsiCmd::new(&[0xBE, 0x5F, 0x4A, 0x49, 0x4F]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x01]),
    DsiCmd::new(&[0xB9, 0x43, 0x43, 0x43, 0x43, 0x43, 0x43, 0x43]).rev(GE_EVT1_1),
    // OSC clock calibration off
    DsiCmd::new(&[0xC3, 0x00]),
    DsiCmd::new(&[0x6F, 0x31]),
    DsiCmd::new(&[0xB9, 0x45, 0x45, 0x45, 0x45, 0x45]).rev(LT_EVT1_1),
    DsiCmd::new(&[0xB9, 0x43, 0x43, 0x43, 0x43, 0x43]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x36]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xB9, 0x28, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x37]).rev(LT_EVT1_1),
    DsiCmd::new(&[0xB9, 0x1E, 0x1E, 0x1E, 0x1E, 0x1E]).rev(LT_EVT1_1),
    DsiCmd::new(&[0x6F, 0x3C]),
    DsiCmd::new(&[0xB9, 0x28, 0x28, 0x28, 0x28, 0x28]).rev(LT_EVT1_1),
    DsiCmd::new(&[0xB9, 0x1E, 0x1E, 0x1E, 0x1E, 0x1E]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x00]),
    DsiCmd::new(&[0xC6, 0x45, 0x45, 0x45]).rev(LT_EVT1_1),
    DsiCmd::new(&[0xC6, 0x47, 0x43, 0x43]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x03]),
    DsiCmd::new(&[0xC6, 0x23, 0x23, 0x23]),
    DsiCmd::new(&[0x6F, 0x06]),
    DsiCmd::new(&[0xC6, 0x1E, 0x1E, 0x1E]),
    DsiCmd::new(&[0x6F, 0x09]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xC6, 0x47, 0x43, 0x43]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x0C]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xC6, 0x23, 0x23, 0x23]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x0F]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xC6, 0x1E, 0x1E, 0x1E]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x36]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xC6, 0x28, 0x28, 0x28, 0x28, 0x28, 0x28]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x03]),
    DsiCmd::new(&[0xC4, 0x44]),
    DsiCmd::new(&[0xF0, 0x55, 0xAA, 0x52, 0x00, 0x00]),
    DsiCmd::new(&[0xFF, 0xAA, 0x55, 0xA5, 0x80]),
    DsiCmd::new(&[0x6F, 0x29]),
    DsiCmd::new(&[0xF8, 0x01, 0x70]),
    DsiCmd::new(&[0x6F, 0x0D]),
    DsiCmd::new(&[0xF8, 0x01, 0x62]),
    DsiCmd::new(PAGE81),
    DsiCmd::new(&[0x6F, 0x02]),
    DsiCmd::new(&[0xF9, 0x04]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xF9, 0x00]).rev(LT_EVT1_1),
    DsiCmd::new(&[0x6F, 0x0F]),
    DsiCmd::new(&[0xF5, 0x20]),
    DsiCmd::new(&[0x6F, 0x0E]).rev(GE_EVT1_1),
    DsiCmd::new(&[0xF5, 0x2B]).rev(GE_EVT1_1),
    DsiCmd::new(&[0x6F, 0x0D]),
    DsiCmd::new(&[0xFB, 0x84]),
    // crosstalk on
    DsiCmd::new(&[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x08]),
    DsiCmd::new(&[0xBF, 0x11]),
    DsiCmd::new(PAGE0),
    DsiCmd::new(&[0xBE, 0x5F, 0x4A, 0x49, 0x4F]),
    DsiCmd::new(&[0x6F, 0xC5]),
    DsiCmd::new(&[0xBA, 0x00]),
    DsiCmd::new(&[0xFF, 0xAA, 0x55, 0xA5, 0x00]),
    DsiCmd::new(&[0xFF, 0x55, 0xAA, 0x52, 0x00, 0x00]),
    DsiCmd::new(&[dcs::SET_TEAR_ON]),
    DsiCmd::new(&[dcs::WRITE_CONTROL_DISPLAY, 0x20]),
    DsiCmd::new(&[dcs::SET_COLUMN_ADDRESS, 0x00, 0x00, 0x08, 0x67]),
    DsiCmd::new(&[dcs::SET_PAGE_ADDRESS, 0x00, 0x00, 0x08, 0x1B]),
    DsiCmd::new(&[dcs::SET_GAMMA_CURVE, 0x00]),
    DsiCmd::new(&[0x81, 0x01, 0x00]),
    DsiCmd::new(&[0x5A, 0x01]),
    DsiCmd::new(&[0x90, 0x03]),
    DsiCmd::new(&[
        0x91, 0x89, 0xA8, 0x00, 0x0C, 0xC2, 0x00, 0x03, 0x1B, 0x01, 0x7D, 0x00, 0x0E, 0x08, 0xBB, 0x04, 0x40, 0x10,
        0xF0,
    ]),
    // early exit off
    DsiCmd::new(&[0x6F, 0x01]),
    DsiCmd::new(&[0x6D, 0x00]),
    DsiCmd::new(&[dcs::EXIT_SLEEP_MODE]).delay(120),
];

static BRIGHTNESS: [BrightnessConfig; 2] = [
    BrightnessConfig {
        revisions: RevisionMask::EVT1_1.union(RevisionMask::LATEST),
        // 140 nits
        default_brightness: 1847,
        capability: BrightnessCapability {
            normal: BrightnessBand {
                nits: Range::new(2, 1000),
                level: Range::new(1, 3490),
                percentage: Range::new(0, 63),
            },
            hbm: BrightnessBand {
                nits: Range::new(1000, 1600),
                level: Range::new(3491, 3845),
                percentage: Range::new(63, 100),
            },
        },
    },
    BrightnessConfig {
        revisions: RevisionMask::EVT1,
        default_brightness: 2084,
        capability: BrightnessCapability {
            normal: BrightnessBand {
                nits: Range::new(2, 1000),
                level: Range::new(1, 3739),
                percentage: Range::new(0, 63),
            },
            hbm: BrightnessBand {
                nits: Range::new(1000, 1600),
                level: Range::new(3740, 4095),
                percentage: Range::new(63, 100),
            },
        },
    },
];

pub(super) static DESC: PanelDesc = PanelDesc {
    name: "ct3b",
    compatible: &["google,gs-ct3b", "google,ct3b"],
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
    lp_cmdset: None,
    idle_supported: true,
    thermal_zone: Some("inner_brightness"),
    reset: ResetTiming {
        high_ms: Some(1),
        low_ms: 1,
        settle_ms: 20,
    },
    dsc: Some(DscConfig {
        slice_count: 2,
        slice_height: 12,
        initial_dec_delay: 795,
        first_line_bpg_offset: 12,
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
            RcRange::signed(3, 10, -10),
            RcRange::signed(5, 10, -10),
            RcRange::signed(5, 11, -12),
            RcRange::signed(5, 11, -12),
            RcRange::signed(9, 12, -12),
            RcRange::signed(12, 13, -12),
        ],
        ..DscConfig::EMPTY
    }),
    clock_override: Some(ClockOverridePolicy {
        on_self_refresh_exit: true,
        on_lp_exit_to_60hz: true,
        restore_needs_active_changed: true,
        tracks_needs_commit: true,
    }),
};

/// How a manual rate is programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManualFreq {
    /// Frame insertion on, with the given insertion rate.
    Insert(u8),
    /// Frame insertion off; the byte selects the native scan rate.
    Native(u8),
}

/// Auto mode target for `idle_vrefresh`. `ns_dvt` selects the NS table of DVT panels.
fn auto_target(idle_vrefresh: u32, ns_dvt: bool, rev: PanelRevision) -> Option<u8> {
    let old = rev < PanelRevision::Evt1_1;
    if ns_dvt {
        return match idle_vrefresh {
            30 => Some(0x05),
            10 => Some(0x06),
            1 => Some(0x07),
            _ => None,
        };
    }
    match idle_vrefresh {
        60 => Some(if old { 0x00 } else { 0x01 }),
        30 => Some(if old { 0x01 } else { 0x02 }),
        10 => Some(if old { 0x02 } else { 0x03 }),
        1 => Some(if old { 0x03 } else { 0x04 }),
        _ => None,
    }
}

fn manual_freq(vrefresh: u32, ns_dvt: bool, rev: PanelRevision) -> Option<ManualFreq> {
    let old = rev < PanelRevision::Evt1_1;
    if ns_dvt {
        return match vrefresh {
            1 => Some(ManualFreq::Insert(0x07)),
            10 => Some(ManualFreq::Insert(0x06)),
            30 => Some(ManualFreq::Insert(0x05)),
            60 => Some(ManualFreq::Native(0x01)),
            _ => None,
        };
    }
    match vrefresh {
        1 => Some(ManualFreq::Insert(if old { 0x03 } else { 0x04 })),
        10 => Some(ManualFreq::Insert(if old { 0x02 } else { 0x03 })),
        30 => Some(ManualFreq::Insert(if old { 0x01 } else { 0x02 })),
        60 => Some(ManualFreq::Insert(if old { 0x00 } else { 0x01 })),
        120 => Some(ManualFreq::Native(0x00)),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub(super) struct Ct3b;

impl Ct3b {
    fn wrctrld(dimming_on: bool) -> u8 {
        if dimming_on {
            WRCTRLD_BCTRL_BIT | WRCTRLD_DIMMING_BIT
        } else {
            WRCTRLD_BCTRL_BIT
        }
    }

    fn dimming_frame_setting(cx: &mut PanelCx<'_>, frames: u8) -> Result<(), PanelError> {
        // at least one frame
        let frames = frames.max(1);
        cx.dcs.add(PAGE0).add(&[0xB2, 0x19]).add(&[0x6F, 0x05]);
        cx.dcs.add_and_flush(&[0xB2, frames, frames])?;
        Ok(())
    }

    fn update_irc(cx: &mut PanelCx<'_>, mode: HbmMode) -> Result<(), PanelError> {
        let (irc, gamma, c0) = if mode.is_irc_off() { (0x01, 0x02, 0x32) } else { (0x00, 0x00, 0x30) };
        cx.dcs
            .add(&[0x5F, irc])
            .add(&[dcs::SET_GAMMA_CURVE, gamma])
            .add(PAGE0)
            .add(&[0x6F, 0x03]);
        cx.dcs.add_and_flush(&[0xC0, c0])?;
        Ok(())
    }

    /// TE programming of production builds.
    fn write_te(cx: &mut PanelCx<'_>, req: &FeatureRequest) {
        let ns = req.has(Features::OP_NS);
        cx.dcs.add(PAGE0);
        if cx.rev() >= PanelRevision::Dvt1 || !ns {
            cx.dcs.add(&[0xBE, 0x47, 0x4A, 0x49, 0x4F]);
            if req.te_freq == 60 && !ns {
                cx.dcs
                    .add(&[0x6F, 0x03])
                    .add(&[dcs::SET_TEAR_ON, 0x01])
                    .add(&[0x6F, 0x1C])
                    .add(&[0xBA, 0x01, 0x01, 0x01, 0x01, 0x77, 0x77, 0x77, 0x77, 0x77, 0x77, 0x77, 0x77]);
                return;
            }
        } else {
            cx.dcs.add(&[0xBE, 0x5F, 0x4A, 0x49, 0x4F]);
        }
        cx.dcs
            .add(&[0x6F, 0x03])
            .add(&[dcs::SET_TEAR_ON, 0x00])
            .add(&[0x6F, 0x1C])
            .add(&[0xBA, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    fn write_frequency(cx: &mut PanelCx<'_>, req: &FeatureRequest) -> Result<(), PanelError> {
        let rev = cx.rev();
        let ns_dvt = req.has(Features::OP_NS) && rev >= PanelRevision::Dvt1;

        if req.has(Features::FRAME_AUTO) {
            let idle = req.idle_vrefresh;
            let val = auto_target(idle, ns_dvt, rev).unwrap_or_else(|| {
                warn!("unsupported target freq {idle}");
                // 1 Hz
                auto_target(1, ns_dvt, rev).unwrap_or(0x04)
            });
            cx.dcs.add(&[0x2F, 0x30]);
            cx.dcs.add_and_flush(&[0x6D, val])?;
            return Ok(());
        }

        let vrefresh = req.vrefresh;
        let freq = manual_freq(vrefresh, ns_dvt, rev).unwrap_or_else(|| {
            warn!("unsupported manual freq {vrefresh}");
            if ns_dvt { ManualFreq::Native(0x01) } else { ManualFreq::Native(0x00) }
        });
        match freq {
            ManualFreq::Insert(val) => {
                cx.dcs.add(&[0x2F, 0x30]);
                cx.dcs.add_and_flush(&[0x6D, val])?;
            }
            ManualFreq::Native(val) => {
                cx.dcs.add(&[0x2F, val]);
                cx.dcs.add_and_flush(&[dcs::SET_GAMMA_CURVE, 0x00])?;
            }
        }
        Ok(())
    }
}

impl PanelVariant for Ct3b {
    fn desc(&self) -> &'static PanelDesc {
        &DESC
    }

    fn decode_revision(&self, id: u32) -> PanelRevision {
        let code = PanelRevision::code_from_build(PanelRevision::build_code(id));
        match PanelRevision::from_code(code) {
            // no proto builds of this panel
            Some(rev) if rev >= PanelRevision::Evt1 => rev,
            _ => {
                warn!("unknown rev from panel ({code:#x}), default to latest");
                PanelRevision::Latest
            }
        }
    }

    fn read_id(&mut self, cx: &mut PanelCx<'_>) -> Result<String, PanelError> {
        read_nt_id(cx)
    }

    fn panel_init(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        if cx.core.config.factory_build {
            cx.core.config.panel_idle_enabled = false;
        }
        if let Some(mode) = cx.core.current_mode {
            refresh::set_panel_features(self, cx, mode, 0, true)?;
        }
        Self::dimming_frame_setting(cx, DIMMING_FRAMES)
    }

    fn enable(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        info!("enable");
        reset(cx);
        cx.send_cmdset(&DESC.init_cmdset)?;
        refresh::update_panel_features(self, cx, true)?;
        keep_rate_above_op_hz(refresh::change_frequency(self, cx, mode))?;
        Self::dimming_frame_setting(cx, DIMMING_FRAMES)?;

        if mode.is_lp_mode {
            self.set_lp_mode(cx, mode)?;
        }

        cx.dcs.write(&[dcs::SET_DISPLAY_ON])?;
        Ok(())
    }

    fn disable(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        info!("disable");
        cx.send_cmdset(&DESC.off_cmdset)?;

        let hw = &mut cx.core.hw;
        hw.features = Features::empty();
        hw.vrefresh = 60;
        hw.te.rate_hz = 60;
        hw.idle_vrefresh = 0;
        Ok(())
    }

    fn set_brightness(&mut self, cx: &mut PanelCx<'_>, level: u16) -> Result<(), PanelError> {
        if cx.core.is_lp() {
            apply_binned_lp(cx, level, false)?;
            return Ok(());
        }
        write_brightness(cx, level)
    }

    fn set_hbm_mode(&mut self, cx: &mut PanelCx<'_>, mode: HbmMode) -> Result<(), PanelError> {
        if cx.core.hbm_mode == mode {
            return Ok(());
        }
        Self::update_irc(cx, mode)?;
        cx.core.hbm_mode = mode;
        info!("hbm_on={} hbm_ircoff={}", mode.is_on(), mode.is_irc_off());
        Ok(())
    }

    fn set_dimming(&mut self, cx: &mut PanelCx<'_>, on: bool) -> Result<(), PanelError> {
        cx.core.dimming_on = on;
        if cx.core.is_lp() {
            warn!("in lp mode, skip to update");
            return Ok(());
        }
        cx.dcs.write(&[dcs::WRITE_CONTROL_DISPLAY, Self::wrctrld(on)])?;
        debug!("dimming_on={on}");
        Ok(())
    }

    fn set_lp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        debug!("set lp mode");
        let newer = cx.rev() >= PanelRevision::Evt1_1;

        // early exit and fixed TE
        if newer {
            cx.dcs.add(&[0x5A, 0x00]).add(&[0x6F, 0x01]).add(&[0x6D, 0x01]);
        }

        cx.dcs.add(&[0x2F, 0x00]);
        if newer {
            cx.dcs
                .add(PAGE81)
                .add(&[0x6F, 0x0E])
                .add(&[0xF5, 0x20])
                .add(&[dcs::ENTER_IDLE_MODE])
                // skip 1 Hz
                .add(&[0x2F, 0x00])
                .add(PAGE0)
                .add(&[0xBE, 0x47, 0x4A, 0x49, 0x4F])
                .add(&[0x6F, 0x18])
                .add(&[0xBB, 0x01, 0x1D]);
            cx.dcs.add_and_flush(&[0x2F, 0x30])?;
        } else {
            cx.dcs.add_and_flush(&[dcs::ENTER_IDLE_MODE])?;
        }

        cx.core.hw.vrefresh = 30;
        cx.core.hw.te.rate_hz = 30;

        info!("enter {}hz LP mode", mode.vrefresh());
        Ok(())
    }

    fn set_nolp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        if !cx.core.power.is_active() {
            return Ok(());
        }
        let newer = cx.rev() >= PanelRevision::Evt1_1;
        let idle_vrefresh = cx.core.auto_mode_vrefresh;

        // early exit off
        if newer {
            cx.dcs.add(&[0x5A, 0x01]).add(&[0x6F, 0x01]).add(&[0x6D, 0x00]);
        }

        cx.dcs.add(&[dcs::EXIT_IDLE_MODE]);
        if newer {
            cx.dcs
                .add(PAGE81)
                .add(&[0x6F, 0x0E])
                .add(&[0xF5, 0x2B])
                .add(PAGE0)
                .add(&[0xBE, 0x5F, 0x4A, 0x49, 0x4F]);
        }
        cx.dcs
            .add_and_flush(&[dcs::WRITE_CONTROL_DISPLAY, Self::wrctrld(cx.core.dimming_on)])?;

        refresh::set_panel_features(self, cx, mode, idle_vrefresh, true)?;
        refresh::change_frequency(self, cx, mode)?;

        info!("exit LP mode");
        Ok(())
    }

    fn mode_set(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        refresh::change_frequency(self, cx, mode)
    }

    fn set_op_hz(&mut self, cx: &mut PanelCx<'_>, hz: u32) -> Result<(), PanelError> {
        refresh::set_op_hz(self, cx, hz)
    }

    fn commit_done(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        if cx.core.is_lp() {
            return Ok(());
        }
        refresh::update_idle_state(self, cx)
    }

    fn set_self_refresh(&mut self, cx: &mut PanelCx<'_>, enable: bool) -> Result<bool, PanelError> {
        refresh::set_self_refresh(self, cx, enable)
    }

    fn update_te2(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.core.te2_option = refresh::te2_option(cx.core);
        debug!(
            "TE2 updated: op={}, is_changeable={}, idle={}",
            cx.core.sw.features.contains(Features::OP_NS),
            cx.core.te2_option == TeOption::Changeable,
            cx.core.panel_idle_vrefresh
        );
        Ok(())
    }

    fn pin_features(&self, core: &PanelCore, req: &mut FeatureRequest) {
        if core.config.factory_build || !req.is_vrr() {
            return;
        }
        req.features.set(Features::OP_NS, req.mode.is_ns());
        if core.rev() >= PanelRevision::Dvt1 || !req.has(Features::OP_NS) {
            req.vrefresh = 1;
            req.idle_vrefresh = 0;
            req.features.insert(Features::EARLY_EXIT);
            req.features.remove(Features::FRAME_AUTO);
        } else {
            req.features.remove(Features::EARLY_EXIT);
        }
    }

    fn write_features(&mut self, cx: &mut PanelCx<'_>, req: &FeatureRequest) -> Result<Option<TeOption>, PanelError> {
        if !cx.core.config.factory_build {
            Self::write_te(cx, req);
        }

        cx.dcs.add(&[0x6F, 0x01]);
        if req.has(Features::EARLY_EXIT) {
            cx.dcs.add(&[0x6D, 0x01]).add(&[0x5A, 0x00]);
        } else {
            cx.dcs.add(&[0x6D, 0x00]).add(&[0x5A, 0x01]);
        }

        Self::write_frequency(cx, req)?;
        Ok(None)
    }

    fn send_early_exit(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.dcs.add_and_flush(&[0x5A, 0x01])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_proto_revisions() {
        // build code 0x00 decodes to PROTO1 on other panels
        assert_eq!(Ct3b.decode_revision(0x0000_0000), PanelRevision::Latest);
        assert_eq!(Ct3b.decode_revision(0x0000_2400), PanelRevision::Evt1_1);
    }

    #[test]
    fn test_rate_tables_cover_supported_rates() {
        for rev in PanelRevision::ALL {
            for idle in [1, 10, 30] {
                assert!(auto_target(idle, true, rev).is_some());
                assert!(auto_target(idle, false, rev).is_some());
            }
            for vrefresh in [1, 10, 30, 60] {
                assert!(manual_freq(vrefresh, true, rev).is_some());
                assert!(manual_freq(vrefresh, false, rev).is_some());
            }
            assert_eq!(manual_freq(120, false, rev), Some(ManualFreq::Native(0x00)));
        }
    }

    #[test]
    fn test_every_mode_has_rate_entries() {
        for mode in DESC.modes {
            let vrefresh = mode.vrefresh();
            for rev in PanelRevision::ALL {
                let ns_dvt = [false, true].into_iter().filter(|ns| !ns || (vrefresh <= 60 && rev >= PanelRevision::Dvt1));
                for ns_dvt in ns_dvt {
                    assert!(manual_freq(vrefresh, ns_dvt, rev).is_some(), "{} on {rev}", mode.name);
                    for idle in [1, 10, 30].into_iter().filter(|idle| *idle < vrefresh) {
                        assert!(auto_target(idle, ns_dvt, rev).is_some(), "{} idle {idle} on {rev}", mode.name);
                    }
                }
            }
        }
    }

    #[test]
    fn test_rates_shift_at_evt1_1() {
        assert_eq!(auto_target(10, false, PanelRevision::Evt1), Some(0x02));
        assert_eq!(auto_target(10, false, PanelRevision::Evt1_1), Some(0x03));
        assert_eq!(manual_freq(60, true, PanelRevision::Dvt1), Some(ManualFreq::Native(0x01)));
        assert_eq!(manual_freq(60, false, PanelRevision::Dvt1), Some(ManualFreq::Insert(0x01)));
    }

    #[test]
    fn test_init_gated_by_revision() {
        let evt1 = DESC.init_cmdset.for_revision(PanelRevision::Evt1).count();
        let evt1_1 = DESC.init_cmdset.for_revision(PanelRevision::Evt1_1).count();
        assert!(evt1_1 > evt1);
        assert!(DESC.init_cmdset.cmds.last().is_some_and(|cmd| cmd.delay_ms == 120));
    }
}
