//! ct3a: 2152x2076 inner display with VRR modes and a variable operating rate.

use super::{
    Luminance, PanelDesc, PanelVariant, ResetTiming, apply_binned_lp, keep_rate_above_op_hz, read_slsi_id, reset,
    write_brightness,
};
use crate::atomic::ClockOverridePolicy;
use crate::brightness::{BinnedLp, BrightnessBand, BrightnessCapability, BrightnessConfig, Range};
use crate::cmd::{CmdSet, DsiCmd};
use crate::controller::{PanelCore, PanelCx};
use crate::dsi::{WRCTRLD_BCTRL_BIT, WRCTRLD_DIMMING_BIT, dcs};
use crate::error::PanelError;
use crate::mode::{
    Availability, DSC_RC_RANGES_8BPC, DisplayTiming, DscConfig, IdleMode, ModeFlags, ModeType, PanelMode,
};
use crate::refresh::{self, FeatureRequest};
use crate::revision::{PanelRevision, RevisionMask};
use crate::state::{Features, HbmMode, TeOption};

use log::{debug, error, info, warn};

const UNLOCK: &[u8] = &[0xF0, 0x5A, 0x5A];
const LOCK: &[u8] = &[0xF0, 0xA5, 0xA5];
const LTPS_UPDATE: &[u8] = &[0xF7, 0x0F];
const PIXEL_OFF: &[u8] = &[0x22];

/// One 30 Hz frame, in microseconds.
const DELAY_30HZ_ONE_FRAME_US: u32 = 34_000;

/// VLIN trim used when the panel value cannot be read (7.7 V).
const VLIN_DEFAULT: u8 = 0x06;

const TE_USEC_120HZ_HS: u32 = 320;
const TE_USEC_VRR_HS: u32 = 320;
const TE_USEC_VRR_NS: u32 = 640;

const WIDTH_MM: u16 = 147;
const HEIGHT_MM: u16 = 141;

const fn timing(fps: u32) -> DisplayTiming {
    DisplayTiming::new(fps, 2152, 80, 30, 38, 2076, 6, 4, 14)
}

static MODES: [PanelMode; 8] = [
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
    PanelMode::new("2152x2076@120:240", timing(120), WIDTH_MM, HEIGHT_MM)
        .flags(ModeFlags::TE_FREQ_X2)
        .mode_type(ModeType::VRR.union(ModeType::PREFERRED))
        .te_usec(TE_USEC_VRR_HS)
        .availability(Availability::ProductionOnly),
    PanelMode::new("2152x2076@120:120", timing(120), WIDTH_MM, HEIGHT_MM)
        .flags(ModeFlags::TE_FREQ_X1)
        .mode_type(ModeType::VRR)
        .te_usec(TE_USEC_VRR_HS)
        .availability(Availability::ProductionOnly),
    PanelMode::new("2152x2076@60:240", timing(60), WIDTH_MM, HEIGHT_MM)
        .flags(ModeFlags::TE_FREQ_X4.union(ModeFlags::NS))
        .mode_type(ModeType::VRR)
        .te_usec(TE_USEC_VRR_NS)
        .availability(Availability::ProductionOnly),
];

static LP_MODES: [PanelMode; 1] = [PanelMode::new(
    "2152x2076@30:30",
    DisplayTiming::new(30, 2152, 80, 32, 36, 2076, 6, 4, 14),
    WIDTH_MM,
    HEIGHT_MM,
)
.lp()];

static BINNED_LP: [BinnedLp; 2] = [
    // 40 nits
    BinnedLp::new("low", 689, &[DsiCmd::new(&[0x51, 0x03, 0x8A])]),
    BinnedLp::new("high", 2988, &[DsiCmd::new(&[0x51, 0x07, 0xFF])]),
];

static OFF_CMDS: [DsiCmd; 2] = [
    DsiCmd::new(&[dcs::SET_DISPLAY_OFF]),
    DsiCmd::new(&[dcs::ENTER_SLEEP_MODE]).delay(120),
];

const GE_EVT1: RevisionMask = RevisionMask::ge(PanelRevision::Evt1);

static INIT_CMDS: [DsiCmd; 21] = [
    DsiCmd::new(&[dcs::SET_TEAR_ON]),
    // CASET 2151, PASET 2075
    DsiCmd::new(&[dcs::SET_COLUMN_ADDRESS, 0x00, 0x00, 0x08, 0x67]),
    DsiCmd::new(&[dcs::SET_PAGE_ADDRESS, 0x00, 0x00, 0x08, 0x1B]),
    DsiCmd::new(UNLOCK),
    // manual TE, fixed TE2
    DsiCmd::new(&[0xB9, 0x00, 0x51, 0x00, 0x00]).rev(RevisionMask::PROTO1),
    DsiCmd::new(&[0xB9, 0x04, 0x51, 0x00, 0x00]).rev(RevisionMask::PROTO1_1.union(RevisionMask::PROTO1_2)),
    DsiCmd::new(&[0xB9, 0x04]).rev(GE_EVT1),
    DsiCmd::new(&[0xB0, 0x00, 0x08, 0xB9]),
    DsiCmd::new(&[0xB9, 0x08, 0x1C, 0x00, 0x00, 0x08, 0x1C, 0x00, 0x00]),
    DsiCmd::new(&[0xB0, 0x00, 0x01, 0xB9]).rev(GE_EVT1),
    DsiCmd::new(&[0xB9, 0x51]).rev(GE_EVT1),
    DsiCmd::new(&[0xB0, 0x00, 0x22, 0xB9]),
    DsiCmd::new(&[0xB9, 0x00, 0x2F, 0x00, 0x82, 0x00, 0x2F, 0x00, 0x82]),
    // early exit off
    DsiCmd::new(&[0xB0, 0x00, 0x01, 0xBD]).rev(RevisionMask::lt(PanelRevision::Proto1_2)),
    DsiCmd::new(&[0xBD, 0x81]).rev(RevisionMask::lt(PanelRevision::Proto1_2)),
    DsiCmd::new(LTPS_UPDATE),
    // gamma improvement
    DsiCmd::new(&[0xB0, 0x00, 0x24, 0xF8]),
    DsiCmd::new(&[0xF8, 0x05]),
    // HLPM transition preset
    DsiCmd::new(&[0xB0, 0x00, 0x03, 0xBB]).rev(GE_EVT1),
    DsiCmd::new(&[0xBB, 0x45, 0x0E]).rev(GE_EVT1),
    DsiCmd::new(LOCK),
];

static BRIGHTNESS: [BrightnessConfig; 2] = [
    BrightnessConfig {
        revisions: RevisionMask::EVT1_1.union(RevisionMask::LATEST),
        // 140 nits
        default_brightness: 1223,
        capability: BrightnessCapability {
            normal: BrightnessBand {
                nits: Range::new(2, 1000),
                level: Range::new(157, 2988),
                percentage: Range::new(0, 63),
            },
            hbm: BrightnessBand {
                nits: Range::new(1000, 1600),
                level: Range::new(2989, 3701),
                percentage: Range::new(63, 100),
            },
        },
    },
    BrightnessConfig {
        revisions: RevisionMask::PROTO1
            .union(RevisionMask::PROTO1_1)
            .union(RevisionMask::PROTO1_2)
            .union(RevisionMask::EVT1),
        default_brightness: 1353,
        capability: BrightnessCapability {
            normal: BrightnessBand {
                nits: Range::new(2, 1000),
                level: Range::new(174, 3307),
                percentage: Range::new(0, 63),
            },
            hbm: BrightnessBand {
                nits: Range::new(1000, 1600),
                level: Range::new(3308, 4095),
                percentage: Range::new(63, 100),
            },
        },
    },
];

pub(super) static DESC: PanelDesc = PanelDesc {
    name: "ct3a",
    compatible: &["google,gs-ct3a", "google,ct3a"],
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
        high_ms: None,
        low_ms: 1,
        settle_ms: 10,
    },
    dsc: Some(DscConfig {
        slice_count: 2,
        slice_width: 1076,
        slice_height: 173,
        pic_width: 2152,
        pic_height: 2076,
        bits_per_component: 8,
        bits_per_pixel: 128,
        initial_xmit_delay: 512,
        initial_dec_delay: 930,
        first_line_bpg_offset: 15,
        nfl_bpg_offset: 179,
        slice_bpg_offset: 75,
        scale_increment_interval: 4976,
        scale_decrement_interval: 14,
        final_offset: 4320,
        rc_range_params: DSC_RC_RANGES_8BPC,
        ..DscConfig::EMPTY
    }),
    clock_override: Some(ClockOverridePolicy {
        on_self_refresh_exit: true,
        on_lp_exit_to_60hz: false,
        restore_needs_active_changed: true,
        tracks_needs_commit: false,
    }),
};

/// Revision code layout of the ct3a build code.
fn decode_revision_code(code: u8) -> Option<PanelRevision> {
    Some(match code {
        0x00 => PanelRevision::Proto1,
        0x01 => PanelRevision::Proto1_1,
        0x02 => PanelRevision::Proto1_2,
        0x0C => PanelRevision::Evt1,
        0x0E => PanelRevision::Evt1_1,
        0x0F => PanelRevision::Evt1_2,
        0x11 => PanelRevision::Dvt1,
        0x12 => PanelRevision::Dvt1_1,
        0x14 => PanelRevision::Pvt,
        _ => return None,
    })
}

// Register values of the frame insertion block. `None` marks a rate the
// panel has no setting for.

/// Auto mode target rate at NS.
fn auto_target_ns(idle_vrefresh: u32) -> Option<u8> {
    match idle_vrefresh {
        30 => Some(0x04),
        10 => Some(0x14),
        1 => Some(0xEC),
        _ => None,
    }
}

/// Auto mode target rate at HS.
fn auto_target_hs(idle_vrefresh: u32) -> Option<u8> {
    match idle_vrefresh {
        60 => Some(0x02),
        30 => Some(0x06),
        10 => Some(0x16),
        1 => Some(0xEC),
        _ => None,
    }
}

/// Manual rate at NS.
fn manual_freq_ns(vrefresh: u32, rev: PanelRevision) -> Option<u8> {
    match vrefresh {
        1 if rev >= PanelRevision::Proto1_2 => Some(0x1E),
        1 => Some(0x1D),
        10 => Some(0x1C),
        30 => Some(0x19),
        60 => Some(0x18),
        _ => None,
    }
}

/// Manual rate at HS.
fn manual_freq_hs(vrefresh: u32, rev: PanelRevision) -> Option<u8> {
    let pre_evt = rev < PanelRevision::Evt1;
    match vrefresh {
        1 => Some(0x06),
        10 => Some(0x05),
        30 => Some(if pre_evt { 0x02 } else { 0x03 }),
        60 => Some(if pre_evt { 0x01 } else { 0x02 }),
        120 => Some(0x00),
        _ => None,
    }
}

fn changeable_te(rev: PanelRevision) -> &'static [u8] {
    match rev {
        PanelRevision::Proto1 => &[0xB9, 0x00, 0x51, 0x00, 0x00],
        PanelRevision::Proto1_1 | PanelRevision::Proto1_2 => &[0xB9, 0x04, 0x51, 0x00, 0x00],
        _ => &[0xB9, 0x04],
    }
}

fn fixed_te(rev: PanelRevision) -> &'static [u8] {
    if rev < PanelRevision::Evt1 {
        &[0xB9, 0x51, 0x51, 0x00, 0x00]
    } else {
        &[0xB9, 0x51]
    }
}

/// ct3a runtime state.
#[derive(Debug)]
pub(super) struct Ct3a {
    /// VLIN trim read from the panel, restored after power-on.
    vlin: u8,
}

impl Default for Ct3a {
    fn default() -> Self {
        Self { vlin: VLIN_DEFAULT }
    }
}

impl Ct3a {
    fn update_wrctrld(cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        let mut val = WRCTRLD_BCTRL_BIT;
        if cx.core.dimming_on {
            val |= WRCTRLD_DIMMING_BIT;
        }
        debug!(
            "wrctrld:{val:#x}, hbm={}, dimming={}",
            cx.core.hbm_mode.is_on(),
            cx.core.dimming_on
        );
        cx.dcs.add_and_flush(&[dcs::WRITE_CONTROL_DISPLAY, val])?;
        Ok(())
    }

    /// VLIN/VGH/VREG trims: the power-on values when `enable`, the
    /// sleep-out values otherwise.
    fn set_default_voltage(&self, cx: &mut PanelCx<'_>, enable: bool) -> Result<(), PanelError> {
        let rev = cx.rev();
        if rev < PanelRevision::Evt1 {
            return Ok(());
        }
        debug!("set default voltage, enable = {enable}");

        let vlin = if !enable {
            0x02
        } else if rev < PanelRevision::Evt1_1 {
            VLIN_DEFAULT
        } else {
            self.vlin
        };
        let vgh: &[u8] = if enable {
            &[0xF4, 0x15, 0x15, 0x15, 0x15]
        } else {
            &[0xF4, 0x18, 0x18, 0x18, 0x18]
        };

        cx.dcs
            .add(UNLOCK)
            .add(&[0xB0, 0x00, 0x03, 0x48])
            .add(&[0x48, 0x08])
            .add(&[0x48, 0xF1])
            .add(&[0xB0, 0x00, 0x01, 0x46])
            .add(&[0x46, 0x23, vlin])
            .add(&[0x46, 0x00])
            .add(&[0xB0, 0x00, 0x0F, 0xF4])
            .add(vgh)
            .add(&[0x48, 0x80])
            .add(&[0xB0, 0x00, 0x32, 0xF4])
            .add(&[0xF4, 0x18]);
        cx.dcs.add_and_flush(LOCK)?;
        Ok(())
    }

    fn read_default_voltage(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.dcs.add(UNLOCK).add(&[0xB0, 0x00, 0x46, 0x48]);
        let mut buf = [0u8; 1];
        match cx.dcs.read(0x48, &mut buf) {
            Ok(1) => {
                self.vlin = buf[0];
                info!("vlin: {:#x}", self.vlin);
            }
            _ => {
                self.vlin = VLIN_DEFAULT;
                error!("unable to read vlin");
            }
        }
        cx.dcs.add_and_flush(LOCK)?;
        Ok(())
    }
}

impl PanelVariant for Ct3a {
    fn desc(&self) -> &'static PanelDesc {
        &DESC
    }

    fn decode_revision(&self, id: u32) -> PanelRevision {
        let code = PanelRevision::code_from_build(PanelRevision::build_code(id));
        decode_revision_code(code).unwrap_or_else(|| {
            warn!("unknown rev from panel ({code:#x}), default to latest");
            PanelRevision::Latest
        })
    }

    fn read_id(&mut self, cx: &mut PanelCx<'_>) -> Result<String, PanelError> {
        let id = read_slsi_id(cx)?;
        if cx.rev() >= PanelRevision::Evt1_1 {
            self.read_default_voltage(cx)?;
        }
        Ok(id)
    }

    fn panel_init(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        if cx.core.config.factory_build {
            cx.core.config.panel_idle_enabled = false;
        }
        // drop whatever the bootloader configured
        match cx.core.current_mode {
            Some(mode) => refresh::set_panel_features(self, cx, mode, 0, true),
            None => Ok(()),
        }
    }

    fn enable(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        info!("enable +");
        reset(cx);

        if let Some(dsc) = &DESC.dsc {
            cx.dcs.write_pps(dsc)?;
        }
        cx.dcs.write(&[0x9D, 0x01])?;

        if cx.rev() < PanelRevision::Evt1 {
            cx.dcs.write(&[dcs::EXIT_SLEEP_MODE])?;
            cx.delay_ms(120);
        } else {
            cx.dcs.write(&[dcs::EXIT_SLEEP_MODE])?;
            cx.delay_ms(10);
            self.set_default_voltage(cx, false)?;
            cx.sleep_us(110_000, 110_010);
        }

        cx.send_cmdset(&DESC.init_cmdset)?;
        refresh::update_panel_features(self, cx, true)?;
        Self::update_wrctrld(cx)?;
        keep_rate_above_op_hz(refresh::change_frequency(self, cx, mode))?;

        if mode.is_lp_mode {
            self.set_lp_mode(cx, mode)?;
        }

        cx.dcs.write(&[dcs::SET_DISPLAY_ON])?;
        self.set_default_voltage(cx, true)?;
        info!("enable -");
        Ok(())
    }

    fn disable(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        info!("disable");
        self.set_default_voltage(cx, false)?;
        cx.send_cmdset(&DESC.off_cmdset)?;

        // register state is lost once the panel is off
        let core = &mut *cx.core;
        core.hw.features = Features::empty();
        core.hw.vrefresh = 60;
        core.hw.idle_vrefresh = 0;
        core.sw.te.rate_hz = 60;
        core.hw.te.rate_hz = 60;
        Ok(())
    }

    fn set_brightness(&mut self, cx: &mut PanelCx<'_>, level: u16) -> Result<(), PanelError> {
        if cx.core.is_lp() {
            // pixel-off in AOD risks a black screen
            if cx.core.is_pixel_off {
                cx.dcs.add_and_flush(&[dcs::ENTER_NORMAL_MODE])?;
                cx.core.is_pixel_off = false;
            }
            apply_binned_lp(cx, level, false)?;
            return Ok(());
        }

        if level == 0 {
            if !cx.core.is_pixel_off {
                cx.dcs.add_and_flush(PIXEL_OFF)?;
                cx.core.is_pixel_off = true;
                debug!("pixel off instead of dbv 0");
            }
            return Ok(());
        }
        if cx.core.is_pixel_off {
            cx.dcs.add_and_flush(&[dcs::ENTER_NORMAL_MODE])?;
            cx.core.is_pixel_off = false;
        }
        write_brightness(cx, level)
    }

    fn set_hbm_mode(&mut self, cx: &mut PanelCx<'_>, mode: HbmMode) -> Result<(), PanelError> {
        let current = cx.core.hbm_mode;
        if mode == current {
            return Ok(());
        }
        let irc_update = current.is_irc_off() != mode.is_irc_off();
        cx.core.hbm_mode = mode;

        if cx.rev() >= PanelRevision::Proto1_2 && irc_update {
            let irc = if mode.is_irc_off() { 0x0B } else { 0x2B };
            cx.dcs
                .add(UNLOCK)
                .add(&[0xB0, 0x00, 0xAF, 0x93])
                .add(&[0x93, irc]);
            cx.dcs.add_and_flush(LOCK)?;
        }

        info!("hbm_on={} hbm_ircoff={}", mode.is_on(), mode.is_irc_off());
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

    fn set_lp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        debug!("set lp mode");
        let rev = cx.rev();
        cx.dcs.add(UNLOCK);

        if rev == PanelRevision::Proto1_1 {
            cx.dcs
                .add(&[0xB0, 0x02, 0xAE, 0xCB])
                .add(&[0xCB, 0x11, 0x70])
                .add(&[0xB0, 0x00, 0x05, 0xBD])
                .add(&[0xBD, 0x03])
                .add(&[0xB0, 0x00, 0x52, 0x64])
                .add(&[0x64, 0x01, 0x03, 0x0A, 0x03])
                .add(&[0xB0, 0x00, 0x5E, 0xBD])
                .add(&[0xBD, 0x00, 0x00, 0x00, 0x08, 0x00, 0x74]);
        }

        cx.dcs
            .add(&[dcs::WRITE_CONTROL_DISPLAY, 0x24])
            .add(&[0x60, 0x00, 0x00])
            // fixed TE
            .add(fixed_te(rev))
            // early exit on
            .add(&[0xB0, 0x00, 0x01, 0xBD])
            .add(&[0xBD, 0x01])
            // auto frame insertion at 1 Hz
            .add(&[0xBD, 0xE5])
            .add(&[0xB0, 0x00, 0x19, 0xBD])
            .add(&[0xBD, 0x00, 0x74])
            .add(&[0xB0, 0x00, 0xB8, 0xBD])
            .add(&[0xBD, 0x00, 0x00, 0x00, 0x08, 0x00, 0x74])
            .add(&[0xB0, 0x00, 0xC8, 0xBD])
            .add(&[0xBD, 0x02, 0x01])
            .add(&[0xB0, 0x00, 0x85, 0xBD])
            .add(&[0xBD, 0x01])
            .add(LTPS_UPDATE);
        cx.dcs.add_and_flush(LOCK)?;

        cx.core.hw.vrefresh = 30;
        cx.core.sw.te.rate_hz = 30;
        cx.core.hw.te.rate_hz = 30;

        info!("enter {}hz LP mode", mode.vrefresh());
        Ok(())
    }

    fn set_nolp_mode(&mut self, cx: &mut PanelCx<'_>, mode: &'static PanelMode) -> Result<(), PanelError> {
        if !cx.core.power.is_active() {
            return Ok(());
        }
        let rev = cx.rev();
        let idle_vrefresh = cx.core.auto_mode_vrefresh;

        cx.dcs
            .add(UNLOCK)
            // manual mode
            .add(&[0xBD, 0xE1])
            // early exit off
            .add(&[0xB0, 0x00, 0x01, 0xBD])
            .add(&[0xBD, 0x81])
            .add(changeable_te(rev));
        // AOD off
        if rev == PanelRevision::Proto1_1 {
            cx.dcs.add(&[0xB0, 0x00, 0x52, 0x64]).add(&[0x64, 0x00]);
        }
        Self::update_wrctrld(cx)?;
        cx.dcs.add(LTPS_UPDATE);
        cx.dcs.add_and_flush(LOCK)?;

        cx.sleep_us(DELAY_30HZ_ONE_FRAME_US, DELAY_30HZ_ONE_FRAME_US + 10);
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
        // production VRR modes run manual 1 Hz with early exit
        if core.config.factory_build || !req.is_vrr() {
            return;
        }
        req.vrefresh = 1;
        req.idle_vrefresh = 0;
        req.features.insert(Features::EARLY_EXIT);
        req.features.remove(Features::FRAME_AUTO);
        req.features.set(Features::OP_NS, req.mode.is_ns());
    }

    fn write_features(&mut self, cx: &mut PanelCx<'_>, req: &FeatureRequest) -> Result<Option<TeOption>, PanelError> {
        let rev = cx.rev();
        let ns = req.has(Features::OP_NS);
        let vrr = req.is_vrr();
        let te_changed = req.changed(Features::EARLY_EXIT | Features::OP_NS) || cx.core.hw.te.rate_hz != req.te_freq;
        let force_changeable_te = cx.core.config.force_changeable_te;

        cx.dcs.add(UNLOCK);

        let mut te_option = None;
        if te_changed {
            if req.has(Features::EARLY_EXIT) && !force_changeable_te {
                if vrr && req.te_freq == 240 {
                    // 240 Hz multi TE
                    cx.dcs.add(&[0xB0, 0x00, 0x08, 0xB9]);
                    if ns {
                        cx.dcs.add(&[0xB9, 0x08, 0x1C, 0x00, 0x00, 0x01, 0xC6, 0x00, 0x01]);
                    } else {
                        cx.dcs.add(&[0xB9, 0x08, 0x1C, 0x00, 0x00, 0x03, 0xE0, 0x00, 0x01]);
                    }
                    cx.dcs.add(&[0xB9, 0x61]);
                } else {
                    let te_sel = if ns || req.te_freq != 60 { 0x00 } else { 0x01 };
                    cx.dcs
                        .add(fixed_te(rev))
                        .add(&[0xB0, 0x00, 0x02, 0xB9])
                        .add(&[0xB9, te_sel]);
                }
                te_option = Some(TeOption::Fixed);
            } else {
                cx.dcs.add(changeable_te(rev));
                te_option = Some(TeOption::Changeable);
            }
        }

        // early exit
        cx.dcs.add(&[0xB0, 0x00, 0x01, 0xBD]);
        if vrr {
            cx.dcs.add(&[0xBD, 0x41]);
        } else {
            let ee = if req.has(Features::EARLY_EXIT) { 0x01 } else { 0x81 };
            cx.dcs.add(&[0xBD, ee]);
        }

        // frame insertion, rate and idle rate
        if req.has(Features::FRAME_AUTO) {
            let idle = req.idle_vrefresh;
            cx.dcs
                .add(&[0x60, if ns { 0x18 } else { 0x00 }])
                // frame insertion on
                .add(&[0xBD, 0xE3])
                .add(&[0xB0, 0x00, 0x13, 0xBD]);
            let target = if ns { auto_target_ns(idle) } else { auto_target_hs(idle) };
            let target = target.unwrap_or_else(|| {
                warn!("unsupported target freq {idle} ({})", if ns { "ns" } else { "hs" });
                0xEC
            });
            cx.dcs.add(&[0xBD, 0x00, target]);

            // step setting
            cx.dcs.add(&[0xB0, 0x00, 0x9E, 0xBD]);
            if ns {
                cx.dcs.add(&[0xBD, 0x00, 0x00, 0x00, 0x04, 0x00, 0x14, 0x00, 0x00]);
            } else {
                cx.dcs.add(&[0xBD, 0x00, 0x00, 0x00, 0x02, 0x00, 0x06, 0x00, 0x16]);
            }
            cx.dcs.add(&[0xB0, 0x00, 0xAE, 0xBD]);
            if ns {
                cx.dcs.add(&[0xBD, 0x00, 0x02, 0x00, 0x00]);
            } else {
                cx.dcs.add(&[0xBD, 0x00, 0x00, 0x02, 0x00]);
            }

            if rev >= PanelRevision::Proto1_2 {
                let offset = if ns { 0x85 } else { 0x83 };
                if rev == PanelRevision::Proto1_2 {
                    cx.dcs.add(&[0xB0, 0x00, offset]);
                } else {
                    cx.dcs.add(&[0xB0, 0x00, offset, 0xBD]);
                }
                cx.dcs.add(&[0xBD, 0x00]);
            }
        } else {
            // manual
            let vrefresh = req.vrefresh;
            if !vrr {
                cx.dcs.add(&[0xBD, 0xE1]);
            }
            let val = if ns {
                if vrr {
                    cx.dcs.add(&[0xB0, 0x00, 0x83, 0xBD]).add(&[0xBD, 0x00]).add(&[0xB9, 0x61]);
                }
                cx.dcs.add(&[0xF2, 0x01]);
                manual_freq_ns(vrefresh, rev).unwrap_or_else(|| {
                    warn!("unsupported manual freq {vrefresh} (ns)");
                    0x18
                })
            } else {
                cx.dcs.add(&[0xF2, 0x01]);
                manual_freq_hs(vrefresh, rev).unwrap_or_else(|| {
                    warn!("unsupported manual freq {vrefresh} (hs)");
                    0x00
                })
            };
            // VRR transfers the rate in its own batch
            if vrr {
                cx.dcs.add_and_flush(&[0x60, val])?;
            } else {
                cx.dcs.add(&[0x60, val]);
            }
        }

        if vrr {
            cx.dcs.add_and_flush(LTPS_UPDATE)?;
        } else {
            cx.dcs.add(LTPS_UPDATE);
        }
        cx.dcs.add_and_flush(LOCK)?;
        Ok(te_option)
    }

    fn send_early_exit(&mut self, cx: &mut PanelCx<'_>) -> Result<(), PanelError> {
        cx.dcs.add(UNLOCK).add(LTPS_UPDATE);
        cx.dcs.add_and_flush(LOCK)?;
        Ok(())
    }
}
