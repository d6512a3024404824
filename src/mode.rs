//! Display modes exposed by a panel.
//!
//! A mode is a DRM-style timing descriptor plus the panel metadata the
//! refresh state machine needs: whether it is the AOD mode, how it idles,
//! and whether it is a variable-refresh (VRR) mode with a TE multiplier.

use bitflags::bitflags;

bitflags! {
    /// Timing and TE flags of a mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u32 {
        /// Panel runs at normal speed (60 Hz operating rate).
        const NS = 1 << 0;
        /// TE at the refresh rate.
        const TE_FREQ_X1 = 1 << 1;
        /// TE at twice the refresh rate.
        const TE_FREQ_X2 = 1 << 2;
        /// TE at four times the refresh rate.
        const TE_FREQ_X4 = 1 << 3;
        /// Bandwidth is budgeted against the operating rate.
        const BTS_OP_RATE = 1 << 4;
    }
}

bitflags! {
    /// Kind of mode as reported to the display core.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeType: u32 {
        /// Preferred mode.
        const PREFERRED = 1 << 3;
        /// Defined by the driver.
        const DRIVER = 1 << 6;
        /// Variable refresh rate mode.
        const VRR = 1 << 7;
    }
}

/// When a mode is allowed to drop to a lower idle refresh rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IdleMode {
    /// The mode never idles.
    #[default]
    Unsupported,
    /// Idle after a period without commits.
    OnInactivity,
    /// Idle when the compositor enters self refresh.
    OnSelfRefresh,
}

/// Which builds expose a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Every build.
    Always,
    /// Factory calibration builds only.
    FactoryOnly,
    /// Production builds only.
    ProductionOnly,
}

impl Availability {
    /// Whether the mode is exposed on a factory (`true`) or production build.
    pub const fn allows(self, factory_build: bool) -> bool {
        match self {
            Availability::Always => true,
            Availability::FactoryOnly => factory_build,
            Availability::ProductionOnly => !factory_build,
        }
    }
}

/// Horizontal and vertical timing of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTiming {
    /// Pixel clock in kHz.
    pub clock: u32,
    /// Active width.
    pub hdisplay: u16,
    /// Start of horizontal sync.
    pub hsync_start: u16,
    /// End of horizontal sync.
    pub hsync_end: u16,
    /// Total line length.
    pub htotal: u16,
    /// Active height.
    pub vdisplay: u16,
    /// Start of vertical sync.
    pub vsync_start: u16,
    /// End of vertical sync.
    pub vsync_end: u16,
    /// Total frame height.
    pub vtotal: u16,
}

impl DisplayTiming {
    /// Build a timing from front porch / sync / back porch widths.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        fps: u32,
        hdisplay: u16,
        hfp: u16,
        hsa: u16,
        hbp: u16,
        vdisplay: u16,
        vfp: u16,
        vsa: u16,
        vbp: u16,
    ) -> Self {
        let hsync_start = hdisplay + hfp;
        let hsync_end = hsync_start + hsa;
        let htotal = hsync_end + hbp;
        let vsync_start = vdisplay + vfp;
        let vsync_end = vsync_start + vsa;
        let vtotal = vsync_end + vbp;
        Self {
            clock: Self::clock_for(htotal, vtotal, fps),
            hdisplay,
            hsync_start,
            hsync_end,
            htotal,
            vdisplay,
            vsync_start,
            vsync_end,
            vtotal,
        }
    }

    /// Pixel clock in kHz for `fps` frames per second.
    pub const fn clock_for(htotal: u16, vtotal: u16, fps: u32) -> u32 {
        (htotal as u32) * (vtotal as u32) * fps / 1000
    }

    /// Refresh rate in Hz, rounded to the closest integer.
    pub const fn vrefresh(&self) -> u32 {
        let pixels = (self.htotal as u64) * (self.vtotal as u64);
        if pixels == 0 {
            return 0;
        }
        let num = self.clock as u64 * 1000;
        ((num + pixels / 2) / pixels) as u32
    }
}

/// One rate-control range of a DSC configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RcRange {
    /// Minimum quantization parameter.
    pub min_qp: u8,
    /// Maximum quantization parameter.
    pub max_qp: u8,
    /// Bits-per-group offset, 6-bit two's complement.
    pub bpg_offset: u8,
}

impl RcRange {
    /// A range entry.
    pub const fn new(min_qp: u8, max_qp: u8, bpg_offset: u8) -> Self {
        Self {
            min_qp,
            max_qp,
            bpg_offset,
        }
    }

    /// A range entry with a signed offset truncated to six bits.
    pub const fn signed(min_qp: u8, max_qp: u8, bpg_offset: i8) -> Self {
        Self::new(min_qp, max_qp, (bpg_offset as u8) & 0x3F)
    }
}

/// Display stream compression parameters handed to the host for the PPS.
///
/// Zero fields are left for the host controller to derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DscConfig {
    /// DSC major version.
    pub version_major: u8,
    /// DSC minor version.
    pub version_minor: u8,
    /// Slices per line.
    pub slice_count: u8,
    /// Slice width in pixels.
    pub slice_width: u16,
    /// Slice height in lines.
    pub slice_height: u16,
    /// Picture width.
    pub pic_width: u16,
    /// Picture height.
    pub pic_height: u16,
    /// Bits per component.
    pub bits_per_component: u8,
    /// Compressed bits per pixel, in 1/16 units.
    pub bits_per_pixel: u16,
    /// Initial transmission delay.
    pub initial_xmit_delay: u16,
    /// Initial decode delay.
    pub initial_dec_delay: u16,
    /// First line BPG offset.
    pub first_line_bpg_offset: u8,
    /// Non-first line BPG offset.
    pub nfl_bpg_offset: u16,
    /// Slice BPG offset.
    pub slice_bpg_offset: u16,
    /// Scale increment interval.
    pub scale_increment_interval: u16,
    /// Scale decrement interval.
    pub scale_decrement_interval: u16,
    /// Final offset.
    pub final_offset: u16,
    /// Rate-control ranges.
    pub rc_range_params: [RcRange; 15],
}

impl DscConfig {
    /// All-zero configuration, used as a base for struct update syntax.
    pub const EMPTY: DscConfig = DscConfig {
        version_major: 1,
        version_minor: 2,
        slice_count: 0,
        slice_width: 0,
        slice_height: 0,
        pic_width: 0,
        pic_height: 0,
        bits_per_component: 0,
        bits_per_pixel: 0,
        initial_xmit_delay: 0,
        initial_dec_delay: 0,
        first_line_bpg_offset: 0,
        nfl_bpg_offset: 0,
        slice_bpg_offset: 0,
        scale_increment_interval: 0,
        scale_decrement_interval: 0,
        final_offset: 0,
        rc_range_params: [RcRange::new(0, 0, 0); 15],
    };
}

/// Default 8 bpc rate-control ranges.
pub const DSC_RC_RANGES_8BPC: [RcRange; 15] = [
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
    RcRange::new(5, 10, 54),
    RcRange::new(5, 11, 52),
    RcRange::new(5, 11, 52),
    RcRange::new(9, 12, 52),
    RcRange::new(12, 13, 52),
];

/// TE2 edge timing in lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Te2Timing {
    /// Rising edge.
    pub rising_edge: u32,
    /// Falling edge.
    pub falling_edge: u32,
}

/// A display mode of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelMode {
    /// Mode name, e.g. `"2152x2076@120:240"` (refresh:TE).
    pub name: &'static str,
    /// Timing.
    pub timing: DisplayTiming,
    /// Timing and TE flags.
    pub flags: ModeFlags,
    /// Mode type.
    pub mode_type: ModeType,
    /// Physical width in millimetres.
    pub width_mm: u16,
    /// Physical height in millimetres.
    pub height_mm: u16,
    /// TE pulse width in microseconds, 0 when not specified.
    pub te_usec: u32,
    /// Always-on-display (low-power) mode.
    pub is_lp_mode: bool,
    /// Idle policy.
    pub idle_mode: IdleMode,
    /// Builds exposing the mode.
    pub availability: Availability,
    /// TE2 timing while the mode is active.
    pub te2_timing: Option<Te2Timing>,
}

impl PanelMode {
    /// A normal (non-LP) mode with no flags, idle support or TE width.
    pub const fn new(name: &'static str, timing: DisplayTiming, width_mm: u16, height_mm: u16) -> Self {
        Self {
            name,
            timing,
            flags: ModeFlags::empty(),
            mode_type: ModeType::empty(),
            width_mm,
            height_mm,
            te_usec: 0,
            is_lp_mode: false,
            idle_mode: IdleMode::Unsupported,
            availability: Availability::Always,
            te2_timing: None,
        }
    }

    /// Add timing flags.
    pub const fn flags(self, flags: ModeFlags) -> Self {
        Self { flags, ..self }
    }

    /// Set the mode type.
    pub const fn mode_type(self, mode_type: ModeType) -> Self {
        Self { mode_type, ..self }
    }

    /// Set the TE width.
    pub const fn te_usec(self, te_usec: u32) -> Self {
        Self { te_usec, ..self }
    }

    /// Mark as the low-power mode.
    pub const fn lp(self) -> Self {
        Self {
            is_lp_mode: true,
            ..self
        }
    }

    /// Set the idle policy.
    pub const fn idle(self, idle_mode: IdleMode) -> Self {
        Self { idle_mode, ..self }
    }

    /// Restrict to some builds.
    pub const fn availability(self, availability: Availability) -> Self {
        Self {
            availability,
            ..self
        }
    }

    /// Attach TE2 timing.
    pub const fn te2(self, rising_edge: u32, falling_edge: u32) -> Self {
        Self {
            te2_timing: Some(Te2Timing {
                rising_edge,
                falling_edge,
            }),
            ..self
        }
    }

    /// Refresh rate in Hz.
    pub const fn vrefresh(&self) -> u32 {
        self.timing.vrefresh()
    }

    /// Whether this is a variable refresh rate mode.
    pub const fn is_vrr(&self) -> bool {
        self.mode_type.contains(ModeType::VRR)
    }

    /// Whether the panel runs at normal speed in this mode.
    pub const fn is_ns(&self) -> bool {
        self.flags.contains(ModeFlags::NS)
    }

    /// Whether this is the preferred mode.
    pub const fn is_preferred(&self) -> bool {
        self.mode_type.contains(ModeType::PREFERRED)
    }

    /// TE frequency in Hz.
    ///
    /// VRR modes multiply the refresh rate by their TE factor; every other
    /// mode runs TE at the refresh rate.
    pub const fn te_freq(&self) -> u32 {
        let vrefresh = self.vrefresh();
        if !self.is_vrr() {
            return vrefresh;
        }
        if self.flags.contains(ModeFlags::TE_FREQ_X4) {
            vrefresh * 4
        } else if self.flags.contains(ModeFlags::TE_FREQ_X2) {
            vrefresh * 2
        } else {
            vrefresh
        }
    }

    /// Frame period in microseconds.
    pub const fn period_us(&self) -> u32 {
        let vrefresh = self.vrefresh();
        if vrefresh == 0 { 0 } else { 1_000_000 / vrefresh }
    }

    /// Whether switching to `other` keeps the same active area.
    pub const fn same_resolution(&self, other: &PanelMode) -> bool {
        self.timing.hdisplay == other.timing.hdisplay && self.timing.vdisplay == other.timing.vdisplay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING_120: DisplayTiming = DisplayTiming::new(120, 2152, 80, 30, 38, 2076, 6, 4, 14);

    #[test]
    fn test_timing_totals_and_clock() {
        assert_eq!(TIMING_120.htotal, 2300);
        assert_eq!(TIMING_120.vtotal, 2100);
        assert_eq!(TIMING_120.clock, 2300 * 2100 * 120 / 1000);
        assert_eq!(TIMING_120.vrefresh(), 120);
    }

    #[test]
    fn test_low_rates_round_trip() {
        for fps in [1, 10, 30, 60] {
            let timing = DisplayTiming::new(fps, 2152, 80, 30, 38, 2076, 6, 4, 14);
            assert_eq!(timing.vrefresh(), fps);
        }
    }

    #[test]
    fn test_te_freq_only_multiplied_for_vrr() {
        let mrr = PanelMode::new("a", TIMING_120, 0, 0).flags(ModeFlags::TE_FREQ_X2);
        assert_eq!(mrr.te_freq(), 120);

        let vrr = mrr.mode_type(ModeType::VRR);
        assert_eq!(vrr.te_freq(), 240);
    }

    #[test]
    fn test_availability() {
        assert!(Availability::FactoryOnly.allows(true));
        assert!(!Availability::FactoryOnly.allows(false));
        assert!(Availability::ProductionOnly.allows(false));
        assert!(Availability::Always.allows(false));
    }
}
