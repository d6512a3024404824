//! Brightness ranges and the binned low-power table.

use crate::cmd::DsiCmd;
use crate::mode::Te2Timing;
use crate::revision::{PanelRevision, RevisionMask};
use log::warn;

/// Inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<T> {
    /// Lower bound.
    pub min: T,
    /// Upper bound.
    pub max: T,
}

impl<T: PartialOrd + Copy> Range<T> {
    /// A range from `min` to `max` inclusive.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies in the range.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Luminance, DBV level and percentage span of one brightness band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessBand {
    /// Luminance in nits.
    pub nits: Range<u32>,
    /// DBV register values.
    pub level: Range<u16>,
    /// Position on the user slider.
    pub percentage: Range<u8>,
}

/// Normal and HBM bands of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessCapability {
    /// Normal band.
    pub normal: BrightnessBand,
    /// High brightness band.
    pub hbm: BrightnessBand,
}

/// Brightness settings for a set of revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessConfig {
    /// Revisions using these settings.
    pub revisions: RevisionMask,
    /// Level applied at probe.
    pub default_brightness: u16,
    /// Band limits.
    pub capability: BrightnessCapability,
}

/// Pick the brightness configuration for `rev`.
///
/// Falls back to the first entry when no configuration lists `rev`.
pub fn config_for_revision(
    configs: &'static [BrightnessConfig],
    rev: PanelRevision,
) -> Option<&'static BrightnessConfig> {
    configs
        .iter()
        .find(|config| config.revisions.matches(rev))
        .or_else(|| {
            let fallback = configs.first();
            if fallback.is_some() {
                warn!("no brightness config for {rev}, using the first entry");
            }
            fallback
        })
}

/// A brightness bin of the low-power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinnedLp {
    /// Bin name, e.g. `"low"`.
    pub name: &'static str,
    /// Highest brightness level served by the bin.
    pub bl_threshold: u16,
    /// Commands that switch the panel to the bin.
    pub cmds: &'static [DsiCmd],
    /// TE2 timing while in the bin.
    pub te2_timing: Option<Te2Timing>,
}

impl BinnedLp {
    /// A bin without TE2 timing.
    pub const fn new(name: &'static str, bl_threshold: u16, cmds: &'static [DsiCmd]) -> Self {
        Self {
            name,
            bl_threshold,
            cmds,
            te2_timing: None,
        }
    }

    /// Attach TE2 timing.
    pub const fn timing(self, rising_edge: u32, falling_edge: u32) -> Self {
        Self {
            te2_timing: Some(Te2Timing {
                rising_edge,
                falling_edge,
            }),
            ..self
        }
    }
}

/// The first bin whose threshold is at least `brightness`.
///
/// Returns `None` above the highest threshold, leaving the current bin in place.
pub fn select_binned_lp(table: &'static [BinnedLp], brightness: u16) -> Option<&'static BinnedLp> {
    table.iter().find(|bin| brightness <= bin.bl_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[BinnedLp] = &[
        BinnedLp::new("off", 0, &[]),
        BinnedLp::new("low", 689, &[]),
        BinnedLp::new("high", 2988, &[]).timing(0, 32),
    ];

    #[test]
    fn test_select_binned_lp() {
        assert_eq!(select_binned_lp(TABLE, 0).map(|b| b.name), Some("off"));
        assert_eq!(select_binned_lp(TABLE, 1).map(|b| b.name), Some("low"));
        assert_eq!(select_binned_lp(TABLE, 689).map(|b| b.name), Some("low"));
        assert_eq!(select_binned_lp(TABLE, 690).map(|b| b.name), Some("high"));
        assert!(select_binned_lp(TABLE, 4000).is_none());
    }

    #[test]
    fn test_range_contains() {
        let range = Range::new(157u16, 2988);
        assert!(range.contains(157));
        assert!(range.contains(2988));
        assert!(!range.contains(2989));
    }
}
