//! Mode clock override across resume, self-refresh exit and LP exit.
//!
//! The panel comes out of those transitions clocked for 120 Hz, so the
//! first commit after them must carry a 120 Hz pixel clock even when the
//! mode is slower. The commit after that restores the real clock.

use crate::mode::DisplayTiming;
use log::debug;

/// CRTC mode as seen by an atomic commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrtcMode {
    /// Mode name.
    pub name: &'static str,
    /// Timing; only `clock` is rewritten by the check.
    pub timing: DisplayTiming,
}

impl CrtcMode {
    /// Refresh rate in Hz.
    pub const fn vrefresh(&self) -> u32 {
        self.timing.vrefresh()
    }
}

/// The part of a DRM CRTC state the panel inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrtcState {
    /// Requested mode.
    pub mode: CrtcMode,
    /// Mode actually programmed.
    pub adjusted_mode: CrtcMode,
    /// CRTC enabled.
    pub active: bool,
    /// CRTC is in self refresh.
    pub self_refresh_active: bool,
    /// `active` flipped in this commit.
    pub active_changed: bool,
    /// A full mode set is needed.
    pub mode_changed: bool,
}

impl CrtcState {
    /// An active CRTC running `mode` unmodified.
    pub const fn active(mode: CrtcMode) -> Self {
        Self {
            mode,
            adjusted_mode: mode,
            active: true,
            self_refresh_active: false,
            active_changed: false,
            mode_changed: false,
        }
    }

    /// Active or in self refresh.
    pub const fn effectively_active(&self) -> bool {
        self.active || self.self_refresh_active
    }
}

/// When a variant raises the pixel clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOverridePolicy {
    /// Raise on self-refresh exit while auto mode is configured.
    pub on_self_refresh_exit: bool,
    /// Raise when leaving the LP mode into a 60 Hz mode.
    pub on_lp_exit_to_60hz: bool,
    /// Only restore in the commit that flips `active`.
    pub restore_needs_active_changed: bool,
    /// Track the connector's `needs_commit` flag.
    pub tracks_needs_commit: bool,
}

/// What the check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOverride {
    /// Nothing to do.
    Unchanged,
    /// Adjusted clock raised to the 120 Hz value.
    Raised,
    /// Adjusted clock put back to the mode clock.
    Restored,
}

/// Inputs from the panel state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OverrideContext {
    pub current_vrefresh: u32,
    pub current_is_lp: bool,
    pub auto_mode_vrefresh: u32,
}

pub(crate) fn check(
    policy: &ClockOverridePolicy,
    ctx: OverrideContext,
    old: &CrtcState,
    new: &mut CrtcState,
) -> ClockOverride {
    if ctx.current_vrefresh == 120 || !new.active {
        return ClockOverride::Unchanged;
    }

    let self_refresh_exit =
        policy.on_self_refresh_exit && ctx.auto_mode_vrefresh != 0 && old.self_refresh_active;
    let resume = !old.effectively_active();
    let lp_exit = policy.on_lp_exit_to_60hz && ctx.current_is_lp && new.mode.vrefresh() == 60;

    if self_refresh_exit || resume || lp_exit {
        let timing = &mut new.adjusted_mode.timing;
        timing.clock = DisplayTiming::clock_for(timing.htotal, timing.vtotal, 120);
        if timing.clock != new.mode.timing.clock {
            new.mode_changed = true;
            let reason = if resume {
                "resume"
            } else if lp_exit {
                "lp exit"
            } else {
                "self refresh exit"
            };
            debug!("raise mode ({}) clock to 120hz on {reason}", new.adjusted_mode.name);
            return ClockOverride::Raised;
        }
        return ClockOverride::Unchanged;
    }

    let hacked = old.adjusted_mode.timing.clock != old.mode.timing.clock;
    if hacked && (old.active_changed || !policy.restore_needs_active_changed) {
        new.mode_changed = true;
        new.adjusted_mode.timing.clock = new.mode.timing.clock;
        debug!("restore mode ({}) clock", new.mode.name);
        return ClockOverride::Restored;
    }

    ClockOverride::Unchanged
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: ClockOverridePolicy = ClockOverridePolicy {
        on_self_refresh_exit: true,
        on_lp_exit_to_60hz: false,
        restore_needs_active_changed: true,
        tracks_needs_commit: false,
    };

    fn mode_60() -> CrtcMode {
        CrtcMode {
            name: "60",
            timing: DisplayTiming::new(60, 2152, 80, 30, 38, 2076, 6, 4, 14),
        }
    }

    fn ctx(auto: u32) -> OverrideContext {
        OverrideContext {
            current_vrefresh: 60,
            current_is_lp: false,
            auto_mode_vrefresh: auto,
        }
    }

    #[test]
    fn test_resume_raises_clock() {
        let mut old = CrtcState::active(mode_60());
        old.active = false;
        let mut new = CrtcState::active(mode_60());

        assert_eq!(check(&POLICY, ctx(0), &old, &mut new), ClockOverride::Raised);
        assert!(new.mode_changed);
        assert_eq!(new.adjusted_mode.vrefresh(), 120);
        assert_eq!(new.mode.vrefresh(), 60);
    }

    #[test]
    fn test_self_refresh_exit_needs_auto_mode() {
        let mut old = CrtcState::active(mode_60());
        old.self_refresh_active = true;

        let mut new = CrtcState::active(mode_60());
        assert_eq!(check(&POLICY, ctx(0), &old, &mut new), ClockOverride::Unchanged);

        let mut new = CrtcState::active(mode_60());
        assert_eq!(check(&POLICY, ctx(10), &old, &mut new), ClockOverride::Raised);
    }

    #[test]
    fn test_restore_after_raise() {
        let mut old = CrtcState::active(mode_60());
        old.adjusted_mode.timing.clock = DisplayTiming::clock_for(2300, 2100, 120);
        old.active_changed = true;
        let mut new = CrtcState::active(mode_60());
        new.adjusted_mode.timing.clock = old.adjusted_mode.timing.clock;

        assert_eq!(check(&POLICY, ctx(0), &old, &mut new), ClockOverride::Restored);
        assert_eq!(new.adjusted_mode.timing.clock, new.mode.timing.clock);
    }

    #[test]
    fn test_skip_at_120hz() {
        let mut old = CrtcState::active(mode_60());
        old.active = false;
        let mut new = CrtcState::active(mode_60());
        let at_120 = OverrideContext {
            current_vrefresh: 120,
            ..ctx(0)
        };
        assert_eq!(check(&POLICY, at_120, &old, &mut new), ClockOverride::Unchanged);
        assert!(!new.mode_changed);
    }
}
