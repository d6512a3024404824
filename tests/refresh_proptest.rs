//! Property-based tests for the refresh state machine.
//! Invariants checked over arbitrary tunables and brightness sequences.

use ct3_panel::{
    DisplayPanel, Features, MockDsi, MockHost, Panel, PanelConfig, PanelError, PanelRevision, compatibles,
    select_binned_lp,
};
use proptest::prelude::*;

/// Panel id carrying revision code `code` in its build code byte.
fn id_for_code(code: u8) -> u32 {
    let build = ((code & 0x1C) << 3) | ((code & 0x03) << 2);
    u32::from(build) << 8
}

fn enabled_ct3a(mode: &str) -> Panel<MockDsi, MockHost> {
    let mut panel = Panel::probe("google,gs-ct3a", MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
    panel.set_mode(mode).unwrap();
    panel.prepare().unwrap();
    panel.enable().unwrap();
    panel
}

proptest! {
    /// Any minimum refresh rate lands on one of the supported idle rates, below the mode rate.
    #[test]
    fn idle_rate_is_supported(min in any::<i32>()) {
        let mut panel = enabled_ct3a("2152x2076@120:120");
        panel.set_min_vrefresh(min).unwrap();

        let state = panel.state();
        prop_assert!([0, 1, 10, 30].contains(&state.hw.idle_vrefresh));
        prop_assert!(state.hw.idle_vrefresh < state.hw.vrefresh);
        prop_assert_eq!(state.hw.features.contains(Features::FRAME_AUTO), state.hw.idle_vrefresh > 0);
        prop_assert_eq!(state.hw.features, state.sw.features);
    }

    /// After any sequence of tunable changes and commits the panel matches the request.
    #[test]
    fn hardware_tracks_request(
        steps in proptest::collection::vec((-5i32..40, 0u32..3, any::<bool>(), any::<bool>()), 1..12),
    ) {
        let mut panel = enabled_ct3a("2152x2076@60:60");
        for (min, delay, dimming, commit) in steps {
            panel.set_dimming(dimming).unwrap();
            panel.set_idle_delay_ms(delay).unwrap();
            panel.set_min_vrefresh(min).unwrap();
            if commit {
                panel.commit_done().unwrap();
            }
            let state = panel.state();
            prop_assert_eq!(state.hw.features, state.sw.features);
            prop_assert_eq!(state.hw.idle_vrefresh, state.auto_mode_vrefresh);
            if dimming {
                prop_assert_eq!(state.hw.idle_vrefresh, 0);
            }
        }
    }

    /// Only 60 and 120 at or above the mode rate are accepted as operating rates.
    #[test]
    fn op_hz_validated(hz in 0u32..400) {
        let mut panel = enabled_ct3a("2152x2076@60:60");
        match panel.set_op_hz(hz) {
            Ok(()) => prop_assert!(hz == 60 || hz == 120),
            Err(PanelError::InvalidOpHz { .. }) => prop_assert!(hz != 60 && hz != 120),
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
        prop_assert!([60, 120].contains(&panel.state().op_hz));
    }

    /// Zero brightness always means pixel-off, anything else never does.
    #[test]
    fn pixel_off_tracks_last_level(levels in proptest::collection::vec(prop_oneof![Just(0u16), 1u16..4096], 1..16)) {
        let mut panel = enabled_ct3a("2152x2076@120:120");
        for level in &levels {
            panel.set_brightness(*level).unwrap();
        }
        let last = *levels.last().unwrap();
        prop_assert_eq!(panel.state().is_pixel_off, last == 0);
        prop_assert_eq!(panel.state().brightness, last);
    }

    /// The chosen LP bin is the lowest one covering the brightness.
    #[test]
    fn binned_lp_is_lowest_covering_bin(brightness in 0u16..4096) {
        let panel = Panel::probe("google,gs-ct3d", MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
        let table = panel.desc().binned_lp;
        match select_binned_lp(table, brightness) {
            Some(bin) => {
                prop_assert!(brightness <= bin.bl_threshold);
                prop_assert!(table.iter().take_while(|b| !std::ptr::eq(*b, bin)).all(|b| b.bl_threshold < brightness));
            }
            None => prop_assert!(table.iter().all(|b| b.bl_threshold < brightness)),
        }
    }

    /// Any id decodes to a revision, the same one every time, set by its revision code alone.
    #[test]
    fn any_id_decodes(id in any::<u32>()) {
        let code = PanelRevision::code_from_build(PanelRevision::build_code(id));
        for compatible in compatibles() {
            let mut panel = Panel::probe(compatible, MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
            let rev = panel.identify(id);
            prop_assert_eq!(panel.revision(), Some(rev));
            prop_assert_eq!(panel.identify(id), rev);
            prop_assert_eq!(panel.identify(id_for_code(code)), rev);
        }
    }
}

/// Distinct known revision codes never decode to the same revision.
#[test]
fn known_codes_decode_to_distinct_revisions() {
    for compatible in compatibles() {
        let mut panel = Panel::probe(compatible, MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
        let mut seen: Vec<(u8, PanelRevision)> = Vec::new();
        for code in 0u8..0x20 {
            let rev = panel.identify(id_for_code(code));
            if rev == PanelRevision::Latest {
                continue;
            }
            if let Some((other, _)) = seen.iter().find(|(_, known)| *known == rev) {
                panic!("{compatible}: codes {other:#x} and {code:#x} both decode to {rev}");
            }
            seen.push((code, rev));
        }
        assert!(!seen.is_empty(), "{compatible} decodes no known code");
    }
}
