//! Per-panel power sequences and quirks.

use ct3_panel::{
    ClockOverride, CrtcMode, CrtcState, DisplayPanel, HbmMode, MockDsi, MockHost, Panel, PanelConfig, PanelRevision,
    PowerState, compatibles,
};

const PAGE4: &[u8] = &[0xF0, 0x55, 0xAA, 0x52, 0x08, 0x04];
const BEH_GOOD: &[u8] = &[0x00, 0x02, 0x00, 0x11, 0x22, 0x00, 0x33, 0x00, 0x06, 0x03];
const BEH_BAD: &[u8] = &[0xFF; 10];

fn probe(compatible: &str) -> Panel<MockDsi, MockHost> {
    Panel::probe(compatible, MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap()
}

fn enabled(compatible: &str, dsi: MockDsi, mode: &str) -> Panel<MockDsi, MockHost> {
    let mut panel = Panel::probe(compatible, dsi, MockHost::new(), PanelConfig::default()).unwrap();
    panel.set_mode(mode).unwrap();
    panel.prepare().unwrap();
    panel.enable().unwrap();
    panel
}

fn count(panel: &Panel<MockDsi, MockHost>, payload: &[u8]) -> usize {
    panel.dsi().packets().iter().filter(|packet| packet.as_slice() == payload).count()
}

#[test]
fn test_every_panel_powers_on_and_off() {
    for compatible in compatibles().filter(|c| c.starts_with("google,gs-")) {
        let mut dsi = MockDsi::new();
        dsi.set_read_response(0xBE, BEH_GOOD);
        let mut panel = Panel::probe(compatible, dsi, MockHost::new(), PanelConfig::default()).unwrap();

        let mode = panel.get_modes()[0];
        panel.switch_mode(mode).unwrap();
        panel.prepare().unwrap();
        panel.enable().unwrap();
        assert_eq!(panel.state().power, PowerState::Normal, "{compatible}");
        assert!(panel.dsi().sent(&[0x29]), "{compatible} never turned the display on");

        panel.disable().unwrap();
        panel.unprepare().unwrap();
        assert_eq!(panel.state().power, PowerState::Off);
        assert_eq!(panel.host().reset_history().last(), Some(&false));
    }
}

/// One panel id per revision the panel can report.
fn revision_ids(panel: &mut Panel<MockDsi, MockHost>) -> Vec<(PanelRevision, u32)> {
    let mut ids: Vec<(PanelRevision, u32)> = Vec::new();
    for code in 0u32..=0xFF {
        let id = code << 8;
        let rev = panel.identify(id);
        if !ids.iter().any(|(known, _)| *known == rev) {
            ids.push((rev, id));
        }
    }
    ids
}

#[test]
fn test_idle_rate_supported_for_every_mode_and_revision() {
    for compatible in compatibles().filter(|c| c.starts_with("google,gs-")) {
        for factory_build in [false, true] {
            let base = PanelConfig {
                factory_build,
                ..PanelConfig::default()
            };
            let mut panel = Panel::probe(compatible, MockDsi::new(), MockHost::new(), base.clone()).unwrap();
            let ids = revision_ids(&mut panel);

            for mode in panel.get_modes() {
                for &(rev, id) in &ids {
                    for min_vrefresh in [1, 10, 30] {
                        let mut dsi = MockDsi::new();
                        dsi.set_read_response(0xBE, BEH_GOOD);
                        let config = PanelConfig {
                            min_vrefresh,
                            ..base.clone()
                        };
                        let mut panel = Panel::probe(compatible, dsi, MockHost::new(), config).unwrap();
                        panel.identify(id);
                        panel.switch_mode(mode).unwrap();
                        panel.prepare().unwrap();
                        panel.enable().unwrap();

                        let state = panel.state();
                        let idle = state.hw.idle_vrefresh;
                        let at = format!("{compatible} {} rev {rev} min {min_vrefresh}", mode.name);
                        assert!([0, 1, 10, 30].contains(&idle), "{at}: idle {idle}");
                        assert!(idle == 0 || idle < mode.vrefresh(), "{at}: idle {idle}");
                        assert_eq!(state.hw.features, state.sw.features, "{at}");
                    }
                }
            }
        }
    }
}

#[test]
fn test_lp_modes_hidden_from_mode_list() {
    for compatible in compatibles() {
        let panel = probe(compatible);
        assert!(panel.get_modes().iter().all(|mode| !mode.is_lp_mode), "{compatible}");
        assert!(!panel.desc().lp_modes.is_empty());
    }
}

#[test]
fn test_ct3d_beh_passes_first_time() {
    let mut dsi = MockDsi::new();
    dsi.set_read_response(0xBE, BEH_GOOD);
    let panel = enabled("google,gs-ct3d", dsi, "1080x2424@60:60");

    assert_eq!(panel.dsi().reads(), &[0xBE]);
    assert!(!panel.dsi().sent(&[0xC2, 0x14]));
    assert!(!panel.dsi().sent(&[0x10]));
}

#[test]
fn test_ct3d_beh_retries_at_slow_spi() {
    let mut dsi = MockDsi::new();
    dsi.queue_read_response(0xBE, BEH_BAD);
    dsi.set_read_response(0xBE, BEH_GOOD);
    let panel = enabled("google,gs-ct3d", dsi, "1080x2424@60:60");

    assert_eq!(panel.dsi().reads(), &[0xBE, 0xBE]);
    assert_eq!(count(&panel, &[0x10]), 1);

    // slow down, cycle sleep, speed back up
    let slow = panel.dsi().position(&[0xC2, 0x14]).unwrap();
    let sleep = panel.dsi().position(&[0x10]).unwrap();
    let fast = panel.dsi().position(&[0xC2, 0x33]).unwrap();
    assert!(slow < sleep && sleep < fast);
    assert_eq!(panel.dsi().packets()[slow - 1], PAGE4);
}

#[test]
fn test_ct3d_beh_failure_does_not_block_enable() {
    let panel = enabled("google,gs-ct3d", MockDsi::new(), "1080x2424@60:60");

    assert_eq!(panel.dsi().reads().len(), 4);
    assert_eq!(count(&panel, &[0x10]), 3);
    assert!(panel.dsi().sent(&[0xC2, 0x33]));
    assert_eq!(panel.state().power, PowerState::Normal);
}

#[test]
fn test_ct3d_ffc_table_only_on_clock_change() {
    let mut dsi = MockDsi::new();
    dsi.set_read_response(0xBE, BEH_GOOD);
    let mut panel = enabled("google,gs-ct3d", dsi, "1080x2424@60:60");

    panel.dsi_mut().clear();
    panel.pre_update_ffc().unwrap();
    assert_eq!(panel.dsi().packets().last(), Some(&vec![0xC3, 0x00]));

    panel.dsi_mut().clear();
    panel.update_ffc(756).unwrap();
    assert_eq!(panel.dsi().packets().len(), 4);
    assert_eq!(panel.dsi().packets().last(), Some(&vec![0xC3, 0xDD]));

    panel.dsi_mut().clear();
    panel.update_ffc(756).unwrap();
    assert_eq!(panel.dsi().packets().len(), 2);

    // unknown clocks only turn FFC back on
    panel.dsi_mut().clear();
    panel.update_ffc(1000).unwrap();
    assert_eq!(panel.dsi().packets().len(), 2);
}

#[test]
fn test_ct3d_te2_follows_mode() {
    let mut dsi = MockDsi::new();
    dsi.set_read_response(0xBE, BEH_GOOD);
    let panel = enabled("google,gs-ct3d", dsi, "1080x2424@120:120");

    let packets = panel.dsi().packets();
    let n = packets.len();
    assert_eq!(packets[n - 2], vec![0x44, 0x00, 0x00]);
    assert_eq!(packets[n - 1], vec![0x35, 0x00, 45]);
}

#[test]
fn test_ct3d_hbm2_at_peak_level() {
    let mut dsi = MockDsi::new();
    dsi.set_read_response(0xBE, BEH_GOOD);
    let mut panel = enabled("google,gs-ct3d", dsi, "1080x2424@60:60");

    panel.set_hbm_mode(HbmMode::OnIrcOff).unwrap();
    panel.dsi_mut().clear();
    panel.set_brightness(3939).unwrap();
    assert!(panel.dsi().sent(&[0x51, 0x0F, 0xFF]));
    assert!(panel.dsi().sent(&[0x55, 0x04]));

    panel.dsi_mut().clear();
    panel.set_brightness(3700).unwrap();
    assert!(panel.dsi().sent(&[0x55, 0x00]));
    assert_eq!(panel.dsi().packets().last(), Some(&vec![0x51, 0x0E, 0x74]));
}

#[test]
fn test_ct3e_brightness_capped_at_hbm_max() {
    let mut panel = enabled("google,gs-ct3e", MockDsi::new(), "1080x2424@120:120");
    let max = panel.desc().brightness[0].capability.hbm.level.max;

    panel.dsi_mut().clear();
    panel.set_brightness(u16::MAX).unwrap();
    let [hi, lo] = max.to_be_bytes();
    assert_eq!(panel.dsi().packets(), vec![vec![0x51, hi, lo]]);
}

#[test]
fn test_ct3e_compression_and_pps() {
    let panel = enabled("google,gs-ct3e", MockDsi::new(), "1080x2424@60:60");
    assert!(panel.dsi().compression());
    assert_eq!(panel.dsi().pps_count(), 1);
    assert!(panel.dsi().sent(&[0x83, 0x08]));
}

#[test]
fn test_ct3c_lp_round_trip() {
    let mut panel = enabled("google,gs-ct3c", MockDsi::new(), "1080x2424@60:60");
    let lp = panel.desc().lp_modes[0].name;

    panel.set_mode(lp).unwrap();
    let state = panel.state();
    assert_eq!(state.power, PowerState::Lp);
    assert!(state.binned_lp.is_some());

    // dimming is deferred in LP
    panel.dsi_mut().clear();
    panel.set_dimming(true).unwrap();
    assert!(panel.dsi().packets().is_empty());

    panel.set_mode("1080x2424@60:60").unwrap();
    assert_eq!(panel.state().power, PowerState::Normal);
    assert_eq!(panel.dsi().packets().last(), Some(&vec![0x29]));
    assert!(panel.host().vblank_waits() >= 1);
}

#[test]
fn test_binned_lp_only_rewritten_on_change() {
    let mut panel = enabled("google,gs-ct3e", MockDsi::new(), "1080x2424@60:60");
    let lp = panel.desc().lp_modes[0].name;
    panel.set_brightness(100).unwrap();
    panel.set_mode(lp).unwrap();
    assert_eq!(panel.state().binned_lp, Some("low"));

    panel.dsi_mut().clear();
    panel.set_binned_lp(200).unwrap();
    assert!(panel.dsi().packets().is_empty());

    panel.set_binned_lp(3000).unwrap();
    assert_eq!(panel.state().binned_lp, Some("high"));
    assert!(!panel.dsi().packets().is_empty());
}

#[test]
fn test_thermal_zone_registration_failure_is_not_fatal() {
    let mut host = MockHost::new();
    host.fail_thermal_registration(true);
    let panel = Panel::probe("google,gs-ct3a", MockDsi::new(), host, PanelConfig::default()).unwrap();
    assert!(panel.thermal_zone().is_none());
    assert!(panel.host().thermal_zones().is_empty());

    let panel = probe("google,gs-ct3b");
    assert_eq!(panel.host().thermal_zones(), &["inner_brightness"]);
}

fn crtc_mode(panel: &Panel<MockDsi, MockHost>, name: &'static str) -> CrtcMode {
    let mode = panel
        .get_modes()
        .into_iter()
        .chain(panel.desc().lp_modes.iter())
        .find(|mode| mode.name == name)
        .unwrap();
    CrtcMode {
        name,
        timing: mode.timing,
    }
}

#[test]
fn test_ct3d_clock_raised_on_resume_then_restored() {
    let mut dsi = MockDsi::new();
    dsi.set_read_response(0xBE, BEH_GOOD);
    let mut panel = enabled("google,gs-ct3d", dsi, "1080x2424@60:60");
    let mode = crtc_mode(&panel, "1080x2424@60:60");

    let mut old = CrtcState::active(mode);
    old.active = false;
    let mut new = CrtcState::active(mode);
    assert_eq!(panel.atomic_check(&old, &mut new), ClockOverride::Raised);
    assert!(new.mode_changed);
    assert_eq!(new.adjusted_mode.vrefresh(), 120);
    assert!(panel.state().needs_commit);

    let old = new;
    let mut new = CrtcState::active(mode);
    new.adjusted_mode = old.adjusted_mode;
    assert_eq!(panel.atomic_check(&old, &mut new), ClockOverride::Restored);
    assert_eq!(new.adjusted_mode.timing.clock, mode.timing.clock);
    assert!(!panel.state().needs_commit);

    let old = new;
    let mut new = CrtcState::active(mode);
    assert_eq!(panel.atomic_check(&old, &mut new), ClockOverride::Unchanged);
}

#[test]
fn test_clock_untouched_at_120hz_or_without_policy() {
    let mut dsi = MockDsi::new();
    dsi.set_read_response(0xBE, BEH_GOOD);
    let mut panel = enabled("google,gs-ct3d", dsi, "1080x2424@120:120");
    let mode = crtc_mode(&panel, "1080x2424@120:120");
    let mut old = CrtcState::active(mode);
    old.active = false;
    let mut new = CrtcState::active(mode);
    assert_eq!(panel.atomic_check(&old, &mut new), ClockOverride::Unchanged);

    let mut panel = enabled("google,gs-ct3e", MockDsi::new(), "1080x2424@60:60");
    let mode = crtc_mode(&panel, "1080x2424@60:60");
    let mut new = CrtcState::active(mode);
    assert_eq!(panel.atomic_check(&old, &mut new), ClockOverride::Unchanged);
    assert!(!new.mode_changed);
}
