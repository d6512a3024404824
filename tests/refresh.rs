//! Refresh state machine driven end to end through the ct3a panel.

use ct3_panel::{
    DisplayPanel, Features, MockDsi, MockHost, ModeType, Panel, PanelConfig, PanelError, PanelRevision,
    PowerState, TeOption,
};
use std::time::Duration;

const HS_120: &str = "2152x2076@120:120";
const NS_60: &str = "2152x2076@60:60";

fn enabled_ct3a(config: PanelConfig, mode: &str) -> Panel<MockDsi, MockHost> {
    let mut panel = Panel::probe("google,gs-ct3a", MockDsi::new(), MockHost::new(), config).unwrap();
    assert_eq!(panel.identify(0x0000_A000), PanelRevision::Pvt);
    panel.set_mode(mode).unwrap();
    panel.prepare().unwrap();
    panel.enable().unwrap();
    panel
}

#[test]
fn test_enable_programs_auto_mode() {
    let panel = enabled_ct3a(
        PanelConfig {
            min_vrefresh: 10,
            ..PanelConfig::default()
        },
        HS_120,
    );

    let state = panel.state();
    assert_eq!(state.power, PowerState::Normal);
    assert_eq!(state.hw.vrefresh, 120);
    assert_eq!(state.hw.idle_vrefresh, 10);
    assert_eq!(state.auto_mode_vrefresh, 10);
    assert!(state.hw.features.contains(Features::FRAME_AUTO | Features::EARLY_EXIT));
    assert_eq!(state.hw.features, state.sw.features);

    // 10 Hz auto target in HS
    assert!(panel.dsi().sent(&[0xBD, 0x00, 0x16]));
    assert_eq!(panel.host().notify_count(), 1);
    assert_eq!(panel.dsi().packets().last(), Some(&vec![0xF0, 0xA5, 0xA5]));
}

#[test]
fn test_commit_drops_to_manual_mode() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    assert_eq!(panel.state().hw.idle_vrefresh, 1);

    panel.commit_done().unwrap();
    let state = panel.state();
    assert!(!state.sw.features.contains(Features::FRAME_AUTO));
    assert_eq!(state.hw.idle_vrefresh, 0);
    assert_eq!(state.panel_idle_vrefresh, 0);
    assert_eq!(panel.host().notify_count(), 2);

    // nothing left to undo
    panel.dsi_mut().clear();
    panel.commit_done().unwrap();
    assert!(panel.dsi().packets().is_empty());
}

#[test]
fn test_commit_sends_early_exit_when_te_changeable() {
    let mut panel = enabled_ct3a(
        PanelConfig {
            force_changeable_te: true,
            ..PanelConfig::default()
        },
        HS_120,
    );

    panel.dsi_mut().clear();
    panel.commit_done().unwrap();
    assert!(panel.dsi().sent(&[0xF7, 0x0F]));
    assert!(panel.state().sw.features.contains(Features::FRAME_AUTO));

    // back-to-back commits are still at the high rate
    panel.dsi_mut().clear();
    panel.host_mut().advance(Duration::from_millis(5));
    panel.commit_done().unwrap();
    assert!(panel.dsi().packets().is_empty());

    panel.host_mut().advance(Duration::from_millis(20));
    panel.commit_done().unwrap();
    assert!(panel.dsi().sent(&[0xF7, 0x0F]));
}

#[test]
fn test_commit_ignored_while_off() {
    let mut panel = Panel::probe("google,gs-ct3a", MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
    panel.set_mode(HS_120).unwrap();
    panel.commit_done().unwrap();
    assert!(panel.dsi().packets().is_empty());
    assert!(panel.state().sw.features.is_empty());
}

#[test]
fn test_self_refresh_ignored_while_off() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    panel.disable().unwrap();
    panel.unprepare().unwrap();
    let hw = panel.state().hw;

    panel.dsi_mut().clear();
    panel.set_min_vrefresh(10).unwrap();
    assert!(!panel.set_self_refresh(true).unwrap());
    assert!(panel.dsi().packets().is_empty());
    assert_eq!(panel.state().hw, hw);

    // the idle rate lands on the next power on
    panel.prepare().unwrap();
    panel.enable().unwrap();
    assert_eq!(panel.state().hw.idle_vrefresh, 10);
}

#[test]
fn test_min_vrefresh_reapplies_idle_rate() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    assert_eq!(panel.state().hw.idle_vrefresh, 1);

    panel.set_min_vrefresh(20).unwrap();
    assert_eq!(panel.state().hw.idle_vrefresh, 30);
    assert_eq!(panel.config().min_vrefresh, 20);

    panel.set_min_vrefresh(-1).unwrap();
    let state = panel.state();
    assert_eq!(state.hw.idle_vrefresh, 0);
    assert!(!state.hw.features.contains(Features::FRAME_AUTO));
}

#[test]
fn test_dimming_blocks_auto_mode() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    panel.set_dimming(true).unwrap();
    panel.set_idle_delay_ms(0).unwrap();
    assert_eq!(panel.state().hw.idle_vrefresh, 0);

    panel.set_dimming(false).unwrap();
    panel.set_panel_idle_enabled(true).unwrap();
    assert_eq!(panel.state().hw.idle_vrefresh, 1);
}

#[test]
fn test_op_hz_rejections() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);

    assert!(matches!(
        panel.set_op_hz(60),
        Err(PanelError::InvalidOpHz { hz: 60, vrefresh: 120 })
    ));
    assert!(matches!(panel.set_op_hz(90), Err(PanelError::InvalidOpHz { .. })));
    assert_eq!(panel.state().op_hz, 120);

    let vrr = panel
        .get_modes()
        .into_iter()
        .find(|mode| mode.mode_type.contains(ModeType::VRR))
        .unwrap();
    panel.switch_mode(vrr).unwrap();
    assert!(matches!(panel.set_op_hz(120), Err(PanelError::OpHzInVrrMode(_))));
}

#[test]
fn test_ns_blocks_120hz_modes() {
    let mut panel = enabled_ct3a(PanelConfig::default(), NS_60);
    panel.set_op_hz(60).unwrap();
    let state = panel.state();
    assert_eq!(state.op_hz, 60);
    assert!(state.hw.features.contains(Features::OP_NS));

    assert!(matches!(
        panel.set_mode(HS_120),
        Err(PanelError::VrefreshAboveOpHz { vrefresh: 120, op_hz: 60 })
    ));
    assert_eq!(panel.state().current_mode, Some(NS_60));

    // back to HS waits a frame
    let waits = panel.host().vblank_waits();
    panel.set_op_hz(120).unwrap();
    assert_eq!(panel.host().vblank_waits(), waits + 1);
    assert!(!panel.state().hw.features.contains(Features::OP_NS));
}

#[test]
fn test_op_hz_cached_while_off() {
    let mut panel = Panel::probe("google,gs-ct3a", MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
    panel.set_mode(NS_60).unwrap();
    panel.set_op_hz(60).unwrap();
    assert!(panel.dsi().packets().is_empty());
    assert!(panel.state().sw.features.contains(Features::OP_NS));
}

#[test]
fn test_mode_above_cached_op_hz_rejected_while_off() {
    let mut panel = Panel::probe("google,gs-ct3a", MockDsi::new(), MockHost::new(), PanelConfig::default()).unwrap();
    panel.set_mode(NS_60).unwrap();
    panel.set_op_hz(60).unwrap();

    let result = panel.set_mode(HS_120);
    assert!(matches!(result, Err(PanelError::VrefreshAboveOpHz { vrefresh: 120, op_hz: 60 })));
    assert_eq!(panel.state().current_mode, Some(NS_60));

    panel.prepare().unwrap();
    panel.enable().unwrap();
    let state = panel.state();
    assert_eq!(state.power, PowerState::Normal);
    assert_eq!(state.hw.vrefresh, 60);
    assert!(panel.dsi().sent(&[0x29]));
}

#[test]
fn test_production_vrr_runs_manual_with_early_exit() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    let vrr = panel
        .get_modes()
        .into_iter()
        .find(|mode| mode.name == "2152x2076@120:240")
        .unwrap();
    panel.switch_mode(vrr).unwrap();

    let state = panel.state();
    assert_eq!(state.hw.vrefresh, 1);
    assert_eq!(state.hw.idle_vrefresh, 0);
    assert!(state.hw.features.contains(Features::EARLY_EXIT));
    assert!(!state.hw.features.contains(Features::FRAME_AUTO));
    assert_eq!(state.hw.te.rate_hz, 240);
    assert_eq!(state.hw.te.option, TeOption::Fixed);
}

#[test]
fn test_factory_build_exposes_fixed_rates() {
    let mut panel = enabled_ct3a(PanelConfig::factory(), HS_120);
    let names: Vec<_> = panel.get_modes().iter().map(|mode| mode.name).collect();
    assert!(names.contains(&"2152x2076@10:10"));
    assert!(!names.contains(&"2152x2076@120:240"));

    // factory builds never idle on their own
    panel.panel_init().unwrap();
    assert!(!panel.config().panel_idle_enabled);
    assert_eq!(panel.state().hw.features, panel.state().sw.features);
}

#[test]
fn test_lp_round_trip() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    let lp = panel.desc().lp_modes[0].name;

    panel.set_mode(lp).unwrap();
    let state = panel.state();
    assert_eq!(state.power, PowerState::Lp);
    assert_eq!(state.hw.vrefresh, 30);
    assert!(state.binned_lp.is_some());
    assert_eq!(state.te2_option, TeOption::Fixed);

    // LP only reports the idle rate
    assert!(!panel.set_self_refresh(true).unwrap());
    assert_eq!(panel.state().panel_idle_vrefresh, 1);

    panel.set_mode(HS_120).unwrap();
    let state = panel.state();
    assert_eq!(state.power, PowerState::Normal);
    assert_eq!(state.hw.vrefresh, 120);
    assert_eq!(state.hw.features, state.sw.features);
}

#[test]
fn test_pixel_off_instead_of_zero_brightness() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    panel.dsi_mut().clear();

    panel.set_brightness(0).unwrap();
    assert_eq!(panel.dsi().packets(), vec![vec![0x22]]);
    assert!(panel.state().is_pixel_off);

    panel.set_brightness(0).unwrap();
    assert_eq!(panel.dsi().packets().len(), 1);

    panel.set_brightness(0x123).unwrap();
    assert_eq!(
        panel.dsi().packets()[1..].to_vec(),
        vec![vec![0x13], vec![0x51, 0x01, 0x23]]
    );
    let state = panel.state();
    assert!(!state.is_pixel_off);
    assert_eq!(state.brightness, 0x123);
}

#[test]
fn test_write_failure_keeps_hardware_state() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    let before = panel.state().hw;

    panel.dsi_mut().fail_writes_after(0);
    assert!(matches!(panel.set_min_vrefresh(30), Err(PanelError::Dsi(_))));
    assert_eq!(panel.state().hw, before);

    // the requested rate is remembered even though it never reached the panel
    assert_eq!(panel.state().auto_mode_vrefresh, 30);

    panel.dsi_mut().stop_failing();
    panel.set_min_vrefresh(10).unwrap();
    assert_eq!(panel.state().hw.idle_vrefresh, 10);
}

#[test]
fn test_disable_resets_confirmed_state() {
    let mut panel = enabled_ct3a(PanelConfig::default(), HS_120);
    panel.disable().unwrap();
    panel.unprepare().unwrap();

    let state = panel.state();
    assert_eq!(state.power, PowerState::Off);
    assert!(state.hw.features.is_empty());
    assert_eq!(state.hw.vrefresh, 60);
    assert_eq!(panel.host().reset_history().last(), Some(&false));
}
