//! Example: Walk a ct3a panel through auto mode, op rate and AOD.
//!
//! Run with: `RUST_LOG=debug cargo run --example ct3_refresh`

use ct3_panel::{DisplayPanel, MockDsi, MockHost, Panel, PanelConfig, PanelError};
use std::time::Duration;

fn main() -> Result<(), PanelError> {
    // Initialize logging (optional)
    env_logger::init();

    // Probe against the mock transport
    let config = PanelConfig {
        min_vrefresh: 10,
        ..PanelConfig::default()
    };
    let mut panel = Panel::probe("google,gs-ct3a", MockDsi::new(), MockHost::new(), config)?;
    let rev = panel.identify(0x0000_A000);
    println!("Probed {} rev {rev}", panel.desc().name);

    // Power on at 120 Hz
    panel.set_mode("2152x2076@120:120")?;
    panel.prepare()?;
    panel.enable()?;
    let state = panel.state();
    println!(
        "Enabled: vrefresh={} idle={} features={:?}",
        state.hw.vrefresh, state.hw.idle_vrefresh, state.hw.features
    );

    // A commit after the panel went idle drops back to manual mode
    panel.host_mut().advance(Duration::from_millis(100));
    panel.commit_done()?;
    println!("After commit: idle={}", panel.state().hw.idle_vrefresh);

    // Normal speed only allows 60 Hz modes
    panel.set_mode("2152x2076@60:60")?;
    panel.set_op_hz(60)?;
    match panel.set_mode("2152x2076@120:120") {
        Ok(()) => println!("Switched to 120 Hz"),
        Err(e) => eprintln!("Rejected: {e}"),
    }

    // Always-on display
    let lp = panel.desc().lp_modes[0].name;
    panel.set_mode(lp)?;
    let state = panel.state();
    println!("AOD: power={:?} bin={:?} te2={:?}", state.power, state.binned_lp, state.te2_option);

    panel.disable()?;
    panel.unprepare()?;
    println!("{} DSI packets sent", panel.dsi().packets().len());

    Ok(())
}
