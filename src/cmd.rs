//! Static, revision-filtered command tables.

use crate::dsi::DcsBuffer;
use crate::error::DsiError;
use crate::revision::{PanelRevision, RevisionMask};
use std::fmt::Write as _;

/// One packet of a static command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsiCmd {
    /// Command byte followed by parameters.
    pub payload: &'static [u8],
    /// Revisions the packet is sent on.
    pub rev: RevisionMask,
    /// Settle time after the packet, in milliseconds.
    pub delay_ms: u32,
}

impl DsiCmd {
    /// A packet sent on every revision with no delay.
    pub const fn new(payload: &'static [u8]) -> Self {
        Self {
            payload,
            rev: RevisionMask::ANY,
            delay_ms: 0,
        }
    }

    /// Restrict the packet to `rev`.
    pub const fn rev(self, rev: RevisionMask) -> Self {
        Self { rev, ..self }
    }

    /// Wait `delay_ms` after sending the packet.
    pub const fn delay(self, delay_ms: u32) -> Self {
        Self { delay_ms, ..self }
    }
}

/// A named list of commands, e.g. the power-on init sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdSet {
    /// Name used for debug dumps.
    pub name: &'static str,
    /// Packets in transmit order.
    pub cmds: &'static [DsiCmd],
}

impl CmdSet {
    /// Packets that apply to `rev`, in order.
    pub fn for_revision(&self, rev: PanelRevision) -> impl Iterator<Item = &'static DsiCmd> {
        self.cmds.iter().filter(move |cmd| cmd.rev.matches(rev))
    }

    /// Queue every packet for `rev`.
    ///
    /// Packets carrying a delay flush the batch and then invoke `delay`
    /// with the settle time.
    pub fn send(
        &self,
        buf: &mut DcsBuffer<'_>,
        rev: PanelRevision,
        delay: &mut dyn FnMut(u32),
    ) -> Result<(), DsiError> {
        for cmd in self.for_revision(rev) {
            buf.add(cmd.payload);
            if cmd.delay_ms > 0 {
                buf.flush()?;
                delay(cmd.delay_ms);
            }
        }
        buf.flush()
    }

    /// Hex dump for `rev`, one packet per line.
    pub fn dump(&self, rev: PanelRevision) -> String {
        let mut out = String::new();
        for cmd in self.for_revision(rev) {
            let hex: Vec<String> = cmd.payload.iter().map(|b| format!("{b:02x}")).collect();
            let _ = write!(out, "{}", hex.join(" "));
            if cmd.delay_ms > 0 {
                let _ = write!(out, " (wait {}ms)", cmd.delay_ms);
            }
            out.push('\n');
        }
        out
    }
}

/// Queue the packets of a borrowed list that apply to `rev`.
pub fn add_for_revision(buf: &mut DcsBuffer<'_>, cmds: &[DsiCmd], rev: PanelRevision) {
    for cmd in cmds.iter().filter(|cmd| cmd.rev.matches(rev)) {
        buf.add(cmd.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDsi;

    const CMDS: &[DsiCmd] = &[
        DsiCmd::new(&[0x35]),
        DsiCmd::new(&[0xB9, 0x00, 0x51]).rev(RevisionMask::PROTO1),
        DsiCmd::new(&[0xB9, 0x04]).rev(RevisionMask::ge(PanelRevision::Evt1)),
        DsiCmd::new(&[0x11]).delay(120),
    ];
    const SET: CmdSet = CmdSet {
        name: "init",
        cmds: CMDS,
    };

    #[test]
    fn test_revision_filter() {
        let evt: Vec<_> = SET.for_revision(PanelRevision::Evt1_1).collect();
        assert_eq!(evt.len(), 3);
        assert_eq!(evt[1].payload, &[0xB9, 0x04]);

        let proto: Vec<_> = SET.for_revision(PanelRevision::Proto1).collect();
        assert_eq!(proto[1].payload, &[0xB9, 0x00, 0x51]);
    }

    #[test]
    fn test_send_honours_delays() {
        let mut dsi = MockDsi::new();
        let mut waited = Vec::new();
        {
            let mut buf = DcsBuffer::new(&mut dsi);
            SET.send(&mut buf, PanelRevision::Pvt, &mut |ms| waited.push(ms))
                .unwrap();
        }
        assert_eq!(waited, vec![120]);
        assert_eq!(dsi.packets().len(), 3);
    }

    #[test]
    fn test_dump_format() {
        let text = SET.dump(PanelRevision::Proto1);
        assert_eq!(text, "35\nb9 00 51\n11 (wait 120ms)\n");
    }
}
