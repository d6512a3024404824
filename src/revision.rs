//! Panel hardware revisions and their decoding from the panel ID.

use bitflags::bitflags;
use std::fmt;

/// Hardware stepping of a panel.
///
/// Revisions are ordered by build stage, so `rev >= PanelRevision::Evt1`
/// reads the way the programming guides gate their registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PanelRevision {
    /// Proto 1.0.
    Proto1,
    /// Proto 1.1.
    Proto1_1,
    /// Proto 1.2.
    Proto1_2,
    /// EVT 1.0.
    Evt1,
    /// EVT 1.1.
    Evt1_1,
    /// EVT 1.2.
    Evt1_2,
    /// DVT 1.0.
    Dvt1,
    /// DVT 1.1.
    Dvt1_1,
    /// PVT.
    Pvt,
    /// Newest known stepping; also used for anything unrecognised.
    Latest,
}

impl PanelRevision {
    /// Every revision, oldest first.
    pub const ALL: [PanelRevision; 10] = [
        PanelRevision::Proto1,
        PanelRevision::Proto1_1,
        PanelRevision::Proto1_2,
        PanelRevision::Evt1,
        PanelRevision::Evt1_1,
        PanelRevision::Evt1_2,
        PanelRevision::Dvt1,
        PanelRevision::Dvt1_1,
        PanelRevision::Pvt,
        PanelRevision::Latest,
    ];

    /// The single-bit mask for this revision.
    pub const fn mask(self) -> RevisionMask {
        match self {
            PanelRevision::Proto1 => RevisionMask::PROTO1,
            PanelRevision::Proto1_1 => RevisionMask::PROTO1_1,
            PanelRevision::Proto1_2 => RevisionMask::PROTO1_2,
            PanelRevision::Evt1 => RevisionMask::EVT1,
            PanelRevision::Evt1_1 => RevisionMask::EVT1_1,
            PanelRevision::Evt1_2 => RevisionMask::EVT1_2,
            PanelRevision::Dvt1 => RevisionMask::DVT1,
            PanelRevision::Dvt1_1 => RevisionMask::DVT1_1,
            PanelRevision::Pvt => RevisionMask::PVT,
            PanelRevision::Latest => RevisionMask::LATEST,
        }
    }

    /// Compact revision code from the build code byte.
    ///
    /// The main stage (bits 5..8 of the build code) lands in bits 2..5 and
    /// the sub stage (bits 2..4) in bits 0..2.
    pub const fn code_from_build(build_code: u8) -> u8 {
        let main = (build_code & 0xE0) >> 3;
        let sub = (build_code & 0x0C) >> 2;
        main | sub
    }

    /// Extract the build code byte from a panel ID.
    pub const fn build_code(id: u32) -> u8 {
        ((id & 0xFF00) >> 8) as u8
    }

    /// Decode a revision code with the layout shared by most ct3 panels.
    pub const fn from_code(code: u8) -> Option<PanelRevision> {
        Some(match code {
            0x00 => PanelRevision::Proto1,
            0x01 => PanelRevision::Proto1_1,
            0x02 => PanelRevision::Proto1_2,
            0x04 => PanelRevision::Evt1,
            0x05 => PanelRevision::Evt1_1,
            0x06 => PanelRevision::Evt1_2,
            0x08 => PanelRevision::Dvt1,
            0x09 => PanelRevision::Dvt1_1,
            0x10 => PanelRevision::Pvt,
            _ => return None,
        })
    }

    /// Display name, e.g. `"EVT1.1"`.
    pub const fn name(self) -> &'static str {
        match self {
            PanelRevision::Proto1 => "PROTO1",
            PanelRevision::Proto1_1 => "PROTO1.1",
            PanelRevision::Proto1_2 => "PROTO1.2",
            PanelRevision::Evt1 => "EVT1",
            PanelRevision::Evt1_1 => "EVT1.1",
            PanelRevision::Evt1_2 => "EVT1.2",
            PanelRevision::Dvt1 => "DVT1",
            PanelRevision::Dvt1_1 => "DVT1.1",
            PanelRevision::Pvt => "PVT",
            PanelRevision::Latest => "LATEST",
        }
    }
}

impl fmt::Display for PanelRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of revisions a command applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RevisionMask: u32 {
        /// Proto 1.0.
        const PROTO1 = 1 << 0;
        /// Proto 1.1.
        const PROTO1_1 = 1 << 1;
        /// Proto 1.2.
        const PROTO1_2 = 1 << 2;
        /// EVT 1.0.
        const EVT1 = 1 << 3;
        /// EVT 1.1.
        const EVT1_1 = 1 << 4;
        /// EVT 1.2.
        const EVT1_2 = 1 << 5;
        /// DVT 1.0.
        const DVT1 = 1 << 6;
        /// DVT 1.1.
        const DVT1_1 = 1 << 7;
        /// PVT.
        const PVT = 1 << 8;
        /// Latest.
        const LATEST = 1 << 31;
    }
}

impl RevisionMask {
    /// Applies to every revision.
    pub const ANY: RevisionMask = RevisionMask::from_bits_retain(u32::MAX);

    /// `rev` and every later revision.
    pub const fn ge(rev: PanelRevision) -> RevisionMask {
        RevisionMask::from_bits_retain(!(rev.mask().bits() - 1))
    }

    /// Every revision strictly before `rev`.
    pub const fn lt(rev: PanelRevision) -> RevisionMask {
        RevisionMask::from_bits_retain(rev.mask().bits() - 1)
    }

    /// Whether `rev` is a member.
    pub const fn matches(self, rev: PanelRevision) -> bool {
        self.bits() & rev.mask().bits() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_code_layout() {
        // main stage 0b010 (DVT), sub stage 0b01
        assert_eq!(PanelRevision::code_from_build(0b0100_0100), 0x09);
        assert_eq!(PanelRevision::build_code(0x00AB_CD12), 0xCD);
    }

    #[test]
    fn test_ge_lt_partition() {
        for rev in PanelRevision::ALL {
            for other in PanelRevision::ALL {
                let ge = RevisionMask::ge(rev).matches(other);
                let lt = RevisionMask::lt(rev).matches(other);
                assert_ne!(ge, lt, "{rev} vs {other}");
                assert_eq!(ge, other >= rev);
            }
        }
    }

    #[test]
    fn test_standard_table() {
        assert_eq!(PanelRevision::from_code(0x04), Some(PanelRevision::Evt1));
        assert_eq!(PanelRevision::from_code(0x10), Some(PanelRevision::Pvt));
        assert_eq!(PanelRevision::from_code(0x03), None);
    }
}
