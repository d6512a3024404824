//! Error types for the panel controller.

/// Errors reported by a [`DsiHost`](crate::DsiHost) transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DsiError {
    /// A write packet was rejected by the host controller.
    #[error("DSI write of command {cmd:#04x} failed: {reason}")]
    Write {
        /// First byte of the rejected packet.
        cmd: u8,
        /// Host-specific description.
        reason: String,
    },

    /// A DCS read transaction failed.
    #[error("DSI read of register {0:#04x} failed")]
    Read(u8),
}

/// Errors that can occur when driving a panel.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// The bus transport failed.
    #[error("DSI transport error: {0}")]
    Dsi(#[from] DsiError),

    /// An operating rate outside {60, 120} or below the active refresh rate.
    #[error("invalid op_hz {hz} for vrefresh {vrefresh}")]
    InvalidOpHz {
        /// The requested operating rate.
        hz: u32,
        /// Refresh rate of the current mode.
        vrefresh: u32,
    },

    /// Operating rate changes are not allowed while a VRR mode is active.
    #[error("cannot set op_hz while in VRR mode {0}")]
    OpHzInVrrMode(&'static str),

    /// The requested refresh rate is higher than the operating rate.
    #[error("vrefresh {vrefresh} exceeds op_hz {op_hz}")]
    VrefreshAboveOpHz {
        /// Refresh rate of the requested mode.
        vrefresh: u32,
        /// Current operating rate.
        op_hz: u32,
    },

    /// The mode changes the active area and needs a full modeset.
    #[error("mode {0} is not seamless from the current mode")]
    NotSeamless(&'static str),

    /// An operation needed a current mode but none has been set.
    #[error("no current mode set")]
    NoCurrentMode,

    /// A mode name did not match any mode the panel exposes.
    #[error("unknown mode {0}")]
    UnknownMode(String),

    /// No panel variant matches the compatible string.
    #[error("no panel variant matches compatible {0:?}")]
    UnknownCompatible(String),

    /// A DCS read returned fewer bytes than requested.
    #[error("short read of register {reg:#04x}: expected {expected} bytes, got {got}")]
    ShortRead {
        /// Register that was read.
        reg: u8,
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes returned.
        got: usize,
    },

    /// The backlight snapshot could not be read.
    #[error("brightness state unavailable")]
    ThermalUnavailable,

    /// The panel variant does not implement the operation.
    #[error("{0} is not supported by this panel")]
    NotSupported(&'static str),

    /// The panel rejected or could not register a resource.
    #[error("registration of {0} failed")]
    RegistrationFailed(&'static str),
}
