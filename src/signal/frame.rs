//! # Control frames.
//!
//! Every signal mutation travels as a single byte. Bytes outside the
//! vocabulary decode to `None` and are skipped by the reader.

/// One control-plane message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// BurnSignal became set.
    BurnSet,
    /// BurnSignal became clear.
    BurnClear,
    /// StopSignal became set (terminal).
    Stop,
}

impl ControlFrame {
    /// Wire byte for this frame.
    pub const fn as_byte(self) -> u8 {
        match self {
            ControlFrame::BurnSet => b'B',
            ControlFrame::BurnClear => b'b',
            ControlFrame::Stop => b'S',
        }
    }

    /// Decodes a wire byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'B' => Some(ControlFrame::BurnSet),
            b'b' => Some(ControlFrame::BurnClear),
            b'S' => Some(ControlFrame::Stop),
            _ => None,
        }
    }

    /// Short name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            ControlFrame::BurnSet => "burn-set",
            ControlFrame::BurnClear => "burn-clear",
            ControlFrame::Stop => "stop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burn_frames_are_case_distinct() {
        assert_eq!(ControlFrame::from_byte(b'B'), Some(ControlFrame::BurnSet));
        assert_eq!(ControlFrame::from_byte(b'b'), Some(ControlFrame::BurnClear));
    }

    #[test]
    fn stray_bytes_are_ignored() {
        for byte in [b'\n', b's', 0u8, 0xff] {
            assert_eq!(ControlFrame::from_byte(byte), None);
        }
    }
}
