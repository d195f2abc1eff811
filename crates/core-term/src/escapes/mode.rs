//! ANSI and DEC private modes, and DECRQM replies.

use core_vt::Csi;

/// ANSI modes. None are implemented; the type exists so DECRQM can answer
/// queries about them honestly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnsiMode {
    #[default]
    None,
}

/// DEC private modes the terminal knows about. Everything else is reported
/// as unknown to DECRQM and ignored by DECSET/DECRST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecMode {
    /// DECCKM: arrows report via SS3.
    CursorKeys = 1,
    /// DECCOLM: 80/132 column switch.
    Select80Or132Columns = 3,
    /// DECSCNM: reverse video.
    ReverseVideo = 5,
    /// DECOM: cursor confined to the scroll region.
    Origin = 6,
    /// DECAWM.
    AutoWrap = 7,
    /// X10 mouse protocol and encoding together.
    X10Mouse = 9,
    /// DECTCEM: cursor visibility.
    CursorEnable = 25,
    /// Gate for mode 3.
    Allow80Or132Columns = 40,
    VT200Mouse = 1000,
    CellMotionMouseTracking = 1002,
    AllMotionMouseTracking = 1003,
    FocusEvents = 1004,
    Utf8Mouse = 1005,
    SgrMouse = 1006,
    AlternateScroll = 1007,
    UrxvtMouse = 1015,
    SgrPixelMouse = 1016,
    AlternateScreenBuffer = 1049,
    BracketedPaste = 2004,
    SynchronizedOutput = 2026,
    /// Always on here; reported as such.
    GraphemeClustering = 2027,
    /// Not implemented; reported as unknown.
    ThemeDetection = 2031,
    InBandSizeReports = 2048,
}

impl DecMode {
    pub fn from_u32(value: u32) -> Option<DecMode> {
        Some(match value {
            1 => DecMode::CursorKeys,
            3 => DecMode::Select80Or132Columns,
            5 => DecMode::ReverseVideo,
            6 => DecMode::Origin,
            7 => DecMode::AutoWrap,
            9 => DecMode::X10Mouse,
            25 => DecMode::CursorEnable,
            40 => DecMode::Allow80Or132Columns,
            1000 => DecMode::VT200Mouse,
            1002 => DecMode::CellMotionMouseTracking,
            1003 => DecMode::AllMotionMouseTracking,
            1004 => DecMode::FocusEvents,
            1005 => DecMode::Utf8Mouse,
            1006 => DecMode::SgrMouse,
            1007 => DecMode::AlternateScroll,
            1015 => DecMode::UrxvtMouse,
            1016 => DecMode::SgrPixelMouse,
            1049 => DecMode::AlternateScreenBuffer,
            2004 => DecMode::BracketedPaste,
            2026 => DecMode::SynchronizedOutput,
            2027 => DecMode::GraphemeClustering,
            2031 => DecMode::ThemeDetection,
            2048 => DecMode::InBandSizeReports,
            _ => return None,
        })
    }
}

/// Support levels in a DECRQM reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeSupport {
    #[default]
    Unknown = 0,
    Set = 1,
    Unset = 2,
    AlwaysSet = 3,
    AlwaysUnset = 4,
}

impl ModeSupport {
    pub fn from_u32(value: u32) -> Option<ModeSupport> {
        Some(match value {
            0 => ModeSupport::Unknown,
            1 => ModeSupport::Set,
            2 => ModeSupport::Unset,
            3 => ModeSupport::AlwaysSet,
            4 => ModeSupport::AlwaysUnset,
            _ => return None,
        })
    }

    pub fn from_bool(set: bool) -> ModeSupport {
        if set {
            ModeSupport::Set
        } else {
            ModeSupport::Unset
        }
    }
}

/// A DECRQM reply: `CSI ? Pd ; Ps $ y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeQueryReply {
    pub mode: u32,
    pub support: ModeSupport,
}

impl ModeQueryReply {
    pub fn serialize(&self) -> String {
        format!("\x1b[?{};{}$y", self.mode, self.support as u32)
    }

    pub fn from_csi(csi: &Csi) -> Option<ModeQueryReply> {
        if csi.intermediate != "?$" || csi.terminator != 'y' {
            return None;
        }
        if csi.params.len() != 2 {
            return None;
        }
        Some(ModeQueryReply {
            mode: csi.params.get(0, 0),
            support: ModeSupport::from_u32(csi.params.get(1, 0))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reply_round_trip() {
        let reply = ModeQueryReply {
            mode: 2026,
            support: ModeSupport::Set,
        };
        let text = reply.serialize();
        assert_eq!(text, "\x1b[?2026;1$y");

        let mut parser = core_vt::EscapeSequenceParser::new(core_vt::ParserMode::Application);
        let parsed = parser.parse(&text);
        let [core_vt::ParserEvent::Csi(csi)] = parsed.as_slice() else {
            panic!("expected one CSI");
        };
        assert_eq!(ModeQueryReply::from_csi(csi), Some(reply));
    }

    #[test]
    fn mode_lookup() {
        assert_eq!(DecMode::from_u32(1049), Some(DecMode::AlternateScreenBuffer));
        assert_eq!(DecMode::from_u32(12345), None);
    }
}
