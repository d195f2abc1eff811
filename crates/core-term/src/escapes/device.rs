//! Device status and attribute reports.

use core_events::KeyReportingFlags;
use core_vt::{Csi, Dcs};

/// DSR 5 reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatingStatusReport {
    pub malfunction: bool,
}

impl OperatingStatusReport {
    pub fn serialize(&self) -> String {
        format!("\x1b[{}n", if self.malfunction { 3 } else { 0 })
    }

    pub fn from_csi(csi: &Csi) -> Option<OperatingStatusReport> {
        if !csi.intermediate.is_empty() || csi.terminator != 'n' || csi.params.len() != 1 {
            return None;
        }
        match csi.params.get(0, 0) {
            0 => Some(OperatingStatusReport { malfunction: false }),
            3 => Some(OperatingStatusReport { malfunction: true }),
            _ => None,
        }
    }
}

/// DSR 6 reply. Stored 0-indexed, 1-indexed on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorPositionReport {
    pub row: u32,
    pub col: u32,
}

impl CursorPositionReport {
    pub fn serialize(&self) -> String {
        format!("\x1b[{};{}R", self.row + 1, self.col + 1)
    }

    pub fn from_csi(csi: &Csi) -> Option<CursorPositionReport> {
        if !csi.intermediate.is_empty() || csi.terminator != 'R' || csi.params.len() != 2 {
            return None;
        }
        let row = csi.params.get(0, 0);
        let col = csi.params.get(1, 0);
        if row == 0 || col == 0 {
            return None;
        }
        Some(CursorPositionReport {
            row: row - 1,
            col: col - 1,
        })
    }
}

/// Kitty keyboard flag report: `CSI ? flags u`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KittyKeyReport {
    pub flags: KeyReportingFlags,
}

impl KittyKeyReport {
    pub fn serialize(&self) -> String {
        format!("\x1b[?{}u", self.flags.bits())
    }

    pub fn from_csi(csi: &Csi) -> Option<KittyKeyReport> {
        if csi.intermediate != "?" || csi.terminator != 'u' || csi.params.len() != 1 {
            return None;
        }
        let flags = KeyReportingFlags::from_bits(csi.params.get(0, 0))?;
        Some(KittyKeyReport { flags })
    }
}

/// DECRQSS reply: `DCS Ps $ r Pt ST`, with Ps=1 for a recognized request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusStringResponse {
    pub response: Option<String>,
}

impl StatusStringResponse {
    pub fn serialize(&self) -> String {
        format!(
            "\x1bP{}$r{}\x1b\\",
            u32::from(self.response.is_some()),
            self.response.as_deref().unwrap_or("")
        )
    }

    pub fn from_dcs(dcs: &Dcs) -> Option<StatusStringResponse> {
        if dcs.intermediate != "$r" || dcs.params.len() != 1 {
            return None;
        }
        match dcs.params.get(0, 0) {
            0 if dcs.data.is_empty() => Some(StatusStringResponse { response: None }),
            1 => Some(StatusStringResponse {
                response: Some(dcs.data.clone()),
            }),
            _ => None,
        }
    }
}

/// DA1 reply, treated as an opaque attribute list since the format varies
/// between terminals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryDeviceAttributes {
    pub attributes: Vec<u32>,
}

impl PrimaryDeviceAttributes {
    pub fn serialize(&self) -> String {
        let attributes = self
            .attributes
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(";");
        format!("\x1b[?{attributes}c")
    }

    pub fn from_csi(csi: &Csi) -> Option<PrimaryDeviceAttributes> {
        if csi.intermediate != "?" || csi.terminator != 'c' {
            return None;
        }
        let attributes = (0..csi.params.len())
            .map(|i| csi.params.get(i, 0))
            .collect();
        Some(PrimaryDeviceAttributes { attributes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vt::{EscapeSequenceParser, ParserEvent, ParserMode};
    use pretty_assertions::assert_eq;

    fn parse_one_csi(text: &str) -> Csi {
        let mut parser = EscapeSequenceParser::new(ParserMode::Application);
        let parsed = parser.parse(text);
        let [ParserEvent::Csi(csi)] = parsed.as_slice() else {
            panic!("expected one CSI in {text:?}");
        };
        csi.clone()
    }

    #[test]
    fn operating_status_round_trip() {
        for report in [
            OperatingStatusReport { malfunction: false },
            OperatingStatusReport { malfunction: true },
        ] {
            let csi = parse_one_csi(&report.serialize());
            assert_eq!(OperatingStatusReport::from_csi(&csi), Some(report));
        }
    }

    #[test]
    fn cursor_position_round_trip() {
        let report = CursorPositionReport { row: 4, col: 9 };
        assert_eq!(report.serialize(), "\x1b[5;10R");
        let csi = parse_one_csi(&report.serialize());
        assert_eq!(CursorPositionReport::from_csi(&csi), Some(report));
    }

    #[test]
    fn kitty_report_round_trip() {
        let report = KittyKeyReport {
            flags: KeyReportingFlags::DISAMBIGUATE | KeyReportingFlags::REPORT_EVENT_TYPES,
        };
        assert_eq!(report.serialize(), "\x1b[?3u");
        let csi = parse_one_csi(&report.serialize());
        assert_eq!(KittyKeyReport::from_csi(&csi), Some(report));
    }

    #[test]
    fn status_string_round_trip() {
        let mut parser = EscapeSequenceParser::new(ParserMode::Application);
        for response in [
            StatusStringResponse { response: None },
            StatusStringResponse {
                response: Some("0;1;3m".to_owned()),
            },
        ] {
            let parsed = parser.parse(&response.serialize());
            let Some(ParserEvent::Dcs(dcs)) = parsed.first() else {
                panic!("expected a DCS");
            };
            assert_eq!(StatusStringResponse::from_dcs(dcs), Some(response));
        }
    }

    #[test]
    fn device_attributes_round_trip() {
        let report = PrimaryDeviceAttributes {
            attributes: vec![1, 0],
        };
        assert_eq!(report.serialize(), "\x1b[?1;0c");
        let csi = parse_one_csi(&report.serialize());
        assert_eq!(PrimaryDeviceAttributes::from_csi(&csi), Some(report));
    }
}
