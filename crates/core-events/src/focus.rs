//! Focus events and their codec (`CSI I` / `CSI O`).

use core_vt::Csi;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusEventMode {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusEvent {
    In,
    Out,
}

impl FocusEvent {
    pub fn is_focus_in(&self) -> bool {
        matches!(self, FocusEvent::In)
    }
}

/// Encode for a child terminal; `None` unless the child enabled focus
/// reporting.
pub fn serialize_focus_event(event: FocusEvent, mode: FocusEventMode) -> Option<String> {
    if mode == FocusEventMode::Disabled {
        return None;
    }
    Some(match event {
        FocusEvent::In => "\x1b[I".to_owned(),
        FocusEvent::Out => "\x1b[O".to_owned(),
    })
}

pub fn focus_event_from_csi(csi: &Csi) -> Option<FocusEvent> {
    if !csi.intermediate.is_empty() || !csi.params.is_empty() {
        return None;
    }
    match csi.terminator {
        'I' => Some(FocusEvent::In),
        'O' => Some(FocusEvent::Out),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vt::Params;

    #[test]
    fn codec_round_trip() {
        for event in [FocusEvent::In, FocusEvent::Out] {
            let encoded = serialize_focus_event(event, FocusEventMode::Enabled).unwrap();
            let mut parser = core_vt::EscapeSequenceParser::new(core_vt::ParserMode::Input);
            let parsed = parser.parse(&encoded);
            let [core_vt::ParserEvent::Csi(csi)] = parsed.as_slice() else {
                panic!("expected one CSI");
            };
            assert_eq!(focus_event_from_csi(csi), Some(event));
        }
    }

    #[test]
    fn disabled_mode_encodes_nothing() {
        assert_eq!(
            serialize_focus_event(FocusEvent::In, FocusEventMode::Disabled),
            None
        );
    }

    #[test]
    fn rejects_other_sequences() {
        let csi = Csi::new("", "1".parse::<Params>().unwrap(), 'I');
        assert_eq!(focus_event_from_csi(&csi), None);
    }
}
