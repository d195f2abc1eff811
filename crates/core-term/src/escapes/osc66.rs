//! OSC 66 text sizing: `OSC 66 ; metadata ; text ST`.

use crate::cell::MultiCellInfo;

/// A parsed text-sizing request. The text is owned here; the screen decides
/// how to place it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Osc66 {
    pub info: MultiCellInfo,
    pub text: String,
}

impl Osc66 {
    pub const MAX_TEXT_SIZE: usize = 4096;

    /// Keys of the metadata section, with their permitted ranges.
    const KEYS: &'static [(&'static str, fn(&mut MultiCellInfo) -> &mut u8, u8, u8)] = &[
        ("s", |info| &mut info.scale, 1, 7),
        ("w", |info| &mut info.width, 0, 7),
        ("n", |info| &mut info.fractional_scale_numerator, 0, 15),
        ("d", |info| &mut info.fractional_scale_denominator, 0, 15),
        ("v", |info| &mut info.vertical_alignment, 0, 2),
        ("h", |info| &mut info.horizontal_alignment, 0, 2),
    ];

    /// Parse the payload after the `66;` prefix: `key=value:...;text`.
    pub fn parse(data: &str) -> Option<Osc66> {
        if data.is_empty() {
            return None;
        }
        let (metadata, text) = data.split_once(';')?;
        if text.is_empty() || text.len() > Self::MAX_TEXT_SIZE {
            return None;
        }

        let mut info = MultiCellInfo::default();
        if !metadata.is_empty() {
            for part in metadata.split(':') {
                let (key, value_text) = part.split_once('=')?;
                let value: u8 = value_text.parse().ok()?;
                let (_, accessor, min, max) =
                    Self::KEYS.iter().find(|(name, _, _, _)| *name == key)?;
                if value < *min || value > *max {
                    return None;
                }
                *accessor(&mut info) = value;
            }
        }
        if info.fractional_scale_denominator != 0
            && info.fractional_scale_denominator <= info.fractional_scale_numerator
        {
            return None;
        }
        Some(Osc66 {
            info,
            text: text.to_owned(),
        })
    }

    pub fn serialize(&self) -> String {
        let defaults = MultiCellInfo::default();
        let mut info = self.info;
        let mut reference = defaults;
        let metadata = Self::KEYS
            .iter()
            .filter_map(|(name, accessor, _, _)| {
                let value = *accessor(&mut info);
                let default = *accessor(&mut reference);
                (value != default).then(|| format!("{name}={value}"))
            })
            .collect::<Vec<_>>()
            .join(":");
        format!("\x1b]66;{};{}\x1b\\", metadata, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_scale_and_width() {
        let osc = Osc66::parse("s=2:w=3;big").unwrap();
        assert_eq!(osc.info.scale, 2);
        assert_eq!(osc.info.width, 3);
        assert_eq!(osc.text, "big");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(Osc66::parse(""), None);
        assert_eq!(Osc66::parse("s=2"), None); // no text section
        assert_eq!(Osc66::parse("s=0;x"), None); // below minimum
        assert_eq!(Osc66::parse("s=8;x"), None); // above maximum
        assert_eq!(Osc66::parse("q=1;x"), None); // unknown key
        // Denominator must exceed numerator.
        assert_eq!(Osc66::parse("n=3:d=2;x"), None);
        assert_eq!(Osc66::parse(";"), None); // empty text
    }

    #[test]
    fn fractional_scale_accepted() {
        let osc = Osc66::parse("n=1:d=2;half").unwrap();
        assert_eq!(osc.info.fractional_scale_numerator, 1);
        assert_eq!(osc.info.fractional_scale_denominator, 2);
    }

    #[test]
    fn serialize_round_trip() {
        for sample in ["s=2;x", "w=4;text", "s=3:w=2:v=1;abc", ";plain"] {
            let osc = Osc66::parse(sample).unwrap();
            let serialized = osc.serialize();
            let payload = serialized
                .strip_prefix("\x1b]66;")
                .unwrap()
                .strip_suffix("\x1b\\")
                .unwrap();
            assert_eq!(Osc66::parse(payload), Some(osc), "sample {sample}");
        }
    }
}
