//! OSC 8 hyperlinks: `OSC 8 ; params ; URI ST`.

use std::collections::BTreeMap;

use crate::cell::Hyperlink;

/// A parsed OSC 8 payload. An empty URI closes the current hyperlink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Osc8 {
    pub params: BTreeMap<String, String>,
    pub uri: String,
}

impl Osc8 {
    /// Parse the payload after the `8;` prefix has been stripped, i.e.
    /// `params;uri`.
    pub fn parse(data: &str) -> Option<Osc8> {
        let (params_text, uri) = data.split_once(';')?;
        if params_text.is_empty() && uri.is_empty() {
            return Some(Osc8::default());
        }
        if uri.len() > Hyperlink::MAX_URI_LENGTH {
            return None;
        }

        let mut params = BTreeMap::new();
        if !params_text.is_empty() {
            for pair in params_text.split(':') {
                match pair.split_once('=') {
                    Some((key, value)) => params.insert(key.to_owned(), value.to_owned()),
                    None => params.insert(pair.to_owned(), String::new()),
                };
            }
        }
        Some(Osc8 {
            params,
            uri: uri.to_owned(),
        })
    }

    pub fn from_hyperlink(hyperlink: Option<&Hyperlink>) -> Osc8 {
        let Some(hyperlink) = hyperlink else {
            return Osc8::default();
        };
        let mut params = BTreeMap::new();
        params.insert("id".to_owned(), hyperlink.id.clone());
        Osc8 {
            params,
            uri: hyperlink.uri.clone(),
        }
    }

    pub fn serialize(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(":");
        format!("\x1b]8;{};{}\x1b\\", params, self.uri)
    }

    /// Convert to a hyperlink, generating an id when none was provided.
    /// Over-long ids are truncated to a character boundary.
    pub fn to_hyperlink(&self, make_id: impl FnOnce(Option<&str>) -> String) -> Option<Hyperlink> {
        if self.uri.is_empty() {
            return None;
        }
        let id = self.params.get("id").map(|id| {
            if id.len() >= Hyperlink::MAX_ID_LENGTH {
                let mut end = Hyperlink::MAX_ID_LENGTH;
                while !id.is_char_boundary(end) {
                    end -= 1;
                }
                &id[..end]
            } else {
                id.as_str()
            }
        });
        Some(Hyperlink {
            uri: self.uri.clone(),
            id: make_id(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_with_id() {
        let osc = Osc8::parse("id=foo;http://example.com").unwrap();
        assert_eq!(osc.params.get("id").map(String::as_str), Some("foo"));
        assert_eq!(osc.uri, "http://example.com");
    }

    #[test]
    fn parse_reset() {
        let osc = Osc8::parse(";").unwrap();
        assert_eq!(osc, Osc8::default());
        assert!(osc.to_hyperlink(|_| unreachable!()).is_none());
    }

    #[test]
    fn parse_rejects_missing_separator_and_long_uri() {
        assert_eq!(Osc8::parse("no-separator"), None);
        let long = format!("; {}", "x".repeat(Hyperlink::MAX_URI_LENGTH + 1));
        assert_eq!(Osc8::parse(&long), None);
    }

    #[test]
    fn serialize_round_trip() {
        let hyperlink = Hyperlink {
            uri: "https://example.com/a".to_owned(),
            id: "link-1".to_owned(),
        };
        let osc = Osc8::from_hyperlink(Some(&hyperlink));
        let serialized = osc.serialize();
        assert_eq!(serialized, "\x1b]8;id=link-1;https://example.com/a\x1b\\");

        let payload = serialized
            .strip_prefix("\x1b]8;")
            .unwrap()
            .strip_suffix("\x1b\\")
            .unwrap();
        let reparsed = Osc8::parse(payload).unwrap();
        assert_eq!(reparsed, osc);
        let round = reparsed.to_hyperlink(|id| id.unwrap().to_owned()).unwrap();
        assert_eq!(round, hyperlink);
    }

    #[test]
    fn generated_id_when_absent() {
        let osc = Osc8::parse(";http://x").unwrap();
        let hyperlink = osc.to_hyperlink(|id| {
            assert!(id.is_none());
            "generated-1".to_owned()
        });
        assert_eq!(hyperlink.unwrap().id, "generated-1");
    }
}
