use crate::error::Error;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Reference identifier embedded in string slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rtid {
    Null,
    /// Format: first.middle.last@group, `last` rendered as 8 hex digits
    Uid {
        first: u32,
        middle: u32,
        last: u32,
        group: String,
    },
    /// Format: name@group
    Alias { name: String, group: String },
}

impl Rtid {
    /// Returns `None` for anything that is not a well-formed RTID, so callers
    /// can keep the text as a plain string.
    pub fn parse(text: &str) -> Option<Rtid> {
        text.parse().ok()
    }

    /// True when `text` renders back byte-for-byte from its parsed form.
    pub fn is_canonical(text: &str) -> bool {
        Rtid::parse(text).is_some_and(|rtid| rtid.to_string() == text)
    }
}

impl fmt::Display for Rtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rtid::Null => write!(f, "RTID(0)"),
            Rtid::Uid {
                first,
                middle,
                last,
                group,
            } => write!(f, "RTID({}.{}.{:08x}@{})", first, middle, last, group),
            Rtid::Alias { name, group } => write!(f, "RTID({}@{})", name, group),
        }
    }
}

impl FromStr for Rtid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Step 1: Match Outer Wrapper "RTID(...)"
        static OUTER_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
        let outer_re = OUTER_REGEX
            .get_or_init(|| Regex::new(r"^RTID\((.*)\)$"))
            .as_ref()
            .map_err(|e| Error::Regex(e.clone()))?;

        let inner = outer_re
            .captures(s)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| Error::NotRtid(s.to_string()))?
            .as_str();

        // Step 2: Analyze Content
        if inner == "0" {
            return Ok(Rtid::Null);
        }

        let (head, group) = inner
            .split_once('@')
            .ok_or_else(|| Error::NotRtid(s.to_string()))?;

        // Two dots in the head always means a uid, even if the fields are bad.
        if head.matches('.').count() == 2 {
            static UID_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
            let uid_re = UID_REGEX
                .get_or_init(|| Regex::new(r"^([0-9]+)\.([0-9]+)\.([0-9a-fA-F]{1,8})$"))
                .as_ref()
                .map_err(|e| Error::Regex(e.clone()))?;

            let caps = uid_re
                .captures(head)
                .ok_or_else(|| Error::InvalidRtid(format!("malformed uid fields in {}", s)))?;
            let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();

            return Ok(Rtid::Uid {
                first: field(1).parse::<u32>()?,
                middle: field(2).parse::<u32>()?,
                last: u32::from_str_radix(field(3), 16)?,
                group: group.to_string(),
            });
        }

        Ok(Rtid::Alias {
            name: head.to_string(),
            group: group.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_literal_forms_round_trip() {
        for text in ["RTID(0)", "RTID(1.2.0000002a@group)", "RTID(name@group)"] {
            let rtid = Rtid::parse(text).expect("should parse");
            assert_eq!(rtid.to_string(), text);
        }
    }

    #[test]
    fn test_variants() {
        assert_eq!(Rtid::parse("RTID(0)"), Some(Rtid::Null));
        assert_eq!(
            Rtid::parse("RTID(1.2.0000002a@group)"),
            Some(Rtid::Uid {
                first: 1,
                middle: 2,
                last: 0x2a,
                group: "group".into()
            })
        );
        assert_eq!(
            Rtid::parse("RTID(Peashooter@PlantTypes)"),
            Some(Rtid::Alias {
                name: "Peashooter".into(),
                group: "PlantTypes".into()
            })
        );
    }

    #[test]
    fn test_rejects_plain_strings() {
        for text in ["", "RTID", "RTID(abc)", "rtid(a@b)", "RTID(a@b", "xRTID(a@b)"] {
            assert_eq!(Rtid::parse(text), None, "{text:?}");
        }
        let err = "hello".parse::<Rtid>().unwrap_err();
        assert!(matches!(err, Error::NotRtid(_)));
    }

    #[test]
    fn test_bad_uid_fields_are_reference_errors() {
        let err = "RTID(99999999999.1.0000002a@g)".parse::<Rtid>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);

        let err = "RTID(a.b.c@g)".parse::<Rtid>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(Rtid::parse("RTID(a.b.c@g)"), None);
    }

    #[test]
    fn test_group_split_at_first_at() {
        assert_eq!(
            Rtid::parse("RTID(name@group@x)"),
            Some(Rtid::Alias {
                name: "name".into(),
                group: "group@x".into()
            })
        );
    }

    #[test]
    fn test_canonical() {
        assert!(Rtid::is_canonical("RTID(1.2.0000002a@g)"));
        assert!(!Rtid::is_canonical("RTID(1.2.2a@g)"));
        assert!(!Rtid::is_canonical("plain"));
    }
}
