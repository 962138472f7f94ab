// src/core/target.rs

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use strum::{Display, IntoStaticStr};

use crate::core::errors::ValidationError;

// Lexical shape checks only. Octets are not range checked, so
// "999.999.999.999" is accepted as IPv4.
static RE_IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").unwrap());
static RE_DOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\-\.]+\.[a-zA-Z]{2,}$").unwrap());

/// The lexical class of a user-supplied target string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum TargetKind {
    Ipv4,
    Domain,
    Invalid,
}

/// Classifies `input` without normalizing it.
///
/// The IPv4 pattern is checked first; the two patterns cannot both match
/// because a domain must end in at least two letters.
pub fn classify(input: &str) -> TargetKind {
    if RE_IPV4.is_match(input) {
        TargetKind::Ipv4
    } else if RE_DOMAIN.is_match(input) {
        TargetKind::Domain
    } else {
        TargetKind::Invalid
    }
}

/// A target that passed validation. Only values of this type reach the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    value: String,
    kind: TargetKind,
}

impl Target {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match classify(input) {
            TargetKind::Invalid => Err(ValidationError::InvalidTarget(input.to_string())),
            kind => Ok(Self { value: input.to_string(), kind }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn is_domain(&self) -> bool {
        self.kind == TargetKind::Domain
    }

    pub fn is_ipv4(&self) -> bool {
        self.kind == TargetKind::Ipv4
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_shapes_classify_as_ipv4() {
        for input in ["203.0.113.5", "0.0.0.0", "1.2.3.4", "999.999.999.999"] {
            assert_eq!(classify(input), TargetKind::Ipv4, "{input}");
        }
    }

    #[test]
    fn domain_shapes_classify_as_domain() {
        for input in ["example.com", "sub.example.co.uk", "my-host.io", "a.b.c.museum", "EXAMPLE.COM"] {
            assert_eq!(classify(input), TargetKind::Domain, "{input}");
        }
    }

    #[test]
    fn everything_else_is_invalid() {
        for input in [
            "",
            "not a target!!",
            "localhost",
            "1.2.3",
            "1.2.3.4.5",
            "1234.1.1.1",
            "example.c",
            "example.com/path",
            "http://example.com",
            "10.0.0.0/8",
            "example.com.",
            "ex ample.com",
            "1.2.3.4; rm -rf /",
        ] {
            assert_eq!(classify(input), TargetKind::Invalid, "{input:?}");
        }
    }

    #[test]
    fn parse_keeps_input_verbatim() {
        let target = Target::parse("Example.COM").unwrap();
        assert_eq!(target.as_str(), "Example.COM");
        assert!(target.is_domain());
        assert!(!target.is_ipv4());
    }

    #[test]
    fn parse_rejects_invalid_input() {
        let err = Target::parse("not a target!!").unwrap_err();
        assert_eq!(err, ValidationError::InvalidTarget("not a target!!".to_string()));
    }

    #[test]
    fn kind_renders_lowercase() {
        assert_eq!(TargetKind::Ipv4.to_string(), "ipv4");
        let name: &'static str = TargetKind::Domain.into();
        assert_eq!(name, "domain");
    }
}
