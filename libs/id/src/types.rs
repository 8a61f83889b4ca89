//! Typed ID definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::IdError;

/// Number of leading characters shown by [`ContainerId::short`].
pub const SHORT_ID_LEN: usize = 12;

// =============================================================================
// Container ID
// =============================================================================

/// Opaque, runtime-assigned container identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    /// Parses an ID from a string.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        if let Some((offset, found)) = s
            .char_indices()
            .find(|(_, c)| c.is_whitespace() || *c == '/')
        {
            return Err(IdError::InvalidCharacter { found, offset });
        }

        Ok(Self(s.to_string()))
    }

    /// Returns the full ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the abbreviated form used in log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_ID_LEN) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContainerId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ContainerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContainerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DOCKER_ID: &str = "4f66ad9a0b2e5c8c0a8e3a2b7e0f5d1c9a3b6e2d4f8a1c7b5e9d3a6f2c8b4e1d";

    #[test]
    fn test_container_id_parse() {
        let id: ContainerId = DOCKER_ID.parse().unwrap();
        assert_eq!(id.as_str(), DOCKER_ID);
        assert_eq!(id.to_string(), DOCKER_ID);
    }

    #[test]
    fn test_container_id_empty() {
        let result: Result<ContainerId, _> = "".parse();
        assert!(result.unwrap_err().is_empty());
    }

    #[test]
    fn test_container_id_rejects_whitespace() {
        let result = ContainerId::parse("abc def");
        assert_eq!(
            result.unwrap_err(),
            IdError::InvalidCharacter {
                found: ' ',
                offset: 3
            }
        );
    }

    #[test]
    fn test_container_id_rejects_slash() {
        assert!(ContainerId::parse("/web").is_err());
    }

    #[test]
    fn test_container_id_short() {
        let id = ContainerId::parse(DOCKER_ID).unwrap();
        assert_eq!(id.short(), "4f66ad9a0b2e");

        let id = ContainerId::parse("c1").unwrap();
        assert_eq!(id.short(), "c1");
    }

    #[test]
    fn test_container_id_json_roundtrip() {
        let id = ContainerId::parse(DOCKER_ID).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{DOCKER_ID}\""));
        let parsed: ContainerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_container_id_json_rejects_empty() {
        let result: Result<ContainerId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_hex_ids_parse(s in "[0-9a-f]{1,64}") {
            let id = ContainerId::parse(&s).unwrap();
            prop_assert_eq!(id.as_str(), s.as_str());
            prop_assert!(id.short().len() <= SHORT_ID_LEN);
        }
    }
}
