//! User and record identifiers.
//!
//! A user identifier reaches the core either as an opaque string (test and dev
//! identities, directory ids) or as the canonical 24-hex-character object id the
//! permanent log uses. [`UserId::parse`] decides once, at the boundary, which
//! form a string is in. The store only ever sees a `UserId`, and always persists
//! it as the pair returned by [`UserId::storage_key`], so a lookup can never use
//! a different representation from the write it is looking for.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::LifecycleError;

static OBJECT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("static pattern"));

/// 12-byte object id: 4-byte big-endian seconds timestamp + 8 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn new() -> Self {
        let secs = chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        let random = uuid::Uuid::new_v4();
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..].copy_from_slice(&random.as_bytes()[..8]);
        Self(bytes)
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        if !OBJECT_ID_PATTERN.is_match(s) {
            return None;
        }
        let decoded = hex::decode(s).ok()?;
        let bytes: [u8; 12] = decoded.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Fresh identifier for a temporary or permanent work record.
pub fn new_record_id() -> String {
    ObjectId::new().to_hex()
}

/// Opaque user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserId {
    /// Canonical object id form.
    Canonical(ObjectId),
    /// Any other non-empty string, kept verbatim (after trimming).
    Opaque(String),
}

impl UserId {
    pub const KIND_CANONICAL: &'static str = "oid";
    pub const KIND_OPAQUE: &'static str = "str";

    pub fn parse(raw: &str) -> Result<Self, LifecycleError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LifecycleError::Validation(
                "user id cannot be empty".to_string(),
            ));
        }
        Ok(match ObjectId::parse_str(trimmed) {
            Some(oid) => Self::Canonical(oid),
            None => Self::Opaque(trimmed.to_string()),
        })
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }

    /// `(kind, key)` pair persisted alongside every record that names a user.
    pub fn storage_key(&self) -> (&'static str, String) {
        match self {
            Self::Canonical(oid) => (Self::KIND_CANONICAL, oid.to_hex()),
            Self::Opaque(s) => (Self::KIND_OPAQUE, s.clone()),
        }
    }

    /// Rebuild a `UserId` from a persisted `(kind, key)` pair.
    pub fn from_storage(kind: &str, key: &str) -> anyhow::Result<Self> {
        match kind {
            Self::KIND_CANONICAL => ObjectId::parse_str(key)
                .map(Self::Canonical)
                .ok_or_else(|| anyhow::anyhow!("Invalid canonical user id in store: {}", key)),
            Self::KIND_OPAQUE => Ok(Self::Opaque(key.to_string())),
            other => anyhow::bail!("Unknown user id kind in store: {}", other),
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canonical(oid) => write!(f, "{}", oid),
            Self::Opaque(s) => f.write_str(s),
        }
    }
}

impl FromStr for UserId {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
