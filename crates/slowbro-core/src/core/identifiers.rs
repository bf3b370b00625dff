// crates/slowbro-core/src/core/identifiers.rs
// ============================================================================
// Module: Slowbro Identifiers
// Description: Typed names for database instances, parameter groups, and families.
// Purpose: Keep remote resource names validated at construction boundaries.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Identifiers wrap the opaque names used by the remote control plane.
//! Instance identifiers follow RDS naming rules; parameter group names are
//! only length-checked because vendor-default groups contain dots. Dedicated
//! group names are derived here so they always satisfy the stricter rules
//! the control plane applies to customer-created groups.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum length of a database instance identifier.
pub const MAX_INSTANCE_ID_LENGTH: usize = 63;
/// Maximum length of a parameter group name.
pub const MAX_PARAMETER_GROUP_NAME_LENGTH: usize = 255;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier was empty or whitespace.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// Identifier exceeded its length limit.
    #[error("{kind} exceeds {max} characters")]
    TooLong {
        /// Identifier kind label.
        kind: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// Identifier contained a disallowed character.
    #[error("{kind} contains invalid character {ch:?}")]
    InvalidCharacter {
        /// Identifier kind label.
        kind: &'static str,
        /// Offending character.
        ch: char,
    },
    /// Engine version had no usable leading segment.
    #[error("engine version {0:?} has no major version segment")]
    EngineVersion(String),
}

// ============================================================================
// SECTION: Instance Identifier
// ============================================================================

/// Database instance identifier.
///
/// # Invariants
/// - 1..=63 characters of ASCII letters, digits, and hyphens.
/// - Stored in ASCII lowercase; the remote service matches identifiers
///   case-insensitively, so `DB1` and `db1` name the same instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    /// Creates a validated instance identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the identifier violates naming rules.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty("instance identifier"));
        }
        if trimmed.len() > MAX_INSTANCE_ID_LENGTH {
            return Err(IdentifierError::TooLong {
                kind: "instance identifier",
                max: MAX_INSTANCE_ID_LENGTH,
            });
        }
        if let Some(ch) = trimmed.chars().find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-')) {
            return Err(IdentifierError::InvalidCharacter {
                kind: "instance identifier",
                ch,
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for InstanceId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceId> for String {
    fn from(value: InstanceId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Parameter Group Name
// ============================================================================

/// Parameter group name.
///
/// # Invariants
/// - 1..=255 characters with no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterGroupName(String);

impl ParameterGroupName {
    /// Creates a validated parameter group name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the name is empty, too long, or has whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self, IdentifierError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdentifierError::Empty("parameter group name"));
        }
        if name.len() > MAX_PARAMETER_GROUP_NAME_LENGTH {
            return Err(IdentifierError::TooLong {
                kind: "parameter group name",
                max: MAX_PARAMETER_GROUP_NAME_LENGTH,
            });
        }
        if let Some(ch) = name.chars().find(|ch| ch.is_whitespace()) {
            return Err(IdentifierError::InvalidCharacter {
                kind: "parameter group name",
                ch,
            });
        }
        Ok(Self(name))
    }

    /// Derives the dedicated group name for an instance and engine family.
    ///
    /// The result is `{prefix}-{instance}-{family}` lowercased, with every
    /// character outside `[a-z0-9]` replaced by a hyphen, hyphen runs
    /// collapsed, and no leading or trailing hyphen. Names that would not start
    /// with a letter are prefixed with `g`.
    #[must_use]
    pub fn dedicated(prefix: &str, instance: &InstanceId, family: &EngineFamily) -> Self {
        let raw = format!("{prefix}-{}-{}", instance.as_str(), family.as_str());
        let mut name = String::with_capacity(raw.len());
        for ch in raw.chars() {
            let mapped = if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' };
            if mapped == '-' && (name.is_empty() || name.ends_with('-')) {
                continue;
            }
            name.push(mapped);
        }
        if !name.starts_with(|ch: char| ch.is_ascii_lowercase()) {
            name.insert(0, 'g');
        }
        name.truncate(MAX_PARAMETER_GROUP_NAME_LENGTH);
        while name.ends_with('-') {
            name.pop();
        }
        Self(name)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterGroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for ParameterGroupName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParameterGroupName> for String {
    fn from(value: ParameterGroupName) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Engine Family
// ============================================================================

/// Parameter group family: engine name plus major.minor version.
///
/// # Invariants
/// - Built only through [`EngineFamily::derive`] or deserialization of a
///   previously derived value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineFamily(String);

impl EngineFamily {
    /// Derives the family from an engine name and full engine version.
    ///
    /// `mysql` + `5.7.34` yields `mysql5.7`; a single-segment version such as
    /// `16` yields `engine16`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the engine or version is empty.
    pub fn derive(engine: &str, engine_version: &str) -> Result<Self, IdentifierError> {
        let engine = engine.trim();
        if engine.is_empty() {
            return Err(IdentifierError::Empty("engine name"));
        }
        let mut segments = engine_version.trim().split('.').filter(|segment| !segment.is_empty());
        let Some(major) = segments.next() else {
            return Err(IdentifierError::EngineVersion(engine_version.to_string()));
        };
        let family = match segments.next() {
            Some(minor) => format!("{engine}{major}.{minor}"),
            None => format!("{engine}{major}"),
        };
        Ok(Self(family))
    }

    /// Returns the family as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
