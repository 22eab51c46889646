// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagErrorKind {
    NotFound,
    Validation,
    Persistence,
    Locator,
}

#[derive(Debug, Clone)]
pub struct TagError {
    kind: TagErrorKind,
    message: String,
    conflict: bool,
}

impl TagError {
    pub fn new(kind: TagErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            conflict: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(TagErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(TagErrorKind::Validation, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(TagErrorKind::Persistence, message)
    }

    pub fn locator(message: impl Into<String>) -> Self {
        Self::new(TagErrorKind::Locator, message)
    }

    /// A persistence failure caused by a stale revision.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: TagErrorKind::Persistence,
            message: message.into(),
            conflict: true,
        }
    }

    pub fn kind(&self) -> TagErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_conflict(&self) -> bool {
        self.conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == TagErrorKind::NotFound
    }
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            TagErrorKind::NotFound => "not found",
            TagErrorKind::Validation => "validation error",
            TagErrorKind::Persistence if self.conflict => "conflict",
            TagErrorKind::Persistence => "persistence failure",
            TagErrorKind::Locator => "locator failure",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

impl Error for TagError {}

impl From<crate::content::flat_storage::SidecarError> for TagError {
    fn from(err: crate::content::flat_storage::SidecarError) -> Self {
        TagError::persistence(err.to_string())
    }
}

impl From<crate::tags::yaml_store::YamlStoreError> for TagError {
    fn from(err: crate::tags::yaml_store::YamlStoreError) -> Self {
        TagError::persistence(err.to_string())
    }
}

impl From<crate::config::ConfigError> for TagError {
    fn from(err: crate::config::ConfigError) -> Self {
        match err {
            crate::config::ConfigError::ValidationError(message) => TagError::validation(message),
            crate::config::ConfigError::LoadError(message) => TagError::persistence(message),
        }
    }
}

pub type TagResult<T> = Result<T, TagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_a_persistence_failure() {
        let err = TagError::conflict("revision 3 is stale");
        assert_eq!(err.kind(), TagErrorKind::Persistence);
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "conflict: revision 3 is stale");
    }

    #[test]
    fn display_includes_kind_label() {
        let err = TagError::not_found("Tag 'abc' not found");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: Tag 'abc' not found");
        assert!(!TagError::locator("index offline").is_conflict());
    }
}
