// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque tag identity assigned by the tag store. Never changes once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    id: TagId,
    name: String,
    group_key: Option<String>,
    revision: u64,
}

impl Tag {
    pub(crate) fn from_parts(
        id: TagId,
        name: String,
        group_key: Option<String>,
        revision: u64,
    ) -> Self {
        Self {
            id,
            name,
            group_key,
            revision,
        }
    }

    pub fn id(&self) -> &TagId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_key(&self) -> Option<&str> {
        self.group_key.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// A copy carrying the update. Identity and revision are kept so the
    /// store can compare-and-swap on save.
    pub fn renamed(&self, update: &TagUpdate) -> Self {
        Self {
            id: self.id.clone(),
            name: update.name.clone(),
            group_key: update.group_key.clone(),
            revision: self.revision,
        }
    }
}

/// Requested name and group for an existing tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUpdate {
    pub name: String,
    pub group_key: Option<String>,
}

impl TagUpdate {
    pub fn new(name: impl Into<String>, group_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            group_key,
        }
    }
}

/// On-disk shape of one entry in `tags.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TagRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    #[serde(default)]
    pub revision: u64,
}

impl TagRecord {
    pub fn into_tag(self, id: TagId) -> Tag {
        Tag::from_parts(id, self.name, self.group_key, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renamed_keeps_identity_and_revision() {
        let tag = Tag::from_parts(TagId::new("t1"), "Sale".to_string(), None, 4);
        let renamed = tag.renamed(&TagUpdate::new("Clearance", Some("promo".to_string())));
        assert_eq!(renamed.id(), tag.id());
        assert_eq!(renamed.revision(), 4);
        assert_eq!(renamed.name(), "Clearance");
        assert_eq!(renamed.group_key(), Some("promo"));
        assert_eq!(tag.name(), "Sale");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TagId::generate(), TagId::generate());
    }
}
