// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::errors::TagResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentVersion(pub u32);

/// Handle to one version of a content item. The repository owns the item;
/// callers only borrow it for a read-modify-write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentRef {
    pub id: ContentId,
    pub version: ContentVersion,
}

impl ContentRef {
    pub fn new(id: ContentId, version: ContentVersion) -> Self {
        Self { id, version }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}.{}", self.id.0, self.version.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub reference: ContentRef,
    pub content_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Bumped by the repository on every save.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub published: bool,
}

impl ContentItem {
    pub fn new(
        reference: ContentRef,
        content_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            reference,
            content_type: content_type.into(),
            title: title.into(),
            fields: BTreeMap::new(),
            revision: 0,
            locked: false,
            published: false,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Publish,
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Skip access checks entirely. Used by administrative rewrites.
    NoAccess,
    Edit,
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn get(&self, reference: ContentRef) -> TagResult<ContentItem>;

    async fn save(
        &self,
        item: ContentItem,
        mode: SaveMode,
        access: AccessLevel,
    ) -> TagResult<ContentRef>;
}
