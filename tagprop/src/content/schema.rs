// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::ValidatedConfig;
use std::collections::BTreeMap;

/// One tag-bearing field. A field with a group key only holds tags of that
/// group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagField {
    pub name: String,
    pub group_key: Option<String>,
}

impl TagField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_key: None,
        }
    }

    pub fn grouped(name: impl Into<String>, group_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_key: Some(group_key.into()),
        }
    }

    /// Ungrouped fields accept every tag.
    pub fn accepts_group(&self, group_key: Option<&str>) -> bool {
        match self.group_key.as_deref() {
            None => true,
            Some(own) => group_key == Some(own),
        }
    }
}

/// Tag-bearing fields per content type, declared in configuration.
#[derive(Debug, Clone, Default)]
pub struct TagFieldRegistry {
    fields: BTreeMap<String, Vec<TagField>>,
}

impl TagFieldRegistry {
    pub fn new(fields: BTreeMap<String, Vec<TagField>>) -> Self {
        Self { fields }
    }

    pub fn from_config(config: &ValidatedConfig) -> Self {
        let fields = config
            .content_types
            .iter()
            .map(|(content_type, declared)| {
                let tag_fields = declared
                    .tag_fields
                    .iter()
                    .map(|field| TagField {
                        name: field.name().to_string(),
                        group_key: field.group().map(str::to_string),
                    })
                    .collect();
                (content_type.clone(), tag_fields)
            })
            .collect();
        Self { fields }
    }

    /// Unknown content types have no tag fields.
    pub fn fields_for(&self, content_type: &str) -> &[TagField] {
        self.fields
            .get(content_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The group key declared on a field, if the field is a tag field and
    /// declares one.
    pub fn group_for(&self, content_type: &str, field: &str) -> Option<&str> {
        self.fields_for(content_type)
            .iter()
            .find(|declared| declared.name == field)
            .and_then(|declared| declared.group_key.as_deref())
    }

    pub fn is_known_type(&self, content_type: &str) -> bool {
        self.fields.contains_key(content_type)
    }

    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
