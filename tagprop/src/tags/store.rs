// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::field::TAG_DELIMITER;
use super::model::{Tag, TagId, TagRecord};
use super::yaml_store;
use crate::config::DuplicateNamePolicy;
use crate::errors::{TagError, TagResult};
use async_trait::async_trait;
use log::{debug, error, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const TAGS_FILE_NAME: &str = "tags.yaml";
const MAX_TAG_NAME_CHARS: usize = 256;
const MAX_GROUP_KEY_CHARS: usize = 128;

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Every tag in the store's natural order. Callers sort.
    async fn list_all(&self) -> TagResult<Vec<Tag>>;

    async fn get_by_id(&self, id: &TagId) -> TagResult<Tag>;

    async fn find_by_name(&self, name: &str) -> TagResult<Option<Tag>>;

    async fn create(&self, name: &str, group_key: Option<&str>) -> TagResult<Tag>;

    /// Checks the store's naming rules for `tag` without writing it.
    async fn validate(&self, tag: &Tag) -> TagResult<()>;

    /// Upserts by identity. The tag's revision must match the stored one.
    async fn save(&self, tag: Tag) -> TagResult<Tag>;

    async fn delete(&self, tag: &Tag) -> TagResult<()>;
}

/// Tag records kept in `state/sys/tags.yaml`, keyed by tag id.
pub struct YamlTagStore {
    tags_file: PathBuf,
    duplicate_names: DuplicateNamePolicy,
    tags: RwLock<BTreeMap<TagId, TagRecord>>,
}

impl YamlTagStore {
    pub fn open(state_sys_dir: &Path, duplicate_names: DuplicateNamePolicy) -> TagResult<Self> {
        let tags_file = state_sys_dir.join(TAGS_FILE_NAME);
        let tags = Self::load_from_disk(&tags_file)?;
        debug!("Loaded {} tags from {}", tags.len(), tags_file.display());
        Ok(Self {
            tags_file,
            duplicate_names,
            tags: RwLock::new(tags),
        })
    }

    pub fn tags_file(&self) -> &Path {
        &self.tags_file
    }

    fn load_from_disk(tags_file: &Path) -> TagResult<BTreeMap<TagId, TagRecord>> {
        let raw: Option<BTreeMap<TagId, TagRecord>> =
            yaml_store::read_yaml_file(tags_file, "tags")?;
        let raw = raw.unwrap_or_default();
        for (id, record) in &raw {
            validate_tag_name(&record.name).map_err(|err| {
                TagError::persistence(format!("Stored tag '{}' is invalid: {}", id, err.message()))
            })?;
        }
        Ok(raw)
    }

    fn snapshot(&self) -> TagResult<BTreeMap<TagId, TagRecord>> {
        self.tags.read().map(|guard| guard.clone()).map_err(|_| {
            error!("Tag store lock poisoned");
            TagError::persistence("Tag store lock poisoned")
        })
    }

    fn check_duplicate_name(
        &self,
        tags: &BTreeMap<TagId, TagRecord>,
        id: &TagId,
        name: &str,
        group_key: Option<&str>,
    ) -> TagResult<()> {
        let duplicate = tags.iter().find(|(other_id, record)| {
            *other_id != id && record.name == name && record.group_key.as_deref() == group_key
        });
        let Some((other_id, _)) = duplicate else {
            return Ok(());
        };
        match self.duplicate_names {
            DuplicateNamePolicy::Allow => {
                warn!(
                    "Tag '{}' shares the name '{}' with tag '{}' in group {:?}",
                    id, name, other_id, group_key
                );
                Ok(())
            }
            DuplicateNamePolicy::Reject => Err(TagError::validation(format!(
                "Tag name '{}' is already used by tag '{}'",
                name, other_id
            ))),
        }
    }

    /// Compare-and-swap write of one record. Runs entirely under the write
    /// guard so two writers holding the same revision cannot both succeed.
    fn commit(&self, tag: Tag, must_be_new: bool) -> TagResult<Tag> {
        validate_tag_name(tag.name())?;
        let group_key = normalize_group_key(tag.group_key())?;

        let mut guard = self.tags.write().map_err(|_| {
            error!("Tag store lock poisoned");
            TagError::persistence("Tag store lock poisoned")
        })?;
        let stored_revision = guard.get(tag.id()).map(|record| record.revision);
        match stored_revision {
            Some(_) if must_be_new => {
                return Err(TagError::conflict(format!(
                    "Tag id '{}' already exists",
                    tag.id()
                )));
            }
            Some(revision) if revision != tag.revision() => {
                return Err(TagError::conflict(format!(
                    "Tag '{}' changed since it was read (revision {} != {})",
                    tag.id(),
                    revision,
                    tag.revision()
                )));
            }
            None if tag.revision() != 0 => {
                return Err(TagError::not_found(format!("Tag '{}' not found", tag.id())));
            }
            _ => {}
        }
        self.check_duplicate_name(&guard, tag.id(), tag.name(), group_key.as_deref())?;

        let record = TagRecord {
            name: tag.name().to_string(),
            group_key,
            revision: tag.revision() + 1,
        };
        let mut next = guard.clone();
        next.insert(tag.id().clone(), record.clone());
        yaml_store::write_yaml_file(&self.tags_file, "tags", &next)?;
        *guard = next;
        Ok(record.into_tag(tag.id().clone()))
    }
}

#[async_trait]
impl TagStore for YamlTagStore {
    async fn list_all(&self) -> TagResult<Vec<Tag>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .map(|(id, record)| record.into_tag(id))
            .collect())
    }

    async fn get_by_id(&self, id: &TagId) -> TagResult<Tag> {
        let tags = self.tags.read().map_err(|_| {
            error!("Tag store lock poisoned");
            TagError::persistence("Tag store lock poisoned")
        })?;
        tags.get(id)
            .cloned()
            .map(|record| record.into_tag(id.clone()))
            .ok_or_else(|| TagError::not_found(format!("Tag '{}' not found", id)))
    }

    async fn find_by_name(&self, name: &str) -> TagResult<Option<Tag>> {
        let tags = self.tags.read().map_err(|_| {
            error!("Tag store lock poisoned");
            TagError::persistence("Tag store lock poisoned")
        })?;
        Ok(tags
            .iter()
            .find(|(_, record)| record.name == name)
            .map(|(id, record)| record.clone().into_tag(id.clone())))
    }

    async fn create(&self, name: &str, group_key: Option<&str>) -> TagResult<Tag> {
        let tag = Tag::from_parts(
            TagId::generate(),
            name.to_string(),
            group_key.map(str::to_string),
            0,
        );
        self.commit(tag, true)
    }

    async fn validate(&self, tag: &Tag) -> TagResult<()> {
        validate_tag_name(tag.name())?;
        let group_key = normalize_group_key(tag.group_key())?;
        let tags = self.tags.read().map_err(|_| {
            error!("Tag store lock poisoned");
            TagError::persistence("Tag store lock poisoned")
        })?;
        self.check_duplicate_name(&tags, tag.id(), tag.name(), group_key.as_deref())
    }

    async fn save(&self, tag: Tag) -> TagResult<Tag> {
        self.commit(tag, false)
    }

    async fn delete(&self, tag: &Tag) -> TagResult<()> {
        let mut guard = self.tags.write().map_err(|_| {
            error!("Tag store lock poisoned");
            TagError::persistence("Tag store lock poisoned")
        })?;
        if !guard.contains_key(tag.id()) {
            return Err(TagError::not_found(format!("Tag '{}' not found", tag.id())));
        }
        let mut next = guard.clone();
        next.remove(tag.id());
        yaml_store::write_yaml_file(&self.tags_file, "tags", &next)?;
        *guard = next;
        Ok(())
    }
}

pub(crate) fn validate_tag_name(name: &str) -> TagResult<()> {
    if name.is_empty() {
        return Err(TagError::validation("Tag name is required"));
    }
    if name.contains(TAG_DELIMITER) {
        return Err(TagError::validation(format!(
            "Tag name must not contain '{}'",
            TAG_DELIMITER
        )));
    }
    if name.chars().count() > MAX_TAG_NAME_CHARS {
        return Err(TagError::validation(format!(
            "Tag name must be at most {} characters",
            MAX_TAG_NAME_CHARS
        )));
    }
    Ok(())
}

fn normalize_group_key(group_key: Option<&str>) -> TagResult<Option<String>> {
    let Some(group_key) = group_key.map(str::trim).filter(|key| !key.is_empty()) else {
        return Ok(None);
    };
    if group_key.chars().count() > MAX_GROUP_KEY_CHARS {
        return Err(TagError::validation(format!(
            "Group key must be at most {} characters",
            MAX_GROUP_KEY_CHARS
        )));
    }
    Ok(Some(group_key.to_string()))
}
