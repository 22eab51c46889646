// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::repository::{
    AccessLevel, ContentId, ContentItem, ContentRef, ContentRepository, ContentVersion, SaveMode,
};
use crate::errors::{TagError, TagResult};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub enum SidecarError {
    Io(std::io::Error),
    Ron(ron::error::SpannedError),
    MissingContentType,
    EmptyFieldName,
    ReferenceMismatch { expected: ContentRef, found: ContentRef },
}

impl fmt::Display for SidecarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SidecarError::Io(err) => write!(f, "content record I/O failed: {}", err),
            SidecarError::Ron(err) => write!(f, "content record parse failed: {}", err),
            SidecarError::MissingContentType => write!(f, "content record missing content type"),
            SidecarError::EmptyFieldName => write!(f, "content record has an empty field name"),
            SidecarError::ReferenceMismatch { expected, found } => write!(
                f,
                "content record {} is stored under {}",
                found, expected
            ),
        }
    }
}

impl std::error::Error for SidecarError {}

impl From<std::io::Error> for SidecarError {
    fn from(err: std::io::Error) -> Self {
        SidecarError::Io(err)
    }
}

impl From<ron::error::Error> for SidecarError {
    fn from(err: ron::error::Error) -> Self {
        SidecarError::Ron(ron::error::SpannedError {
            code: err,
            position: ron::error::Position { line: 0, col: 0 },
        })
    }
}

impl From<ron::error::SpannedError> for SidecarError {
    fn from(err: ron::error::SpannedError) -> Self {
        SidecarError::Ron(err)
    }
}

impl SidecarError {
    fn is_missing(&self) -> bool {
        matches!(self, SidecarError::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

pub fn content_id_hex(id: ContentId) -> String {
    format!("{:016x}", id.0)
}

pub fn parse_content_id_hex(raw: &str) -> Result<ContentId, String> {
    let trimmed = raw.trim();
    if trimmed.len() != 16 {
        return Err("content id must be 16 hex chars".to_string());
    }
    if !trimmed.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err("content id must be hex".to_string());
    }
    let value =
        u64::from_str_radix(trimmed, 16).map_err(|_| "content id parse failed".to_string())?;
    Ok(ContentId(value))
}

pub fn content_shard(id: ContentId) -> String {
    format!("{:02x}", (id.0 & 0xff) as u8)
}

pub fn record_path(content_root: &Path, reference: ContentRef) -> PathBuf {
    let shard = content_shard(reference.id);
    let filename = format!(
        "{}.{}.ron",
        content_id_hex(reference.id),
        reference.version.0
    );
    content_root.join(shard).join(filename)
}

pub fn read_record(path: &Path) -> Result<ContentItem, SidecarError> {
    let raw = fs::read_to_string(path)?;
    let item: ContentItem = ron::from_str(&raw)?;
    validate_record(&item)?;
    Ok(item)
}

pub fn write_record_atomic(path: &Path, item: &ContentItem) -> Result<(), SidecarError> {
    validate_record(item)?;
    let parent = path.parent().ok_or_else(|| {
        SidecarError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "content record path has no parent",
        ))
    })?;
    fs::create_dir_all(parent)?;

    let content = ron::ser::to_string_pretty(
        item,
        ron::ser::PrettyConfig::new().separate_tuple_members(true),
    )
    .map_err(SidecarError::from)?;

    let mut temp_path = path.to_path_buf();
    let temp_name = match path.file_name() {
        Some(name) => format!(".{}.tmp", name.to_string_lossy()),
        None => ".record.tmp".to_string(),
    };
    temp_path.set_file_name(temp_name);

    fs::write(&temp_path, content)?;
    fs::rename(temp_path, path)?;
    Ok(())
}

pub fn validate_record(item: &ContentItem) -> Result<(), SidecarError> {
    if item.content_type.trim().is_empty() {
        return Err(SidecarError::MissingContentType);
    }
    if item.fields.keys().any(|name| name.trim().is_empty()) {
        return Err(SidecarError::EmptyFieldName);
    }
    Ok(())
}

pub fn generate_content_id() -> ContentId {
    let (high, _) = uuid::Uuid::new_v4().as_u64_pair();
    ContentId(high)
}

fn parse_record_filename(filename: &str) -> Option<ContentRef> {
    let trimmed = filename.strip_suffix(".ron")?;
    let mut parts = trimmed.split('.');
    let id_part = parts.next()?;
    let version_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let id = parse_content_id_hex(id_part).ok()?;
    let version = version_part.parse::<u32>().ok()?;
    Some(ContentRef::new(id, ContentVersion(version)))
}

fn is_shard_dir(name: &str) -> bool {
    name.len() == 2 && name.chars().all(|c| c.is_ascii_hexdigit()) && name == name.to_lowercase()
}

/// Content repository backed by one RON record per item version under
/// `content/<shard>/<id>.<version>.ron`.
pub struct FlatContentStore {
    content_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FlatContentStore {
    pub fn new(content_dir: PathBuf) -> Self {
        Self {
            content_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Creates a brand new item at version 0 and returns it as stored.
    pub fn create(
        &self,
        content_type: &str,
        title: &str,
        fields: impl IntoIterator<Item = (String, String)>,
    ) -> TagResult<ContentItem> {
        let reference = ContentRef::new(generate_content_id(), ContentVersion(0));
        let mut item = ContentItem::new(reference, content_type, title);
        item.fields.extend(fields);
        self.save_blocking(item, SaveMode::Draft, AccessLevel::Edit)?;
        self.load(reference)
    }

    pub fn load(&self, reference: ContentRef) -> TagResult<ContentItem> {
        let path = record_path(&self.content_dir, reference);
        let item = read_record(&path).map_err(|err| {
            if err.is_missing() {
                TagError::not_found(format!("Content {} not found", reference))
            } else {
                TagError::persistence(format!("Failed to read {}: {}", path.display(), err))
            }
        })?;
        if item.reference != reference {
            return Err(TagError::persistence(
                SidecarError::ReferenceMismatch {
                    expected: reference,
                    found: item.reference,
                }
                .to_string(),
            ));
        }
        Ok(item)
    }

    /// Latest stored version of one item.
    pub fn latest(&self, id: ContentId) -> TagResult<ContentItem> {
        let shard_dir = self.content_dir.join(content_shard(id));
        let entries = match fs::read_dir(&shard_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TagError::not_found(format!(
                    "Content {} not found",
                    content_id_hex(id)
                )));
            }
            Err(err) => return Err(TagError::persistence(err.to_string())),
        };
        let mut latest: Option<ContentRef> = None;
        for entry in entries {
            let entry = entry.map_err(|err| TagError::persistence(err.to_string()))?;
            let name = entry.file_name();
            let Some(reference) = parse_record_filename(&name.to_string_lossy()) else {
                continue;
            };
            if reference.id != id {
                continue;
            }
            if latest.is_none_or(|current| reference.version > current.version) {
                latest = Some(reference);
            }
        }
        match latest {
            Some(reference) => self.load(reference),
            None => Err(TagError::not_found(format!(
                "Content {} not found",
                content_id_hex(id)
            ))),
        }
    }

    /// Latest version of every item in the store. Unreadable records are
    /// logged and skipped.
    pub fn scan(&self) -> TagResult<Vec<ContentItem>> {
        let mut latest_by_id: HashMap<ContentId, ContentRef> = HashMap::new();
        let shards = fs::read_dir(&self.content_dir).map_err(|err| {
            TagError::persistence(format!(
                "Failed to read content directory {}: {}",
                self.content_dir.display(),
                err
            ))
        })?;

        for shard in shards {
            let shard = shard.map_err(|err| TagError::persistence(err.to_string()))?;
            let shard_name = shard.file_name();
            let shard_name = shard_name.to_string_lossy();
            if !is_shard_dir(&shard_name) || !shard.path().is_dir() {
                continue;
            }
            let entries = fs::read_dir(shard.path())
                .map_err(|err| TagError::persistence(err.to_string()))?;
            for entry in entries {
                let entry = entry.map_err(|err| TagError::persistence(err.to_string()))?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') || !name.ends_with(".ron") {
                    continue;
                }
                let reference = match parse_record_filename(&name) {
                    Some(reference) => reference,
                    None => {
                        warn!(
                            "Skipping unrecognized content record: {}",
                            entry.path().display()
                        );
                        continue;
                    }
                };
                if content_shard(reference.id) != shard_name {
                    warn!(
                        "Content record {} is in shard '{}' but expected '{}'",
                        entry.path().display(),
                        shard_name,
                        content_shard(reference.id)
                    );
                    continue;
                }
                let replace = match latest_by_id.get(&reference.id) {
                    Some(existing) => reference.version > existing.version,
                    None => true,
                };
                if replace {
                    latest_by_id.insert(reference.id, reference);
                }
            }
        }

        let mut references: Vec<ContentRef> = latest_by_id.into_values().collect();
        references.sort();
        let mut items = Vec::with_capacity(references.len());
        for reference in references {
            match self.load(reference) {
                Ok(item) => items.push(item),
                Err(err) => warn!("Skipping content {}: {}", reference, err),
            }
        }
        Ok(items)
    }

    fn save_blocking(
        &self,
        item: ContentItem,
        mode: SaveMode,
        access: AccessLevel,
    ) -> TagResult<ContentRef> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| TagError::persistence("Content store lock poisoned"))?;
        let reference = item.reference;
        let path = record_path(&self.content_dir, reference);

        match read_record(&path) {
            Ok(existing) => {
                if existing.locked && access != AccessLevel::NoAccess {
                    return Err(TagError::persistence(format!(
                        "Content {} is locked for editing",
                        reference
                    )));
                }
                if existing.revision != item.revision {
                    return Err(TagError::conflict(format!(
                        "Content {} changed since it was read (revision {} != {})",
                        reference, existing.revision, item.revision
                    )));
                }
            }
            Err(err) if err.is_missing() => {
                if item.revision != 0 {
                    return Err(TagError::not_found(format!(
                        "Content {} not found",
                        reference
                    )));
                }
            }
            Err(err) => {
                return Err(TagError::persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    err
                )));
            }
        }

        let mut stored = item;
        stored.revision += 1;
        stored.published = mode == SaveMode::Publish;
        write_record_atomic(&path, &stored).map_err(|err| {
            TagError::persistence(format!("Failed to write {}: {}", path.display(), err))
        })?;
        debug!(
            "Saved content {} at revision {} ({:?})",
            reference, stored.revision, mode
        );
        Ok(reference)
    }
}

#[async_trait]
impl ContentRepository for FlatContentStore {
    async fn get(&self, reference: ContentRef) -> TagResult<ContentItem> {
        self.load(reference)
    }

    async fn save(
        &self,
        item: ContentItem,
        mode: SaveMode,
        access: AccessLevel,
    ) -> TagResult<ContentRef> {
        self.save_blocking(item, mode, access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TagErrorKind;
    use crate::util::test_fixtures::TestFixtureRoot;

    fn store(fixture: &TestFixtureRoot) -> FlatContentStore {
        fixture.init_runtime_layout().unwrap();
        FlatContentStore::new(fixture.content_dir())
    }

    #[test]
    fn record_paths_use_single_shard() {
        let content_root = PathBuf::from("/content");
        let reference = ContentRef::new(ContentId(0x1122334455667788), ContentVersion(3));
        assert_eq!(
            record_path(&content_root, reference),
            PathBuf::from("/content/88/1122334455667788.3.ron")
        );
    }

    #[test]
    fn record_filename_roundtrip() {
        let reference = ContentRef::new(ContentId(0xabc), ContentVersion(2));
        let path = record_path(Path::new("/c"), reference);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(parse_record_filename(&name), Some(reference));
        assert_eq!(parse_record_filename("0000000000000abc.ron"), None);
        assert_eq!(parse_record_filename("nothex0000000abc.1.ron"), None);
    }

    #[test]
    fn record_requires_content_type() {
        let item = ContentItem::new(ContentRef::new(ContentId(1), ContentVersion(0)), " ", "x");
        assert!(matches!(
            validate_record(&item),
            Err(SidecarError::MissingContentType)
        ));
    }

    #[tokio::test]
    async fn save_bumps_revision_and_marks_published() {
        let fixture = TestFixtureRoot::new_unique("flat-save").unwrap();
        let store = store(&fixture);
        let item = store
            .create(
                "article",
                "Hello",
                [("tags".to_string(), "a,b".to_string())],
            )
            .unwrap();
        assert_eq!(item.revision, 1);
        assert!(!item.published);

        let mut edited = store.get(item.reference).await.unwrap();
        edited.fields.insert("tags".to_string(), "a,c".to_string());
        store
            .save(edited, SaveMode::Publish, AccessLevel::Edit)
            .await
            .unwrap();

        let reloaded = store.get(item.reference).await.unwrap();
        assert_eq!(reloaded.revision, 2);
        assert!(reloaded.published);
        assert_eq!(reloaded.field("tags"), Some("a,c"));
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let fixture = TestFixtureRoot::new_unique("flat-conflict").unwrap();
        let store = store(&fixture);
        let item = store.create("article", "Hello", []).unwrap();
        let first = store.get(item.reference).await.unwrap();
        let second = first.clone();
        store
            .save(first, SaveMode::Publish, AccessLevel::Edit)
            .await
            .unwrap();
        let err = store
            .save(second, SaveMode::Publish, AccessLevel::Edit)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn locked_item_requires_no_access_bypass() {
        let fixture = TestFixtureRoot::new_unique("flat-locked").unwrap();
        let store = store(&fixture);
        let item = store.create("article", "Locked", []).unwrap();
        let mut locked = item.clone();
        locked.locked = true;
        store
            .save(locked, SaveMode::Draft, AccessLevel::Edit)
            .await
            .unwrap();

        let current = store.get(item.reference).await.unwrap();
        let err = store
            .save(current.clone(), SaveMode::Publish, AccessLevel::Edit)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TagErrorKind::Persistence);
        assert!(err.message().contains("locked"));

        store
            .save(current, SaveMode::Publish, AccessLevel::NoAccess)
            .await
            .expect("bypass save");
    }

    #[tokio::test]
    async fn missing_reference_is_not_found() {
        let fixture = TestFixtureRoot::new_unique("flat-missing").unwrap();
        let store = store(&fixture);
        let err = store
            .get(ContentRef::new(ContentId(9), ContentVersion(0)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn latest_picks_highest_version() {
        let fixture = TestFixtureRoot::new_unique("flat-latest").unwrap();
        let store = store(&fixture);
        let id = ContentId(0x77);
        for version in [0, 4, 2] {
            let reference = ContentRef::new(id, ContentVersion(version));
            let item = ContentItem::new(reference, "article", "x");
            write_record_atomic(&record_path(store.content_dir(), reference), &item).unwrap();
        }
        assert_eq!(store.latest(id).unwrap().reference.version, ContentVersion(4));
        assert!(store.latest(ContentId(0x78)).unwrap_err().is_not_found());
    }

    #[test]
    fn scan_returns_latest_version_per_item() {
        let fixture = TestFixtureRoot::new_unique("flat-scan").unwrap();
        let store = store(&fixture);
        let id = ContentId(0x42);
        for version in 0..3 {
            let reference = ContentRef::new(id, ContentVersion(version));
            let item = ContentItem::new(reference, "article", format!("v{}", version));
            write_record_atomic(&record_path(store.content_dir(), reference), &item).unwrap();
        }
        let other = store.create("article", "Other", []).unwrap();
        std::fs::write(store.content_dir().join("README"), "ignored").unwrap();

        let items = store.scan().unwrap();
        assert_eq!(items.len(), 2);
        let latest = items.iter().find(|item| item.reference.id == id).unwrap();
        assert_eq!(latest.reference.version, ContentVersion(2));
        assert!(items.iter().any(|item| item.reference == other.reference));
    }
}
