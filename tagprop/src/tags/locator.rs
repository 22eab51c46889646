// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::field::{item_has_tag, tokenize};
use crate::content::flat_storage::FlatContentStore;
use crate::content::repository::ContentRef;
use crate::content::schema::TagFieldRegistry;
use crate::errors::{TagError, TagResult};
use async_trait::async_trait;
use log::{debug, error};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Finds content items whose tag fields hold a tag name as a whole token.
/// Results carry no ordering guarantee.
#[async_trait]
pub trait ContentLocator: Send + Sync {
    async fn find_references_by_tag_name(&self, name: &str) -> TagResult<Vec<ContentRef>>;

    /// Called after content writes. Cached implementations drop stale state
    /// here.
    async fn invalidate(&self) -> TagResult<()> {
        Ok(())
    }
}

/// Reads every record on each lookup.
pub struct ScanLocator {
    store: Arc<FlatContentStore>,
    registry: Arc<TagFieldRegistry>,
}

impl ScanLocator {
    pub fn new(store: Arc<FlatContentStore>, registry: Arc<TagFieldRegistry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl ContentLocator for ScanLocator {
    async fn find_references_by_tag_name(&self, name: &str) -> TagResult<Vec<ContentRef>> {
        let items = self
            .store
            .scan()
            .map_err(|err| TagError::locator(format!("Content scan failed: {}", err.message())))?;
        let references: Vec<ContentRef> = items
            .iter()
            .filter(|item| item_has_tag(item, &self.registry, name))
            .map(|item| item.reference)
            .collect();
        debug!(
            "Scan located {} of {} items tagged '{}'",
            references.len(),
            items.len(),
            name
        );
        Ok(references)
    }
}

type TagIndex = HashMap<String, Vec<ContentRef>>;

/// Inverted index from tag name to content references. Built by one scan on
/// the first lookup after construction or [`ContentLocator::invalidate`].
pub struct IndexLocator {
    store: Arc<FlatContentStore>,
    registry: Arc<TagFieldRegistry>,
    index: RwLock<Option<TagIndex>>,
    rebuilds: AtomicUsize,
}

impl IndexLocator {
    pub fn new(store: Arc<FlatContentStore>, registry: Arc<TagFieldRegistry>) -> Self {
        Self {
            store,
            registry,
            index: RwLock::new(None),
            rebuilds: AtomicUsize::new(0),
        }
    }

    /// Number of full content scans performed so far.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::Relaxed)
    }

    fn build_index(&self) -> TagResult<TagIndex> {
        let items = self.store.scan().map_err(|err| {
            TagError::locator(format!("Content index rebuild failed: {}", err.message()))
        })?;
        let mut index: TagIndex = HashMap::new();
        for item in &items {
            let mut names = BTreeSet::new();
            for field in self.registry.fields_for(&item.content_type) {
                if let Some(value) = item.field(&field.name) {
                    names.extend(tokenize(value));
                }
            }
            for name in names {
                index.entry(name).or_default().push(item.reference);
            }
        }
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Rebuilt tag index: {} names over {} items",
            index.len(),
            items.len()
        );
        Ok(index)
    }

    fn lock_poisoned() -> TagError {
        error!("Tag index lock poisoned");
        TagError::locator("Tag index lock poisoned")
    }
}

#[async_trait]
impl ContentLocator for IndexLocator {
    async fn find_references_by_tag_name(&self, name: &str) -> TagResult<Vec<ContentRef>> {
        {
            let guard = self.index.read().map_err(|_| Self::lock_poisoned())?;
            if let Some(index) = guard.as_ref() {
                return Ok(index.get(name).cloned().unwrap_or_default());
            }
        }
        let index = self.build_index()?;
        let references = index.get(name).cloned().unwrap_or_default();
        let mut guard = self.index.write().map_err(|_| Self::lock_poisoned())?;
        *guard = Some(index);
        Ok(references)
    }

    async fn invalidate(&self) -> TagResult<()> {
        let mut guard = self.index.write().map_err(|_| Self::lock_poisoned())?;
        *guard = None;
        Ok(())
    }
}
