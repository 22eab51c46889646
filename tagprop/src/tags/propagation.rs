// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::field::rewrite_item;
use super::locator::ContentLocator;
use super::model::{Tag, TagId, TagUpdate};
use super::store::{TagStore, validate_tag_name};
use crate::config::{DeletePolicy, ValidatedConfig};
use crate::content::repository::{AccessLevel, ContentRef, ContentRepository, SaveMode};
use crate::content::schema::TagFieldRegistry;
use crate::errors::{TagError, TagResult};
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationOptions {
    pub concurrency: usize,
    pub delete_policy: DeletePolicy,
}

impl PropagationOptions {
    pub fn from_config(config: &ValidatedConfig) -> Self {
        Self {
            concurrency: config.propagation.concurrency,
            delete_policy: config.propagation.delete_policy,
        }
    }
}

impl Default for PropagationOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            delete_policy: DeletePolicy::Orphan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationStage {
    Located,
    Rewriting,
    Persisting,
    Committed,
    TagRemoved,
}

impl fmt::Display for PropagationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PropagationStage::Located => "located",
            PropagationStage::Rewriting => "rewriting",
            PropagationStage::Persisting => "persisting",
            PropagationStage::Committed => "committed",
            PropagationStage::TagRemoved => "tag removed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub reference: ContentRef,
    pub error: TagError,
}

/// Outcome of one rename or delete. `tag` is the stored value after a rename
/// and the removed value after a delete.
#[derive(Debug, Clone)]
pub struct PropagationReport {
    pub tag: Tag,
    pub stage: PropagationStage,
    pub located: usize,
    pub rewritten: Vec<ContentRef>,
    pub unchanged: Vec<ContentRef>,
    pub failed: Vec<ItemFailure>,
}

impl PropagationReport {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            stage: PropagationStage::Located,
            located: 0,
            rewritten: Vec::new(),
            unchanged: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// True when no located content item was left behind.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies tag renames and deletes to the tag store and to every content item
/// carrying the tag. Content is written first and the tag record last.
pub struct PropagationEngine {
    tag_store: Arc<dyn TagStore>,
    content: Arc<dyn ContentRepository>,
    locator: Arc<dyn ContentLocator>,
    registry: Arc<TagFieldRegistry>,
    options: PropagationOptions,
}

impl PropagationEngine {
    pub fn new(
        tag_store: Arc<dyn TagStore>,
        content: Arc<dyn ContentRepository>,
        locator: Arc<dyn ContentLocator>,
        registry: Arc<TagFieldRegistry>,
        options: PropagationOptions,
    ) -> Self {
        Self {
            tag_store,
            content,
            locator,
            registry,
            options,
        }
    }

    pub fn tag_store(&self) -> &Arc<dyn TagStore> {
        &self.tag_store
    }

    pub fn locator(&self) -> &Arc<dyn ContentLocator> {
        &self.locator
    }

    pub fn options(&self) -> PropagationOptions {
        self.options
    }

    pub async fn rename(
        &self,
        id: &TagId,
        update: TagUpdate,
        propagate: bool,
    ) -> TagResult<PropagationReport> {
        let current = self.tag_store.get_by_id(id).await?;
        validate_tag_name(&update.name)?;
        let renamed = current.renamed(&update);
        self.tag_store.validate(&renamed).await?;
        let mut report = PropagationReport::new(renamed.clone());

        if !propagate {
            debug!("Renaming tag '{}' without content propagation", id);
        } else if current.name() == update.name {
            debug!("Tag '{}' keeps its name; content untouched", id);
        } else {
            let references = self.locate(current.name()).await?;
            report.located = references.len();
            self.rewrite_all(
                references,
                current.group_key(),
                current.name(),
                Some(&update.name),
                &mut report,
            )
            .await;
        }

        report.tag = self.tag_store.save(renamed).await?;
        report.stage = PropagationStage::Committed;
        self.refresh_locator(&report).await;
        info!(
            "Renamed tag '{}' from '{}' to '{}': {} located, {} rewritten, {} failed",
            id,
            current.name(),
            report.tag.name(),
            report.located,
            report.rewritten.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Renames the first tag named `old_name`, keeping its group.
    pub async fn rename_by_name(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> TagResult<PropagationReport> {
        let tag = self
            .tag_store
            .find_by_name(old_name)
            .await?
            .ok_or_else(|| TagError::not_found(format!("Tag named '{}' not found", old_name)))?;
        let update = TagUpdate::new(new_name, tag.group_key().map(str::to_string));
        self.rename(tag.id(), update, true).await
    }

    pub async fn delete(&self, id: &TagId) -> TagResult<PropagationReport> {
        let tag = self.tag_store.get_by_id(id).await?;
        let mut report = PropagationReport::new(tag.clone());

        if self.options.delete_policy == DeletePolicy::Detach {
            let references = self.locate(tag.name()).await?;
            report.located = references.len();
            self.rewrite_all(references, tag.group_key(), tag.name(), None, &mut report)
                .await;
        }

        self.tag_store.delete(&tag).await?;
        report.stage = PropagationStage::TagRemoved;
        self.refresh_locator(&report).await;
        info!(
            "Deleted tag '{}' ('{}', {:?} policy): {} detached, {} failed",
            id,
            tag.name(),
            self.options.delete_policy,
            report.rewritten.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn locate(&self, name: &str) -> TagResult<Vec<ContentRef>> {
        let references = self
            .locator
            .find_references_by_tag_name(name)
            .await
            .map_err(|err| match err.kind() {
                crate::errors::TagErrorKind::Locator => err,
                _ => TagError::locator(err.to_string()),
            })?;
        debug!(
            "Stage {}: {} items carry '{}'",
            PropagationStage::Located,
            references.len(),
            name
        );
        Ok(references)
    }

    /// Fields declaring a group other than `group_key` are left alone, so an
    /// item located by name alone can end up unchanged.
    async fn rewrite_all(
        &self,
        references: Vec<ContentRef>,
        group_key: Option<&str>,
        old_name: &str,
        new_name: Option<&str>,
        report: &mut PropagationReport,
    ) {
        let outcomes: Vec<(ContentRef, TagResult<bool>)> = stream::iter(references)
            .map(|reference| async move {
                let outcome = self
                    .rewrite_reference(reference, group_key, old_name, new_name)
                    .await;
                (reference, outcome)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        for (reference, outcome) in outcomes {
            match outcome {
                Ok(true) => report.rewritten.push(reference),
                Ok(false) => report.unchanged.push(reference),
                Err(error) => {
                    warn!("Content {} not updated for '{}': {}", reference, old_name, error);
                    report.failed.push(ItemFailure { reference, error });
                }
            }
        }
        report.rewritten.sort();
        report.unchanged.sort();
        report.failed.sort_by_key(|failure| failure.reference);
    }

    async fn rewrite_reference(
        &self,
        reference: ContentRef,
        group_key: Option<&str>,
        old_name: &str,
        new_name: Option<&str>,
    ) -> TagResult<bool> {
        let mut item = self.content.get(reference).await?;
        debug!("Stage {}: {}", PropagationStage::Rewriting, reference);
        if !rewrite_item(&mut item, &self.registry, group_key, old_name, new_name) {
            return Ok(false);
        }
        debug!("Stage {}: {}", PropagationStage::Persisting, reference);
        self.content
            .save(item, SaveMode::Publish, AccessLevel::NoAccess)
            .await?;
        Ok(true)
    }

    async fn refresh_locator(&self, report: &PropagationReport) {
        if report.rewritten.is_empty() {
            return;
        }
        if let Err(err) = self.locator.invalidate().await {
            warn!("Content locator refresh failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicateNamePolicy;
    use crate::content::flat_storage::FlatContentStore;
    use crate::content::repository::ContentItem;
    use crate::content::schema::TagField;
    use crate::errors::TagErrorKind;
    use crate::tags::locator::IndexLocator;
    use crate::tags::store::YamlTagStore;
    use crate::util::test_fixtures::TestFixtureRoot;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};

    struct Harness {
        _fixture: TestFixtureRoot,
        tags: Arc<YamlTagStore>,
        content: Arc<FlatContentStore>,
        registry: Arc<TagFieldRegistry>,
    }

    impl Harness {
        fn new(name: &str) -> Self {
            let fixture = TestFixtureRoot::new_unique(name).unwrap();
            fixture.init_runtime_layout().unwrap();
            let tags = Arc::new(
                YamlTagStore::open(&fixture.state_sys_dir(), DuplicateNamePolicy::Allow).unwrap(),
            );
            let content = Arc::new(FlatContentStore::new(fixture.content_dir()));
            let mut declared = BTreeMap::new();
            declared.insert("article".to_string(), vec![TagField::new("tags")]);
            declared.insert(
                "product".to_string(),
                vec![TagField::new("tags"), TagField::grouped("brands", "brand")],
            );
            Self {
                _fixture: fixture,
                tags,
                content,
                registry: Arc::new(TagFieldRegistry::new(declared)),
            }
        }

        fn article(&self, tags: &str) -> ContentRef {
            self.content
                .create("article", "Item", [("tags".to_string(), tags.to_string())])
                .unwrap()
                .reference
        }

        fn tags_of(&self, reference: ContentRef) -> String {
            self.content
                .load(reference)
                .unwrap()
                .field("tags")
                .unwrap_or_default()
                .to_string()
        }

        fn index(&self) -> Arc<IndexLocator> {
            Arc::new(IndexLocator::new(self.content.clone(), self.registry.clone()))
        }

        fn engine_with(
            &self,
            content: Arc<dyn ContentRepository>,
            locator: Arc<dyn ContentLocator>,
            delete_policy: DeletePolicy,
        ) -> PropagationEngine {
            PropagationEngine::new(
                self.tags.clone(),
                content,
                locator,
                self.registry.clone(),
                PropagationOptions {
                    concurrency: 4,
                    delete_policy,
                },
            )
        }

        fn engine(&self) -> PropagationEngine {
            self.engine_with(self.content.clone(), self.index(), DeletePolicy::Orphan)
        }
    }

    /// Rejects saves for selected items.
    struct RejectingRepository {
        inner: Arc<FlatContentStore>,
        rejected: HashSet<ContentRef>,
    }

    #[async_trait]
    impl ContentRepository for RejectingRepository {
        async fn get(&self, reference: ContentRef) -> TagResult<ContentItem> {
            self.inner.get(reference).await
        }

        async fn save(
            &self,
            item: ContentItem,
            mode: SaveMode,
            access: AccessLevel,
        ) -> TagResult<ContentRef> {
            if self.rejected.contains(&item.reference) {
                return Err(TagError::persistence("save rejected"));
            }
            self.inner.save(item, mode, access).await
        }
    }

    struct BrokenLocator;

    #[async_trait]
    impl ContentLocator for BrokenLocator {
        async fn find_references_by_tag_name(&self, _name: &str) -> TagResult<Vec<ContentRef>> {
            Err(TagError::locator("index unavailable"))
        }
    }

    /// Renames the tag behind the engine's back while locating.
    struct RacingLocator {
        tags: Arc<YamlTagStore>,
        id: TagId,
    }

    #[async_trait]
    impl ContentLocator for RacingLocator {
        async fn find_references_by_tag_name(&self, _name: &str) -> TagResult<Vec<ContentRef>> {
            let tag = self.tags.get_by_id(&self.id).await?;
            self.tags
                .save(tag.renamed(&TagUpdate::new("Winner", None)))
                .await?;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn rename_rewrites_sale_scenario() {
        let harness = Harness::new("engine-sale");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let first = harness.article("Sale,Summer");
        let second = harness.article("Sale,Sale");
        let third = harness.article("Winter");

        let report = harness
            .engine()
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap();

        assert_eq!(report.stage, PropagationStage::Committed);
        assert_eq!(report.located, 2);
        assert_eq!(report.rewritten.len(), 2);
        assert!(report.is_complete());
        assert_eq!(harness.tags_of(first), "Clearance,Summer");
        assert_eq!(harness.tags_of(second), "Clearance,Sale");
        assert_eq!(harness.tags_of(third), "Winter");
        assert_eq!(
            harness.tags.get_by_id(tag.id()).await.unwrap().name(),
            "Clearance"
        );
        let item = harness.content.load(first).unwrap();
        assert!(item.published);
    }

    #[tokio::test]
    async fn rename_is_idempotent_on_content() {
        let harness = Harness::new("engine-idempotent");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let item = harness.article("Sale,Summer");
        let engine = harness.engine();

        engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap();
        let after_first = harness.content.load(item).unwrap();
        let report = engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap();

        assert_eq!(report.located, 0);
        assert_eq!(harness.content.load(item).unwrap(), after_first);
    }

    #[tokio::test]
    async fn failed_item_is_reported_and_tag_still_renamed() {
        let harness = Harness::new("engine-partial");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let good = harness.article("Sale");
        let bad = harness.article("Summer,Sale");
        let repository = Arc::new(RejectingRepository {
            inner: harness.content.clone(),
            rejected: HashSet::from([bad]),
        });
        let engine = harness.engine_with(repository, harness.index(), DeletePolicy::Orphan);

        let report = engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap();

        assert_eq!(report.rewritten, vec![good]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].reference, bad);
        assert!(!report.is_complete());
        assert_eq!(harness.tags_of(bad), "Summer,Sale");
        assert_eq!(harness.tags_of(good), "Clearance");
        assert_eq!(report.tag.name(), "Clearance");
    }

    #[tokio::test]
    async fn locator_failure_aborts_without_mutation() {
        let harness = Harness::new("engine-locator");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let item = harness.article("Sale");
        let engine = harness.engine_with(
            harness.content.clone(),
            Arc::new(BrokenLocator),
            DeletePolicy::Detach,
        );

        let err = engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TagErrorKind::Locator);
        let err = engine.delete(tag.id()).await.unwrap_err();
        assert_eq!(err.kind(), TagErrorKind::Locator);

        assert_eq!(harness.tags.get_by_id(tag.id()).await.unwrap(), tag);
        assert_eq!(harness.tags_of(item), "Sale");
    }

    #[tokio::test]
    async fn same_name_or_no_propagate_skips_content() {
        let harness = Harness::new("engine-skip");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let item = harness.article("Sale");
        let engine = harness.engine_with(
            harness.content.clone(),
            Arc::new(BrokenLocator),
            DeletePolicy::Orphan,
        );

        let report = engine
            .rename(tag.id(), TagUpdate::new("Sale", Some("promo".to_string())), true)
            .await
            .unwrap();
        assert_eq!(report.located, 0);
        assert_eq!(report.tag.group_key(), Some("promo"));

        let report = engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), false)
            .await
            .unwrap();
        assert_eq!(report.stage, PropagationStage::Committed);
        assert_eq!(harness.tags_of(item), "Sale");
    }

    #[tokio::test]
    async fn validation_and_not_found_happen_before_mutation() {
        let harness = Harness::new("engine-precondition");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let item = harness.article("Sale");
        let engine = harness.engine();

        let err = engine
            .rename(tag.id(), TagUpdate::new("", None), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TagErrorKind::Validation);
        assert_eq!(harness.tags_of(item), "Sale");

        let err = engine.rename_by_name("Missing", "Other").await.unwrap_err();
        assert!(err.is_not_found());

        engine.delete(tag.id()).await.unwrap();
        assert!(harness.tags.get_by_id(tag.id()).await.unwrap_err().is_not_found());
        let err = engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(engine.delete(tag.id()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rename_by_name_keeps_group() {
        let harness = Harness::new("engine-by-name");
        let tag = harness.tags.create("Sale", Some("promo")).await.unwrap();
        let item = harness.article("Summer,Sale");

        let report = harness
            .engine()
            .rename_by_name("Sale", "Clearance")
            .await
            .unwrap();
        assert_eq!(report.tag.id(), tag.id());
        assert_eq!(report.tag.group_key(), Some("promo"));
        assert_eq!(harness.tags_of(item), "Summer,Clearance");
    }

    #[tokio::test]
    async fn delete_policies() {
        let harness = Harness::new("engine-delete");
        let orphaned = harness.tags.create("Sale", None).await.unwrap();
        let detached = harness.tags.create("Summer", None).await.unwrap();
        let item = harness.article("Sale,Summer,Summer");

        let report = harness.engine().delete(orphaned.id()).await.unwrap();
        assert_eq!(report.stage, PropagationStage::TagRemoved);
        assert_eq!(report.located, 0);
        assert_eq!(harness.tags_of(item), "Sale,Summer,Summer");

        let engine = harness.engine_with(
            harness.content.clone(),
            harness.index(),
            DeletePolicy::Detach,
        );
        let report = engine.delete(detached.id()).await.unwrap();
        assert_eq!(report.rewritten, vec![item]);
        assert_eq!(harness.tags_of(item), "Sale,Summer");
        assert!(harness.tags.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_tag_change_fails_commit() {
        let harness = Harness::new("engine-race");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let engine = harness.engine_with(
            harness.content.clone(),
            Arc::new(RacingLocator {
                tags: harness.tags.clone(),
                id: tag.id().clone(),
            }),
            DeletePolicy::Orphan,
        );

        let err = engine
            .rename(tag.id(), TagUpdate::new("Loser", None), true)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            harness.tags.get_by_id(tag.id()).await.unwrap().name(),
            "Winner"
        );
    }

    #[tokio::test]
    async fn grouped_fields_follow_only_their_group() {
        let harness = Harness::new("engine-groups");
        let brand = harness.tags.create("Acme", Some("brand")).await.unwrap();
        let plain = harness.tags.create("Acme", None).await.unwrap();
        let product = harness
            .content
            .create(
                "product",
                "Anvil",
                [
                    ("tags".to_string(), "Acme".to_string()),
                    ("brands".to_string(), "Acme".to_string()),
                ],
            )
            .unwrap()
            .reference;
        let engine = harness.engine();

        let report = engine
            .rename(plain.id(), TagUpdate::new("Generic", None), true)
            .await
            .unwrap();
        assert_eq!(report.rewritten, vec![product]);
        let item = harness.content.load(product).unwrap();
        assert_eq!(item.field("tags"), Some("Generic"));
        assert_eq!(item.field("brands"), Some("Acme"));

        let report = engine
            .rename(brand.id(), TagUpdate::new("Apex", Some("brand".to_string())), true)
            .await
            .unwrap();
        assert_eq!(report.rewritten, vec![product]);
        let item = harness.content.load(product).unwrap();
        assert_eq!(item.field("tags"), Some("Generic"));
        assert_eq!(item.field("brands"), Some("Apex"));
    }

    #[tokio::test]
    async fn rename_scans_content_once() {
        let harness = Harness::new("engine-one-scan");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        for index in 0..5 {
            harness.article(&format!("Sale,T{}", index));
        }
        let locator = harness.index();
        let engine = harness.engine_with(
            harness.content.clone(),
            locator.clone(),
            DeletePolicy::Orphan,
        );

        let report = engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap();
        assert_eq!(report.rewritten.len(), 5);
        assert_eq!(locator.rebuilds(), 1);

        assert_eq!(
            locator
                .find_references_by_tag_name("Clearance")
                .await
                .unwrap()
                .len(),
            5
        );
        assert_eq!(locator.rebuilds(), 2);
    }

    #[tokio::test]
    async fn index_sees_renamed_content_after_commit() {
        let harness = Harness::new("engine-refresh");
        let tag = harness.tags.create("Sale", None).await.unwrap();
        let item = harness.article("Sale");
        let locator = harness.index();
        let engine = harness.engine_with(
            harness.content.clone(),
            locator.clone(),
            DeletePolicy::Orphan,
        );

        engine
            .rename(tag.id(), TagUpdate::new("Clearance", None), true)
            .await
            .unwrap();
        assert_eq!(
            locator.find_references_by_tag_name("Clearance").await.unwrap(),
            vec![item]
        );
        assert!(locator.find_references_by_tag_name("Sale").await.unwrap().is_empty());
    }
}
