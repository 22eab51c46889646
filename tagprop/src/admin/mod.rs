// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::errors::{TagError, TagResult};
use crate::tags::{PropagationEngine, PropagationReport, Tag, TagId, TagUpdate};
use std::sync::Arc;

/// One page of the tag listing. `page` is the page actually returned, which
/// can be one less than requested when the request ran past the end.
#[derive(Debug, Clone)]
pub struct TagPage {
    pub items: Vec<Tag>,
    pub total_count: usize,
    pub filtered_count: usize,
    pub page: usize,
    pub page_count: usize,
}

/// Administrative operations over tags.
pub struct TagAdmin {
    engine: Arc<PropagationEngine>,
    page_size: usize,
}

impl TagAdmin {
    pub fn new(engine: Arc<PropagationEngine>, page_size: usize) -> Self {
        Self {
            engine,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Lists tags sorted by name then id. `search` is a case-sensitive
    /// substring filter on the name; an empty search matches everything.
    pub async fn list_tags(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: Option<usize>,
    ) -> TagResult<TagPage> {
        if page == 0 {
            return Err(TagError::validation("Page numbers start at 1"));
        }
        let page_size = match page_size {
            Some(0) => return Err(TagError::validation("Page size must be at least 1")),
            Some(size) => size,
            None => self.page_size,
        };

        let mut tags = self.engine.tag_store().list_all().await?;
        let total_count = tags.len();
        if let Some(search) = search.filter(|search| !search.is_empty()) {
            tags.retain(|tag| tag.name().contains(search));
        }
        tags.sort_by(|left, right| {
            left.name()
                .cmp(right.name())
                .then_with(|| left.id().cmp(right.id()))
        });
        let filtered_count = tags.len();

        let mut effective = page;
        let mut items = page_slice(&tags, effective, page_size);
        if items.is_empty() && effective > 1 {
            effective -= 1;
            items = page_slice(&tags, effective, page_size);
        }

        Ok(TagPage {
            items,
            total_count,
            filtered_count,
            page: effective,
            page_count: filtered_count.div_ceil(page_size),
        })
    }

    pub async fn show_tag(&self, id: &TagId) -> TagResult<Tag> {
        self.engine.tag_store().get_by_id(id).await
    }

    pub async fn create_tag(&self, name: &str, group_key: Option<&str>) -> TagResult<Tag> {
        self.engine.tag_store().create(name, group_key).await
    }

    pub async fn rename_tag(
        &self,
        id: &TagId,
        new_name: &str,
        new_group_key: Option<String>,
        propagate: bool,
    ) -> TagResult<PropagationReport> {
        self.engine
            .rename(id, TagUpdate::new(new_name, new_group_key), propagate)
            .await
    }

    pub async fn delete_tag(&self, id: &TagId) -> TagResult<PropagationReport> {
        self.engine.delete(id).await
    }
}

fn page_slice(tags: &[Tag], page: usize, page_size: usize) -> Vec<Tag> {
    let start = (page - 1).saturating_mul(page_size);
    tags.iter().skip(start).take(page_size).cloned().collect()
}
