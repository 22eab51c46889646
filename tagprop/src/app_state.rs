// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::path::Path;
use std::sync::Arc;

use crate::admin::TagAdmin;
use crate::config::{LocatorKind, ValidatedConfig};
use crate::content::flat_storage::FlatContentStore;
use crate::content::schema::TagFieldRegistry;
use crate::errors::{TagError, TagResult};
use crate::runtime_paths::RuntimePaths;
use crate::tags::{
    ContentLocator, IndexLocator, PropagationEngine, PropagationOptions, ScanLocator,
    YamlTagStore,
};

/// Wired components for one runtime root.
pub struct AppState {
    pub config: Arc<ValidatedConfig>,
    pub runtime_paths: RuntimePaths,
    pub registry: Arc<TagFieldRegistry>,
    pub content: Arc<FlatContentStore>,
    pub locator: Arc<dyn ContentLocator>,
    pub engine: Arc<PropagationEngine>,
    pub admin: TagAdmin,
}

impl AppState {
    pub fn new(config: ValidatedConfig, runtime_paths: RuntimePaths) -> TagResult<Self> {
        let registry = Arc::new(TagFieldRegistry::from_config(&config));
        let content = Arc::new(FlatContentStore::new(runtime_paths.content_dir.clone()));
        let tag_store = Arc::new(YamlTagStore::open(
            &runtime_paths.state_sys_dir,
            config.tags.duplicate_names,
        )?);
        let locator: Arc<dyn ContentLocator> = match config.propagation.locator {
            LocatorKind::Index => Arc::new(IndexLocator::new(content.clone(), registry.clone())),
            LocatorKind::Scan => Arc::new(ScanLocator::new(content.clone(), registry.clone())),
        };
        let engine = Arc::new(PropagationEngine::new(
            tag_store,
            content.clone(),
            locator.clone(),
            registry.clone(),
            PropagationOptions::from_config(&config),
        ));
        let admin = TagAdmin::new(engine.clone(), config.admin.page_size);
        Ok(Self {
            config: Arc::new(config),
            runtime_paths,
            registry,
            content,
            locator,
            engine,
            admin,
        })
    }

    pub fn from_runtime_root(root: &Path) -> TagResult<Self> {
        let bootstrap = crate::bootstrap::bootstrap_runtime(root)
            .map_err(|err| TagError::persistence(format!("Bootstrap error: {}", err)))?;
        Self::new(bootstrap.validated_config, bootstrap.runtime_paths)
    }
}
