// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod field;
pub mod locator;
pub mod model;
pub mod propagation;
pub mod store;
pub mod yaml_store;

pub use locator::{ContentLocator, IndexLocator, ScanLocator};
pub use model::{Tag, TagId, TagUpdate};
pub use propagation::{
    ItemFailure, PropagationEngine, PropagationOptions, PropagationReport, PropagationStage,
};
pub use store::{TagStore, YamlTagStore};
