// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Tag fields are single strings holding tag names joined by `,`. Tokens are
//! never trimmed, so `"a, b"` holds the tokens `a` and ` b`.

use crate::content::repository::ContentItem;
use crate::content::schema::TagFieldRegistry;

pub const TAG_DELIMITER: &str = ",";

/// Splits a tag field. The empty string has no tokens.
pub fn tokenize(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(TAG_DELIMITER).map(str::to_string).collect()
}

/// Inverse of [`tokenize`], except that `[""]` joins to the empty string.
pub fn join(tokens: &[String]) -> String {
    tokens.join(TAG_DELIMITER)
}

/// Replaces (`Some`) or removes (`None`) the first token equal to `old_name`.
/// Later duplicates are left alone.
pub fn rewrite_one(
    mut tokens: Vec<String>,
    old_name: &str,
    new_name: Option<&str>,
) -> (Vec<String>, bool) {
    let Some(position) = tokens.iter().position(|token| token == old_name) else {
        return (tokens, false);
    };
    match new_name {
        Some(new_name) => tokens[position] = new_name.to_string(),
        None => {
            tokens.remove(position);
        }
    }
    (tokens, true)
}

/// Applies [`rewrite_one`] to every tag field the registry declares for the
/// item's content type that accepts `group_key`. Returns whether any field
/// changed.
pub fn rewrite_item(
    item: &mut ContentItem,
    registry: &TagFieldRegistry,
    group_key: Option<&str>,
    old_name: &str,
    new_name: Option<&str>,
) -> bool {
    let mut changed = false;
    for field in registry.fields_for(&item.content_type) {
        if !field.accepts_group(group_key) {
            continue;
        }
        let Some(value) = item.fields.get_mut(field.name.as_str()) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let (tokens, field_changed) = rewrite_one(tokenize(value), old_name, new_name);
        if field_changed {
            *value = join(&tokens);
            changed = true;
        }
    }
    changed
}

/// Whether any declared tag field of the item holds `name` as a whole token,
/// whatever the field's group.
pub fn item_has_tag(item: &ContentItem, registry: &TagFieldRegistry, name: &str) -> bool {
    registry
        .fields_for(&item.content_type)
        .iter()
        .filter_map(|field| item.field(&field.name))
        .any(|value| tokenize(value).iter().any(|token| token == name))
}
