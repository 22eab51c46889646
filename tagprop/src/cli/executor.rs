// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::CliCommand;
use super::CliError;
use super::content::ContentCommand;
use super::tags::{GroupChange, TagCommand};
use crate::app_state::AppState;
use crate::content::flat_storage::content_id_hex;
use crate::content::repository::ContentItem;
use crate::content::schema::TagFieldRegistry;
use crate::tags::{PropagationReport, Tag, TagId};
use log::warn;
use std::path::Path;

/// Runs one command in-process against the runtime root and prints the
/// result. Returns the process exit code.
pub async fn execute(runtime_root: &Path, command: CliCommand) -> Result<i32, CliError> {
    let state = AppState::from_runtime_root(runtime_root)?;
    match command {
        CliCommand::Tag(command) => execute_tag(&state, command).await,
        CliCommand::Content(command) => execute_content(&state, command).await,
    }
}

async fn execute_tag(state: &AppState, command: TagCommand) -> Result<i32, CliError> {
    match command {
        TagCommand::List {
            search,
            page,
            page_size,
        } => {
            let listing = state
                .admin
                .list_tags(search.as_deref(), page, page_size)
                .await?;
            for tag in &listing.items {
                println!("{}", format_tag_row(tag));
            }
            println!(
                "Page {}/{} ({} of {} tags)",
                listing.page,
                listing.page_count.max(1),
                listing.filtered_count,
                listing.total_count
            );
            Ok(0)
        }
        TagCommand::Show { id } => {
            let tag = state.admin.show_tag(&TagId::new(id)).await?;
            println!("id: {}", tag.id());
            println!("name: {}", tag.name());
            println!("group: {}", tag.group_key().unwrap_or("-"));
            println!("revision: {}", tag.revision());
            Ok(0)
        }
        TagCommand::Add { name, group } => {
            let tag = state.admin.create_tag(&name, group.as_deref()).await?;
            println!("Created tag {}", tag.id());
            Ok(0)
        }
        TagCommand::Rename {
            id,
            name,
            group,
            propagate,
        } => {
            let id = TagId::new(id);
            let group_key = match group {
                GroupChange::Keep => state
                    .admin
                    .show_tag(&id)
                    .await?
                    .group_key()
                    .map(str::to_string),
                GroupChange::Set(key) => Some(key),
                GroupChange::Clear => None,
            };
            let report = state
                .admin
                .rename_tag(&id, &name, group_key, propagate)
                .await?;
            println!(
                "Renamed tag {} to '{}': {} located, {} rewritten, {} unchanged, {} failed",
                report.tag.id(),
                report.tag.name(),
                report.located,
                report.rewritten.len(),
                report.unchanged.len(),
                report.failed.len()
            );
            Ok(report_exit_code(&report))
        }
        TagCommand::Delete { id } => {
            let report = state.admin.delete_tag(&TagId::new(id)).await?;
            println!(
                "Deleted tag {} ('{}'): {} detached, {} failed",
                report.tag.id(),
                report.tag.name(),
                report.rewritten.len(),
                report.failed.len()
            );
            Ok(report_exit_code(&report))
        }
    }
}

async fn execute_content(state: &AppState, command: ContentCommand) -> Result<i32, CliError> {
    match command {
        ContentCommand::Add {
            content_type,
            title,
            fields,
        } => {
            if !state.registry.is_known_type(&content_type) {
                warn!(
                    "Content type '{}' has no declared tag fields; tags on it are never rewritten",
                    content_type
                );
            }
            let item = state.content.create(&content_type, &title, fields)?;
            if let Err(err) = state.locator.invalidate().await {
                warn!("Content locator refresh failed: {}", err);
            }
            println!("Created content {}", content_id_hex(item.reference.id));
            Ok(0)
        }
        ContentCommand::Show { id } => {
            let item = state.content.latest(id)?;
            print_content(&item, &state.registry);
            Ok(0)
        }
        ContentCommand::Find { tag_name } => {
            let mut references = state
                .locator
                .find_references_by_tag_name(&tag_name)
                .await?;
            references.sort();
            for reference in references {
                let title = match state.content.load(reference) {
                    Ok(item) => item.title,
                    Err(err) => {
                        warn!("Failed to load {}: {}", reference, err);
                        String::new()
                    }
                };
                println!("{}\t{}", reference, title);
            }
            Ok(0)
        }
    }
}

fn format_tag_row(tag: &Tag) -> String {
    format!(
        "{}\t{}\t{}",
        tag.id(),
        tag.name(),
        tag.group_key().unwrap_or("-")
    )
}

fn report_exit_code(report: &PropagationReport) -> i32 {
    if report.is_complete() {
        return 0;
    }
    eprintln!(
        "{} content item(s) were not updated (stage: {}):",
        report.failed.len(),
        report.stage
    );
    for failure in &report.failed {
        eprintln!("  {}: {}", failure.reference, failure.error);
    }
    1
}

fn print_content(item: &ContentItem, registry: &TagFieldRegistry) {
    println!("id: {}", content_id_hex(item.reference.id));
    println!("version: {}", item.reference.version.0);
    println!("type: {}", item.content_type);
    println!("title: {}", item.title);
    println!("revision: {}", item.revision);
    println!("published: {}", item.published);
    println!("locked: {}", item.locked);
    for (name, value) in &item.fields {
        println!("{}", format_field(registry, item, name, value));
    }
}

fn format_field(
    registry: &TagFieldRegistry,
    item: &ContentItem,
    name: &str,
    value: &str,
) -> String {
    match registry.group_for(&item.content_type, name) {
        Some(group) => format!("field {} [{}]: {}", name, group, value),
        None => format!("field {}: {}", name, value),
    }
}
