// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::parse_utils::{next_value, parse_required_arg, set_once};
use super::{CliCommand, CliError, Command, Domain};
use crate::content::flat_storage::parse_content_id_hex;
use crate::content::repository::ContentId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCommand {
    Add {
        content_type: String,
        title: String,
        fields: Vec<(String, String)>,
    },
    Show {
        id: ContentId,
    },
    Find {
        tag_name: String,
    },
}

pub static DOMAIN: Domain = Domain {
    name: "content",
    alias: "c",
    commands: &[
        Command {
            name: "add",
            alias: None,
            usage: "content add <type> --title <title> [--field <name>=<value> ...]",
            parse: parse_add,
        },
        Command {
            name: "show",
            alias: None,
            usage: "content show <id-hex>",
            parse: parse_show,
        },
        Command {
            name: "find",
            alias: None,
            usage: "content find <tag-name>",
            parse: parse_find,
        },
    ],
};

fn parse_add(args: &[String]) -> Result<CliCommand, CliError> {
    let (content_type, rest) = parse_required_arg(args, "content type")?;
    let mut title = None;
    let mut fields: Vec<(String, String)> = Vec::new();

    let mut idx = 0;
    while idx < rest.len() {
        match rest[idx].as_str() {
            "--title" => {
                idx += 1;
                let value = next_value(rest, &mut idx, "--title")?;
                set_once(&mut title, value, "--title")?;
            }
            "--field" => {
                idx += 1;
                let raw = next_value(rest, &mut idx, "--field")?;
                let field = parse_field_assignment(&raw)?;
                if fields.iter().any(|(name, _)| *name == field.0) {
                    return Err(CliError::usage(format!("Duplicate --field {}", field.0)));
                }
                fields.push(field);
            }
            flag => {
                return Err(CliError::usage(format!(
                    "Unknown flag for content add: {}",
                    flag
                )));
            }
        }
    }

    let title = title.ok_or_else(|| CliError::usage("content add requires --title"))?;
    Ok(CliCommand::Content(ContentCommand::Add {
        content_type,
        title,
        fields,
    }))
}

fn parse_show(args: &[String]) -> Result<CliCommand, CliError> {
    let (raw, rest) = parse_required_arg(args, "content id")?;
    if !rest.is_empty() {
        return Err(CliError::usage("content show takes only <id-hex>"));
    }
    let id = parse_content_id_hex(&raw).map_err(CliError::usage)?;
    Ok(CliCommand::Content(ContentCommand::Show { id }))
}

fn parse_find(args: &[String]) -> Result<CliCommand, CliError> {
    let (tag_name, rest) = parse_required_arg(args, "tag name")?;
    if !rest.is_empty() {
        return Err(CliError::usage("content find takes only <tag-name>"));
    }
    Ok(CliCommand::Content(ContentCommand::Find { tag_name }))
}

fn parse_field_assignment(raw: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::usage(format!(
            "--field expects <name>=<value>, got '{}'",
            raw
        ))),
    }
}
