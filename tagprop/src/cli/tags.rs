// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::parse_utils::{next_value, parse_positive, parse_required_arg, set_once};
use super::{CliCommand, CliError, Command, Domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChange {
    Keep,
    Set(String),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagCommand {
    List {
        search: Option<String>,
        page: usize,
        page_size: Option<usize>,
    },
    Show {
        id: String,
    },
    Add {
        name: String,
        group: Option<String>,
    },
    Rename {
        id: String,
        name: String,
        group: GroupChange,
        propagate: bool,
    },
    Delete {
        id: String,
    },
}

pub static DOMAIN: Domain = Domain {
    name: "tag",
    alias: "t",
    commands: &[
        Command {
            name: "list",
            alias: Some("ls"),
            usage: "tag list [--search <text>] [--page <n>] [--page-size <n>]",
            parse: parse_list,
        },
        Command {
            name: "show",
            alias: None,
            usage: "tag show <id>",
            parse: parse_show,
        },
        Command {
            name: "add",
            alias: None,
            usage: "tag add --name <name> [--group <key>]",
            parse: parse_add,
        },
        Command {
            name: "rename",
            alias: Some("mv"),
            usage: "tag rename <id> --name <name> [--group <key> | --clear-group] [--no-propagate]",
            parse: parse_rename,
        },
        Command {
            name: "delete",
            alias: Some("rm"),
            usage: "tag delete <id>",
            parse: parse_delete,
        },
    ],
};

fn parse_list(args: &[String]) -> Result<CliCommand, CliError> {
    let mut search = None;
    let mut page = None;
    let mut page_size = None;

    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--search" => {
                idx += 1;
                let value = next_value(args, &mut idx, "--search")?;
                set_once(&mut search, value, "--search")?;
            }
            "--page" => {
                idx += 1;
                let raw = next_value(args, &mut idx, "--page")?;
                set_once(&mut page, parse_positive(&raw, "--page")?, "--page")?;
            }
            "--page-size" => {
                idx += 1;
                let raw = next_value(args, &mut idx, "--page-size")?;
                set_once(
                    &mut page_size,
                    parse_positive(&raw, "--page-size")?,
                    "--page-size",
                )?;
            }
            flag => {
                return Err(CliError::usage(format!(
                    "Unknown flag for tag list: {}",
                    flag
                )));
            }
        }
    }

    Ok(CliCommand::Tag(TagCommand::List {
        search,
        page: page.unwrap_or(1),
        page_size,
    }))
}

fn parse_show(args: &[String]) -> Result<CliCommand, CliError> {
    let (id, rest) = parse_required_arg(args, "tag id")?;
    if !rest.is_empty() {
        return Err(CliError::usage("tag show takes only <id>"));
    }
    Ok(CliCommand::Tag(TagCommand::Show { id }))
}

fn parse_add(args: &[String]) -> Result<CliCommand, CliError> {
    let mut name = None;
    let mut group = None;

    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--name" => {
                idx += 1;
                let value = next_value(args, &mut idx, "--name")?;
                set_once(&mut name, value, "--name")?;
            }
            "--group" => {
                idx += 1;
                let value = next_value(args, &mut idx, "--group")?;
                set_once(&mut group, value, "--group")?;
            }
            flag => {
                return Err(CliError::usage(format!(
                    "Unknown flag for tag add: {}",
                    flag
                )));
            }
        }
    }

    let name = name.ok_or_else(|| CliError::usage("tag add requires --name"))?;
    Ok(CliCommand::Tag(TagCommand::Add { name, group }))
}

fn parse_rename(args: &[String]) -> Result<CliCommand, CliError> {
    let (id, rest) = parse_required_arg(args, "tag id")?;
    let mut name = None;
    let mut group = GroupChange::Keep;
    let mut propagate = true;

    let mut idx = 0;
    while idx < rest.len() {
        match rest[idx].as_str() {
            "--name" => {
                idx += 1;
                let value = next_value(rest, &mut idx, "--name")?;
                set_once(&mut name, value, "--name")?;
            }
            "--group" => {
                if group != GroupChange::Keep {
                    return Err(CliError::usage(
                        "--group cannot be combined with --clear-group or repeated",
                    ));
                }
                idx += 1;
                group = GroupChange::Set(next_value(rest, &mut idx, "--group")?);
            }
            "--clear-group" => {
                if group != GroupChange::Keep {
                    return Err(CliError::usage(
                        "--clear-group cannot be combined with --group or repeated",
                    ));
                }
                group = GroupChange::Clear;
                idx += 1;
            }
            "--no-propagate" => {
                if !propagate {
                    return Err(CliError::usage("Duplicate --no-propagate"));
                }
                propagate = false;
                idx += 1;
            }
            flag => {
                return Err(CliError::usage(format!(
                    "Unknown flag for tag rename: {}",
                    flag
                )));
            }
        }
    }

    let name = name.ok_or_else(|| CliError::usage("tag rename requires --name"))?;
    Ok(CliCommand::Tag(TagCommand::Rename {
        id,
        name,
        group,
        propagate,
    }))
}

fn parse_delete(args: &[String]) -> Result<CliCommand, CliError> {
    let (id, rest) = parse_required_arg(args, "tag id")?;
    if !rest.is_empty() {
        return Err(CliError::usage("tag delete takes only <id>"));
    }
    Ok(CliCommand::Tag(TagCommand::Delete { id }))
}
