// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod content;
pub mod executor;
pub(crate) mod parse_utils;
pub mod tags;

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorKind {
    Usage,
    Operation,
}

/// A failed command line. Usage errors exit with 2, operation errors with 1.
#[derive(Debug, Clone)]
pub struct CliError {
    kind: CliErrorKind,
    message: String,
}

impl CliError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Usage,
            message: message.into(),
        }
    }

    pub fn operation(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Operation,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> CliErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind {
            CliErrorKind::Usage => 2,
            CliErrorKind::Operation => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<crate::errors::TagError> for CliError {
    fn from(err: crate::errors::TagError) -> Self {
        CliError::operation(err.to_string())
    }
}

/// A fully parsed command line, ready to run against a runtime root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Tag(tags::TagCommand),
    Content(content::ContentCommand),
}

/// `tagprop <domain> ...`. Names and aliases are lowercase.
pub struct Domain {
    pub name: &'static str,
    pub alias: &'static str,
    pub commands: &'static [Command],
}

/// `tagprop <domain> <command> [args]`.
pub struct Command {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    pub usage: &'static str,
    pub parse: fn(&[String]) -> Result<CliCommand, CliError>,
}

static DOMAINS: [&Domain; 2] = [&tags::DOMAIN, &content::DOMAIN];

trait Keyword {
    fn name(&self) -> &'static str;
    fn alias(&self) -> Option<&'static str>;
}

impl Keyword for &Domain {
    fn name(&self) -> &'static str {
        self.name
    }

    fn alias(&self) -> Option<&'static str> {
        Some(self.alias)
    }
}

impl Keyword for Command {
    fn name(&self) -> &'static str {
        self.name
    }

    fn alias(&self) -> Option<&'static str> {
        self.alias
    }
}

/// Exact name or alias first, then a prefix of exactly one name.
fn pick<'a, K: Keyword>(keywords: &'a [K], token: &str, what: &str) -> Result<&'a K, CliError> {
    let token = token.to_ascii_lowercase();
    if let Some(exact) = keywords
        .iter()
        .find(|keyword| keyword.name() == token || keyword.alias() == Some(token.as_str()))
    {
        return Ok(exact);
    }
    let candidates: Vec<&K> = keywords
        .iter()
        .filter(|keyword| keyword.name().starts_with(&token))
        .collect();
    match candidates.as_slice() {
        [only] => Ok(*only),
        [] => Err(CliError::usage(format!("Unknown {} '{}'", what, token))),
        several => {
            let names: Vec<&str> = several.iter().map(|keyword| keyword.name()).collect();
            Err(CliError::usage(format!(
                "Ambiguous {} '{}': {}",
                what,
                token,
                names.join(", ")
            )))
        }
    }
}

/// Resolves `<domain> <command>` and hands the remaining tokens to the
/// command's parser.
pub fn parse_command(tokens: &[String]) -> Result<CliCommand, CliError> {
    let [domain_token, rest @ ..] = tokens else {
        return Err(CliError::usage("Missing command domain"));
    };
    let domain = pick(&DOMAINS, domain_token, "domain")?;
    let [command_token, args @ ..] = rest else {
        return Err(CliError::usage(format!(
            "Missing command for domain '{}'",
            domain.name
        )));
    };
    let command = pick(domain.commands, command_token, &format!("{} command", domain.name))?;
    (command.parse)(args)
}

pub fn help_text() -> String {
    let mut lines = vec![
        "Usage:".to_string(),
        "  tagprop [-C <root>] <domain> <command> [args]".to_string(),
        "  tagprop help".to_string(),
        String::new(),
    ];
    for domain in DOMAINS {
        lines.push(format!("{} (alias: {})", domain.name, domain.alias));
        for command in domain.commands {
            match command.alias {
                Some(alias) => lines.push(format!("  {}    (alias: {})", command.usage, alias)),
                None => lines.push(format!("  {}", command.usage)),
            }
        }
        lines.push(String::new());
    }
    lines.push("Domains and commands are case-insensitive; unique prefixes work.".to_string());
    lines.push("Exit codes: 0 success, 1 failure or partial propagation, 2 usage.".to_string());
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub async fn run_cli(runtime_root: &Path, tokens: Vec<String>) -> i32 {
    let result = match parse_command(&tokens) {
        Ok(command) => executor::execute(runtime_root, command).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            eprintln!("{}", err);
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::content::ContentCommand;
    use crate::cli::tags::TagCommand;
    use std::collections::BTreeSet;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn keywords_are_unique_per_table() {
        let mut domain_words = BTreeSet::new();
        for domain in DOMAINS {
            assert!(domain_words.insert(domain.name), "{}", domain.name);
            assert!(domain_words.insert(domain.alias), "{}", domain.alias);
            let mut command_words = BTreeSet::new();
            for command in domain.commands {
                assert!(command_words.insert(command.name), "{}", command.name);
                if let Some(alias) = command.alias {
                    assert!(command_words.insert(alias), "{}", alias);
                }
            }
        }
    }

    #[test]
    fn resolves_aliases_prefixes_and_case() {
        assert_eq!(
            parse_command(&tokens(&["TAG", "sh", "abc"])).unwrap(),
            CliCommand::Tag(TagCommand::Show {
                id: "abc".to_string()
            })
        );
        assert_eq!(
            parse_command(&tokens(&["t", "rm", "abc"])).unwrap(),
            CliCommand::Tag(TagCommand::Delete {
                id: "abc".to_string()
            })
        );
        assert_eq!(
            parse_command(&tokens(&["cont", "Find", "Sale"])).unwrap(),
            CliCommand::Content(ContentCommand::Find {
                tag_name: "Sale".to_string()
            })
        );
    }

    #[test]
    fn unknown_or_missing_words_are_usage_errors() {
        let err = parse_command(&tokens(&["unknown", "list"])).unwrap_err();
        assert!(err.to_string().contains("Unknown domain"));
        assert_eq!(err.exit_code(), 2);

        let err = parse_command(&tokens(&["tag"])).unwrap_err();
        assert_eq!(err.kind(), CliErrorKind::Usage);
        assert!(err.to_string().contains("Missing command"));

        let err = parse_command(&tokens(&["tag", "publish"])).unwrap_err();
        assert!(err.to_string().contains("Unknown tag command 'publish'"));

        assert!(parse_command(&[]).is_err());
    }

    #[test]
    fn shared_prefix_is_ambiguous() {
        fn never(_: &[String]) -> Result<CliCommand, CliError> {
            Err(CliError::usage("not run"))
        }
        let commands = [
            Command {
                name: "remove",
                alias: None,
                usage: "",
                parse: never,
            },
            Command {
                name: "rename",
                alias: None,
                usage: "",
                parse: never,
            },
        ];
        let err = pick(&commands, "re", "command").map(|_| ()).unwrap_err();
        assert_eq!(err.to_string(), "Ambiguous command 're': remove, rename");
        assert_eq!(pick(&commands, "ren", "command").unwrap().name, "rename");
    }

    #[test]
    fn help_lists_every_domain() {
        let help = help_text();
        assert!(help.contains("tag rename <id>"));
        assert!(help.contains("content find <tag-name>"));
        assert!(help.contains("(alias: mv)"));
    }
}
