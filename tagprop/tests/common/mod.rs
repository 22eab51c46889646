// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};
use tagprop::app_state::AppState;
use tagprop::content::repository::ContentRef;
use tagprop::util::test_fixtures::TestFixtureRoot;

pub struct TestHarness {
    pub fixture: TestFixtureRoot,
    pub state: AppState,
}

impl TestHarness {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, "")
    }

    pub fn with_config(name: &str, yaml: &str) -> Self {
        let fixture = TestFixtureRoot::new_unique(name).expect("fixture");
        if !yaml.is_empty() {
            fixture.write_config(yaml).expect("write config");
        }
        let state = AppState::from_runtime_root(fixture.path()).expect("app state");
        Self { fixture, state }
    }

    pub fn article(&self, tags: &str) -> ContentRef {
        self.state
            .content
            .create("article", "Article", [("tags".to_string(), tags.to_string())])
            .expect("create article")
            .reference
    }

    pub fn tags_of(&self, reference: ContentRef) -> String {
        self.state
            .content
            .load(reference)
            .expect("load content")
            .field("tags")
            .unwrap_or_default()
            .to_string()
    }
}

pub fn run_cli(root: &Path, args: &[&str]) -> Output {
    let binary = env!("CARGO_BIN_EXE_tagprop");
    Command::new(binary)
        .arg("-C")
        .arg(root)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run tagprop cli")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
