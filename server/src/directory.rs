//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Flat-file user directory
//!
//! Accounts live in a TOML file of `[[user]]` tables:
//!
//! ```toml
//! [[user]]
//! number = 100
//! username = "sysop"
//! password = "change-me"
//! level = 4
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use varidial_service::{MAX_PRIVILEGE_LEVEL, MAX_USERNAME_LEN, MemoryDirectory};

/// One account in the user file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub number: u32,
    pub username: String,
    pub password: String,
    pub level: u8,
}

/// Contents of a user file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFile {
    #[serde(default, rename = "user")]
    pub users: Vec<UserEntry>,
}

impl UserFile {
    /// Parse and validate user file text
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: UserFile = toml::from_str(text).context("invalid user file")?;
        file.validate()?;
        Ok(file)
    }

    /// Read and validate a user file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read user file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Write the file as TOML
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self).context("failed to serialize user file")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("failed to write user file {}", path.display()))
    }

    /// A single sysop account to start from
    pub fn sample() -> Self {
        Self {
            users: vec![UserEntry {
                number: 1,
                username: "sysop".to_string(),
                password: "change-me".to_string(),
                level: MAX_PRIVILEGE_LEVEL,
            }],
        }
    }

    /// Check every record and the uniqueness of numbers and names
    pub fn validate(&self) -> Result<()> {
        let mut numbers = HashSet::new();
        let mut names = HashSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                bail!("account {} has an empty username", user.number);
            }
            if user.username.chars().count() > MAX_USERNAME_LEN {
                bail!(
                    "username {} is longer than {} characters",
                    user.username,
                    MAX_USERNAME_LEN
                );
            }
            if user.level > MAX_PRIVILEGE_LEVEL {
                bail!(
                    "account {} has level {}, the highest is {}",
                    user.number,
                    user.level,
                    MAX_PRIVILEGE_LEVEL
                );
            }
            if !numbers.insert(user.number) {
                bail!("account number {} appears more than once", user.number);
            }
            if !names.insert(user.username.as_str()) {
                bail!("username {} appears more than once", user.username);
            }
        }
        Ok(())
    }

    /// Build the in-memory directory the server consults
    pub fn into_directory(self) -> MemoryDirectory {
        self.users
            .into_iter()
            .fold(MemoryDirectory::new(), |dir, user| {
                dir.with_user(user.number, user.username, user.password, user.level)
            })
    }
}
