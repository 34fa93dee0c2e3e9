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

//! User directory seam and authentication gateway

use crate::{AuthError, DirectoryError, UserRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Credential store consulted at login
///
/// Implementations answer `Ok(None)` for both an unknown account and a wrong
/// password, so callers cannot tell the two apart.
///
/// # Example
///
/// ```no_run
/// use varidial_service::{DirectoryError, UserDirectory, UserRecord};
/// use async_trait::async_trait;
///
/// struct Guest;
///
/// #[async_trait]
/// impl UserDirectory for Guest {
///     async fn lookup(
///         &self,
///         account: u32,
///         _password: &str,
///     ) -> Result<Option<UserRecord>, DirectoryError> {
///         Ok(Some(UserRecord::new(account, format!("guest{account}"), 0)))
///     }
/// }
/// ```
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Look up an account by number and password
    async fn lookup(
        &self,
        account: u32,
        password: &str,
    ) -> Result<Option<UserRecord>, DirectoryError>;
}

/// In-process directory backed by a map
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    users: HashMap<u32, (String, UserRecord)>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account, replacing any previous one with the same number
    pub fn with_user(
        mut self,
        account: u32,
        username: impl Into<String>,
        password: impl Into<String>,
        level: u8,
    ) -> Self {
        self.insert(account, username, password, level);
        self
    }

    /// Add an account in place
    pub fn insert(
        &mut self,
        account: u32,
        username: impl Into<String>,
        password: impl Into<String>,
        level: u8,
    ) {
        let record = UserRecord::new(account, username, level);
        self.users.insert(account, (password.into(), record));
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check whether the directory has no accounts
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn lookup(
        &self,
        account: u32,
        password: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self
            .users
            .get(&account)
            .filter(|(stored, _)| stored == password)
            .map(|(_, record)| record.clone()))
    }
}

/// Turns login answers into a user record
///
/// Performs exactly one directory lookup per attempt.
#[derive(Clone)]
pub struct AuthGateway {
    directory: Arc<dyn UserDirectory>,
}

impl AuthGateway {
    /// Create a gateway over a directory
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Validate an account number and password
    pub async fn authenticate(&self, account: u32, password: &str) -> Result<UserRecord, AuthError> {
        match self.directory.lookup(account, password).await {
            Ok(Some(record)) => {
                debug!(account, username = %record.username, "Credentials accepted");
                Ok(record)
            }
            Ok(None) => {
                debug!(account, "Credentials rejected");
                Err(AuthError::NotFound)
            }
            Err(e) => {
                warn!(account, error = %e, "User directory lookup failed");
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway").finish_non_exhaustive()
    }
}
