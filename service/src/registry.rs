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

//! Shared chat state
//!
//! The registry is the single source of truth for who is online. The session
//! map and the line number pool live behind one mutex so that every
//! read-modify-write sequence over them, in particular acquire-then-register
//! and deregister-then-release, is atomic.

use crate::{
    Channel, ConnectionId, LineNumber, LineNumberPool, RegisterError, RosterEntry, SessionWriter,
    UserRecord,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, trace};

/// A logged-in session as seen by the rest of the room
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Unique username (registry key)
    pub username: String,
    /// Line number held for the life of the session
    pub line: LineNumber,
    /// Channel the session is on
    pub channel: Channel,
    /// Privilege level copied from the user record
    pub level: u8,
    /// Connection that owns this entry
    pub connection: ConnectionId,
    /// Handle to the session's outbound queue
    pub writer: SessionWriter,
}

#[derive(Debug, Default)]
struct RegistryState {
    pool: LineNumberPool,
    sessions: HashMap<String, SessionEntry>,
}

/// Process-wide registry of active sessions
#[derive(Debug, Default)]
pub struct ChatRegistry {
    state: Mutex<RegistryState>,
}

impl ChatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an authenticated user
    ///
    /// Checks for an existing session, takes the lowest free line number and
    /// inserts the entry on channel 1, all under one lock. A rejected
    /// registration changes nothing.
    pub fn register(
        &self,
        user: &UserRecord,
        connection: ConnectionId,
        writer: SessionWriter,
    ) -> Result<LineNumber, RegisterError> {
        let mut state = self.state.lock();
        if state.sessions.contains_key(&user.username) {
            return Err(RegisterError::DuplicateUser(user.username.clone()));
        }
        let line = state.pool.acquire()?;
        state.sessions.insert(
            user.username.clone(),
            SessionEntry {
                username: user.username.clone(),
                line,
                channel: Channel::DEFAULT,
                level: user.level,
                connection,
                writer,
            },
        );
        debug!(username = %user.username, line = %line, "Session registered");
        Ok(line)
    }

    /// Remove a session and free its line number
    ///
    /// Returns the removed entry, or `None` if the user was not registered,
    /// which makes repeated cleanup harmless.
    pub fn deregister(&self, username: &str) -> Option<SessionEntry> {
        let mut state = self.state.lock();
        let entry = state.sessions.remove(username)?;
        state.pool.release(entry.line);
        debug!(username = %username, line = %entry.line, "Session deregistered");
        Some(entry)
    }

    /// Remove whatever entry a connection holds and release its line
    ///
    /// Used when a session task ended without running its own cleanup.
    pub fn deregister_connection(&self, connection: ConnectionId) -> Option<SessionEntry> {
        let mut state = self.state.lock();
        let username = state
            .sessions
            .values()
            .find(|entry| entry.connection == connection)
            .map(|entry| entry.username.clone())?;
        let entry = state.sessions.remove(&username)?;
        state.pool.release(entry.line);
        debug!(
            username = %username,
            line = %entry.line,
            connection_id = %connection,
            "Orphaned session deregistered"
        );
        Some(entry)
    }

    /// Move a session to another channel
    ///
    /// Returns the previous channel, or `None` if the user is not registered.
    pub fn update_channel(&self, username: &str, channel: Channel) -> Option<Channel> {
        let mut state = self.state.lock();
        let entry = state.sessions.get_mut(username)?;
        let previous = std::mem::replace(&mut entry.channel, channel);
        trace!(username = %username, from = %previous, to = %channel, "Channel changed");
        Some(previous)
    }

    /// Current channel of a session
    pub fn channel_of(&self, username: &str) -> Option<Channel> {
        self.state.lock().sessions.get(username).map(|e| e.channel)
    }

    /// Username holding a line number
    pub fn find(&self, line: LineNumber) -> Option<String> {
        self.state
            .lock()
            .sessions
            .values()
            .find(|e| e.line == line)
            .map(|e| e.username.clone())
    }

    /// Copy of the entry holding a line number
    pub fn entry_for_line(&self, line: LineNumber) -> Option<SessionEntry> {
        self.state
            .lock()
            .sessions
            .values()
            .find(|e| e.line == line)
            .cloned()
    }

    /// Online roster ordered by line number
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        let mut roster: Vec<RosterEntry> = self
            .state
            .lock()
            .sessions
            .values()
            .map(|e| RosterEntry {
                line: e.line,
                username: e.username.clone(),
                channel: e.channel,
            })
            .collect();
        roster.sort_by_key(|e| e.line);
        roster
    }

    /// Writers of every session on a channel
    pub fn entries_on_channel(&self, channel: Channel) -> Vec<SessionWriter> {
        self.state
            .lock()
            .sessions
            .values()
            .filter(|e| e.channel == channel)
            .map(|e| e.writer.clone())
            .collect()
    }

    /// Writers of every registered session
    pub fn all_writers(&self) -> Vec<SessionWriter> {
        self.state
            .lock()
            .sessions
            .values()
            .map(|e| e.writer.clone())
            .collect()
    }

    /// Check whether a user is online
    pub fn contains(&self, username: &str) -> bool {
        self.state.lock().sessions.contains_key(username)
    }

    /// Check whether a line number is held
    pub fn is_line_taken(&self, line: LineNumber) -> bool {
        self.state.lock().pool.is_taken(line)
    }

    /// Number of free line numbers
    pub fn available_lines(&self) -> usize {
        self.state.lock().pool.available()
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Check whether nobody is online
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the pool and the session map describe the same set
    pub fn is_consistent(&self) -> bool {
        let state = self.state.lock();
        state.pool.in_use() == state.sessions.len()
            && state.sessions.values().all(|e| state.pool.is_taken(e.line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllocError, outbound_channel};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn user(account: u32, name: &str, level: u8) -> UserRecord {
        UserRecord::new(account, name, level)
    }

    fn writer(id: u64) -> SessionWriter {
        outbound_channel(ConnectionId::new(id), 4).0
    }

    fn line(n: u8) -> LineNumber {
        LineNumber::new(n).unwrap()
    }

    #[test]
    fn test_register_assigns_lowest_line() {
        let registry = ChatRegistry::new();
        assert_eq!(
            registry.register(&user(100, "alice", 0), ConnectionId::new(1), writer(1)),
            Ok(line(1))
        );
        assert_eq!(
            registry.register(&user(200, "bob", 2), ConnectionId::new(2), writer(2)),
            Ok(line(2))
        );
        assert_eq!(registry.channel_of("alice"), Some(Channel::DEFAULT));
        assert_eq!(registry.find(line(2)), Some("bob".to_string()));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_duplicate_login_is_rejected_without_side_effects() {
        let registry = ChatRegistry::new();
        registry
            .register(&user(100, "alice", 0), ConnectionId::new(1), writer(1))
            .unwrap();
        let two = Channel::new(2).unwrap();
        registry.update_channel("alice", two);

        let result = registry.register(&user(100, "alice", 4), ConnectionId::new(9), writer(9));
        assert_eq!(result, Err(RegisterError::DuplicateUser("alice".to_string())));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.available_lines(), 98);
        let entry = registry.entry_for_line(line(1)).unwrap();
        assert_eq!(entry.connection, ConnectionId::new(1));
        assert_eq!(entry.channel, two);
        assert_eq!(entry.level, 0);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_deregister_releases_line_once() {
        let registry = ChatRegistry::new();
        registry
            .register(&user(100, "alice", 0), ConnectionId::new(1), writer(1))
            .unwrap();
        registry
            .register(&user(200, "bob", 0), ConnectionId::new(2), writer(2))
            .unwrap();

        let removed = registry.deregister("alice").unwrap();
        assert_eq!(removed.line, line(1));
        assert!(!registry.is_line_taken(line(1)));
        assert!(registry.deregister("alice").is_none());
        assert!(registry.is_line_taken(line(2)));

        // The freed slot is reused first
        assert_eq!(
            registry.register(&user(300, "carol", 1), ConnectionId::new(3), writer(3)),
            Ok(line(1))
        );
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_deregister_by_connection() {
        let registry = ChatRegistry::new();
        registry
            .register(&user(100, "alice", 0), ConnectionId::new(7), writer(7))
            .unwrap();
        registry
            .register(&user(200, "bob", 0), ConnectionId::new(8), writer(8))
            .unwrap();

        assert!(registry.deregister_connection(ConnectionId::new(9)).is_none());
        let removed = registry.deregister_connection(ConnectionId::new(7)).unwrap();
        assert_eq!(removed.username, "alice");
        assert!(!registry.contains("alice"));
        assert!(!registry.is_line_taken(line(1)));
        assert!(registry.deregister_connection(ConnectionId::new(7)).is_none());
        assert!(registry.deregister("alice").is_none());
        assert_eq!(registry.available_lines(), 98);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_channel_scoping() {
        let registry = ChatRegistry::new();
        registry
            .register(&user(1, "a", 0), ConnectionId::new(1), writer(1))
            .unwrap();
        registry
            .register(&user(2, "b", 0), ConnectionId::new(2), writer(2))
            .unwrap();
        registry
            .register(&user(3, "c", 0), ConnectionId::new(3), writer(3))
            .unwrap();
        let two = Channel::new(2).unwrap();

        assert_eq!(registry.update_channel("b", two), Some(Channel::DEFAULT));
        assert_eq!(registry.update_channel("nobody", two), None);

        let mut on_one: Vec<_> = registry
            .entries_on_channel(Channel::DEFAULT)
            .iter()
            .map(|w| w.id())
            .collect();
        on_one.sort();
        assert_eq!(on_one, vec![ConnectionId::new(1), ConnectionId::new(3)]);
        assert_eq!(registry.entries_on_channel(two).len(), 1);
        assert_eq!(registry.all_writers().len(), 3);
    }

    #[test]
    fn test_snapshot_is_ordered_by_line() {
        let registry = ChatRegistry::new();
        assert!(registry.snapshot().is_empty());
        for (i, name) in ["zed", "amy", "max"].iter().enumerate() {
            registry
                .register(&user(i as u32, name, 0), ConnectionId::new(i as u64), writer(i as u64))
                .unwrap();
        }
        registry.deregister("zed");
        registry
            .register(&user(10, "bea", 0), ConnectionId::new(10), writer(10))
            .unwrap();

        let roster: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|e| (e.line.get(), e.username))
            .collect();
        assert_eq!(
            roster,
            vec![
                (1, "bea".to_string()),
                (2, "amy".to_string()),
                (3, "max".to_string())
            ]
        );
    }

    #[test]
    fn test_exhaustion_rejects_hundredth_login() {
        let registry = ChatRegistry::new();
        for i in 0..99u32 {
            registry
                .register(&user(i, &format!("u{i}"), 0), ConnectionId::new(i as u64), writer(i as u64))
                .unwrap();
        }
        let late = user(500, "late", 0);
        assert_eq!(
            registry.register(&late, ConnectionId::new(500), writer(500)),
            Err(RegisterError::Exhausted(AllocError::Exhausted))
        );
        assert!(!registry.contains("late"));

        registry.deregister("u41");
        assert_eq!(
            registry.register(&late, ConnectionId::new(500), writer(500)),
            Ok(line(42))
        );
        let later = user(501, "later", 0);
        assert!(registry
            .register(&later, ConnectionId::new(501), writer(501))
            .is_err());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_concurrent_registration_never_shares_lines() {
        let registry = Arc::new(ChatRegistry::new());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut lines = Vec::new();
                    for i in 0..20u32 {
                        let id = t * 100 + i;
                        let name = format!("t{t}-{i}");
                        if let Ok(line) = registry.register(
                            &UserRecord::new(id, name.clone(), 0),
                            ConnectionId::new(id as u64),
                            outbound_channel(ConnectionId::new(id as u64), 1).0,
                        ) {
                            lines.push(line);
                            if i % 3 == 0 {
                                registry.deregister(&name);
                                lines.pop();
                            }
                        }
                    }
                    lines
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for line in handle.join().unwrap() {
                assert!(seen.insert(line), "line {line} assigned twice");
            }
        }
        assert_eq!(seen.len(), registry.len());
        assert!(registry.is_consistent());
    }
}
