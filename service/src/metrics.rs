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

//! Lock-free metrics for the chat server
//!
//! Counters are kept as atomics for cheap snapshots and mirrored into the
//! `metrics` facade so an installed recorder can export them.

use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All metrics are stored as atomics and can be accessed concurrently
/// without locks. Use the `snapshot()` method to get a view of all metrics
/// at a point in time.
#[derive(Debug)]
pub struct ServerMetrics {
    // Connections
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,

    // Logins
    logins: AtomicU64,
    failed_logins: AtomicU64,
    rejected_logins: AtomicU64,
    active_sessions: AtomicU64,

    // Traffic
    messages_received: AtomicU64,
    broadcasts: AtomicU64,
    private_messages: AtomicU64,
    commands: AtomicU64,
    delivery_failures: AtomicU64,

    // Timing (stored as nanoseconds)
    total_connection_duration_ns: AtomicU64,

    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            logins: AtomicU64::new(0),
            failed_logins: AtomicU64::new(0),
            rejected_logins: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            private_messages: AtomicU64::new(0),
            commands: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            total_connection_duration_ns: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Connection tracking

    /// Record a new connection being opened
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        counter!("varidial.connections.total").increment(1);
        gauge!("varidial.connections.active").increment(1.0);
    }

    /// Record a connection being closed
    pub fn connection_closed(&self, duration: Duration) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.total_connection_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        gauge!("varidial.connections.active").decrement(1.0);
    }

    /// Record a connection refused at accept time
    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
        counter!("varidial.connections.rejected").increment(1);
    }

    /// Get the current number of open connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the total number of connections since server start
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    // Session tracking

    /// Record a successful login
    pub fn login(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        counter!("varidial.logins.total").increment(1);
        gauge!("varidial.sessions.active").increment(1.0);
    }

    /// Record a logged-in session ending
    pub fn logout(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
        gauge!("varidial.sessions.active").decrement(1.0);
    }

    /// Record bad credentials or a malformed account number
    pub fn login_failed(&self) {
        self.failed_logins.fetch_add(1, Ordering::Relaxed);
        counter!("varidial.logins.failed").increment(1);
    }

    /// Record a valid login refused by the registry
    pub fn login_rejected(&self) {
        self.rejected_logins.fetch_add(1, Ordering::Relaxed);
        counter!("varidial.logins.rejected").increment(1);
    }

    // Traffic tracking

    /// Record an inbound line
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a chat line fanned out to a channel
    pub fn broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        counter!("varidial.messages.broadcast").increment(1);
    }

    /// Record a delivered private message
    pub fn private_message(&self) {
        self.private_messages.fetch_add(1, Ordering::Relaxed);
        counter!("varidial.messages.private").increment(1);
    }

    /// Record a slash command
    pub fn command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Record peers that could not be reached
    pub fn delivery_failed(&self, count: u64) {
        self.delivery_failures.fetch_add(count, Ordering::Relaxed);
        counter!("varidial.delivery.failed").increment(count);
    }

    // Snapshot

    /// Get a snapshot of all metrics
    ///
    /// Counters are read individually, so a snapshot taken under load may
    /// mix values from slightly different instants.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            failed_logins: self.failed_logins.load(Ordering::Relaxed),
            rejected_logins: self.rejected_logins.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            private_messages: self.private_messages.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            avg_connection_duration: self.average_connection_duration(),
        }
    }

    fn average_connection_duration(&self) -> Duration {
        let total = self.total_connections.load(Ordering::Relaxed);
        if total == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_connection_duration_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / total)
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total connections since server start
    pub total_connections: u64,
    /// Current open connections
    pub active_connections: u64,
    /// Connections refused at the connection limit
    pub rejected_connections: u64,
    /// Successful logins
    pub logins: u64,
    /// Bad credentials or malformed account numbers
    pub failed_logins: u64,
    /// Valid logins refused (duplicate user, no free line number)
    pub rejected_logins: u64,
    /// Currently logged-in sessions
    pub active_sessions: u64,
    /// Inbound lines
    pub messages_received: u64,
    /// Chat lines fanned out
    pub broadcasts: u64,
    /// Private messages delivered
    pub private_messages: u64,
    /// Slash commands executed
    pub commands: u64,
    /// Peer deliveries that failed or timed out
    pub delivery_failures: u64,
    /// Server uptime
    pub uptime: Duration,
    /// Average connection duration
    pub avg_connection_duration: Duration,
}

impl MetricsSnapshot {
    /// Calculate inbound lines per second
    pub fn messages_received_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.messages_received as f64 / self.uptime.as_secs_f64()
    }

    /// Total login attempts that did not produce a session
    pub fn unsuccessful_logins(&self) -> u64 {
        self.failed_logins + self.rejected_logins
    }
}
