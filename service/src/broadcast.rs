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

//! Fan-out of rendered lines to sessions

use crate::{
    Channel, ChatRegistry, ConnectionId, DeliveryError, LineNumber, ServerMetrics, SessionWriter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use varidial_linecodec::OutputFrame;

/// Result of a broadcast operation
#[derive(Debug, Clone, Default)]
pub struct BroadcastResult {
    /// Total number of sessions attempted
    pub total: usize,
    /// Number of successful deliveries
    pub succeeded: usize,
    /// Number of failed deliveries
    pub failed: usize,
    /// Deliveries that were dropped and why
    pub errors: Vec<(ConnectionId, DeliveryError)>,
}

impl BroadcastResult {
    /// Check if all deliveries succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Get the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}

/// Delivers frames to the sessions in the registry
///
/// Every peer gets its own delivery bounded by the delivery timeout, and all
/// deliveries run concurrently, so one stalled peer costs the sender at most
/// one timeout. Misses are logged and counted, never reported to the sender.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ChatRegistry>,
    metrics: Arc<ServerMetrics>,
    delivery_timeout: Duration,
}

impl Broadcaster {
    /// Create a broadcaster over a registry
    pub fn new(
        registry: Arc<ChatRegistry>,
        metrics: Arc<ServerMetrics>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metrics,
            delivery_timeout,
        }
    }

    /// Deliver to every session on a channel, the sender included
    pub async fn broadcast(&self, channel: Channel, frames: Vec<OutputFrame>) -> BroadcastResult {
        let targets = self.registry.entries_on_channel(channel);
        trace!(channel = %channel, targets = targets.len(), "Broadcasting to channel");
        self.metrics.broadcast();
        self.fan_out(targets, frames).await
    }

    /// Deliver to every registered session regardless of channel
    pub async fn broadcast_all(&self, frames: Vec<OutputFrame>) -> BroadcastResult {
        let targets = self.registry.all_writers();
        trace!(targets = targets.len(), "Broadcasting to all sessions");
        self.metrics.broadcast();
        self.fan_out(targets, frames).await
    }

    /// Deliver to the session holding a line number
    ///
    /// Returns `false` when the line is not held; nothing is sent then.
    pub async fn send_to(&self, line: LineNumber, frames: Vec<OutputFrame>) -> bool {
        let Some(entry) = self.registry.entry_for_line(line) else {
            trace!(line = %line, "No session on line, dropping");
            return false;
        };
        if let Err(e) = entry.writer.deliver(frames, self.delivery_timeout).await {
            debug!(line = %line, connection_id = %entry.connection, error = %e, "Private delivery dropped");
            self.metrics.delivery_failed(1);
        }
        true
    }

    async fn fan_out(&self, targets: Vec<SessionWriter>, frames: Vec<OutputFrame>) -> BroadcastResult {
        let mut result = BroadcastResult {
            total: targets.len(),
            ..Default::default()
        };

        let limit = self.delivery_timeout;
        let sends = targets.into_iter().map(|writer| {
            let frames = frames.clone();
            async move { (writer.id(), writer.deliver(frames, limit).await) }
        });
        let outcomes = futures_util::future::join_all(sends).await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    debug!(connection_id = %id, error = %e, "Delivery dropped");
                    result.failed += 1;
                    result.errors.push((id, e));
                }
            }
        }
        if result.failed > 0 {
            self.metrics.delivery_failed(result.failed as u64);
        }
        result
    }
}
