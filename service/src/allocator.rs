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

//! Line number allocation
//!
//! The pool is a bitset over `1..=99`. It is not synchronized on its own; the
//! [`ChatRegistry`](crate::ChatRegistry) owns it behind the same lock as the
//! session map so that taking a slot and registering its owner happen as one
//! step.

use crate::{AllocError, LineNumber};

/// Bounded pool of ephemeral line numbers with lowest-first allocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineNumberPool {
    // Bit `n` set means line number `n` is taken; bit 0 is never used.
    taken: u128,
}

impl LineNumberPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    fn bit(line: LineNumber) -> u128 {
        1u128 << line.get()
    }

    /// Take the lowest free line number
    pub fn acquire(&mut self) -> Result<LineNumber, AllocError> {
        let line = LineNumber::all()
            .find(|line| !self.is_taken(*line))
            .ok_or(AllocError::Exhausted)?;
        self.taken |= Self::bit(line);
        Ok(line)
    }

    /// Free a line number
    ///
    /// Releasing a free slot is a no-op. Returns whether the slot was taken.
    pub fn release(&mut self, line: LineNumber) -> bool {
        let was_taken = self.is_taken(line);
        self.taken &= !Self::bit(line);
        was_taken
    }

    /// Check whether a line number is currently held
    pub fn is_taken(&self, line: LineNumber) -> bool {
        self.taken & Self::bit(line) != 0
    }

    /// Number of line numbers held
    pub fn in_use(&self) -> usize {
        self.taken.count_ones() as usize
    }

    /// Number of line numbers still free
    pub fn available(&self) -> usize {
        LineNumber::COUNT - self.in_use()
    }

    /// Check whether every line number is held
    pub fn is_exhausted(&self) -> bool {
        self.available() == 0
    }
}
