//! FIFO command queue shared by producers and the dispatcher
//!
//! Unbounded, multi-producer, single-consumer. Besides carrying work, the
//! queue is the only cancellation signal in the system: a running sequence
//! stops as soon as it observes the queue non-empty.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::command::Command;

#[derive(Default)]
struct Shared {
    commands: Mutex<VecDeque<Command>>,
    available: Condvar,
}

/// Cloneable handle to one command queue
#[derive(Clone, Default)]
pub struct CommandQueue {
    shared: Arc<Shared>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        self.shared.commands.lock().push_back(command);
        self.shared.available.notify_one();
    }

    /// Oldest pending command, if any
    pub fn pop(&self) -> Option<Command> {
        self.shared.commands.lock().pop_front()
    }

    /// Oldest pending command, waiting up to `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Command> {
        let mut commands = self.shared.commands.lock();
        if commands.is_empty() {
            self.shared.available.wait_for(&mut commands, timeout);
        }
        commands.pop_front()
    }

    /// Preemption checkpoint
    pub fn is_empty(&self) -> bool {
        self.shared.commands.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.shared.commands.lock().len()
    }

    /// Drop every pending command; returns how many were dropped
    pub fn clear(&self) -> usize {
        let mut commands = self.shared.commands.lock();
        let dropped = commands.len();
        commands.clear();
        dropped
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue").field("len", &self.len()).finish()
    }
}
