/*
 * This file is part of Peripheral Hub.
 *
 * Copyright (C) 2025 Peripheral Hub contributors
 *
 * Peripheral Hub is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Peripheral Hub is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Peripheral Hub. If not, see <https://www.gnu.org/licenses/>.
 */

//! Peripheral scheduler
//!
//! One dedicated thread owns the [`Manager`] and is the only place hardware
//! is touched. It walks the lifecycle (INIT, SETUP, then MANUAL/AUTO),
//! dispatches queued commands in order and runs a monitor pass whenever the
//! sampling interval has elapsed. In ERROR it only waits for a shutdown.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use ph_core::constants::timing::IDLE_POLL;
use ph_core::{Command, CommandQueue, Driver, Manager, Mode, PeripheralLifecycle, PeripheralStatus, StateStore};

/// Handle on the scheduler thread
pub struct Worker {
    handle: JoinHandle<()>,
    queue: CommandQueue,
    status: PeripheralStatus,
}

impl Worker {
    /// Move the manager onto its own thread and start the lifecycle
    pub fn spawn<D, S>(manager: Manager<D, S>) -> io::Result<Self>
    where
        D: Driver + Send + 'static,
        S: StateStore + Send + 'static,
    {
        let queue = manager.queue().clone();
        let status = manager.status();
        let handle = thread::Builder::new()
            .name(format!("ph-{}", manager.name()))
            .spawn(move || {
                let mut manager = manager;
                run(&mut manager);
            })?;

        Ok(Self { handle, queue, status })
    }

    pub fn status(&self) -> &PeripheralStatus {
        &self.status
    }

    /// Ask the scheduler to shut the peripheral down
    ///
    /// Goes through the queue so a running sequence stops at its next checkpoint.
    pub fn stop(&self) {
        self.queue.push(Command::Shutdown);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

/// Scheduler loop; returns once the peripheral reached SHUTDOWN
pub fn run<D: Driver, S: StateStore>(manager: &mut Manager<D, S>) {
    let interval = manager.config().timing.sampling_interval();
    let mut last_sync: Option<Instant> = None;

    info!(peripheral = %manager.name(), "Scheduler started");

    loop {
        match manager.mode() {
            Mode::Shutdown => break,
            Mode::Init | Mode::Setup => {
                if manager.initialize().is_ok() && manager.setup().is_ok() {
                    last_sync = None;
                }
            }
            Mode::Error => {
                // no hardware work until someone asks for a shutdown
                if let Some(command) = manager.queue().pop_timeout(IDLE_POLL) {
                    manager.dispatch(command);
                }
            }
            Mode::Manual | Mode::Auto => {
                if manager.dispatch_next() {
                    continue;
                }

                let due = last_sync.map_or(Duration::ZERO, |t| interval.saturating_sub(t.elapsed()));
                if due.is_zero() {
                    if let Err(e) = manager.update() {
                        warn!(peripheral = %manager.name(), error = %e, "Monitor pass failed");
                    }
                    last_sync = Some(Instant::now());
                    continue;
                }

                if let Some(command) = manager.queue().pop_timeout(due.min(IDLE_POLL)) {
                    manager.dispatch(command);
                }
            }
        }
    }

    debug!(peripheral = %manager.name(), "Scheduler stopped");
}
