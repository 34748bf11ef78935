//! Single-consumer command dispatch
//!
//! Pops one command at a time and runs its handler to completion on the
//! calling thread. Handler failures never propagate: driver failures and
//! unexpected failures (panics included) put the peripheral in ERROR.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use super::command::Command;
use super::sequences::{Sequence, SequenceOutcome, SequenceRunner};
use crate::data::Mode;
use crate::error::{HubError, Result};
use crate::hw::{Driver, StateStore};
use crate::lifecycle::PeripheralLifecycle;
use crate::manager::Manager;

impl<D: Driver, S: StateStore> Manager<D, S> {
    /// Handle the oldest queued command; false when the queue was empty
    pub fn dispatch_next(&mut self) -> bool {
        match self.queue.pop() {
            Some(command) => {
                self.dispatch(command);
                true
            }
            None => false,
        }
    }

    /// Run every queued command, including ones queued while draining
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while self.dispatch_next() {
            handled += 1;
        }
        handled
    }

    pub fn dispatch(&mut self, command: Command) {
        let mode = self.status.mode();

        if mode.is_halted() && command != Command::Shutdown {
            warn!(
                peripheral = %self.config.name,
                mode = %mode,
                command = %command,
                "Discarding command, hardware is halted"
            );
            return;
        }

        let mode_free = matches!(command, Command::SwitchMode(_) | Command::Shutdown);
        if mode != Mode::Manual && !mode_free {
            error!(peripheral = %self.config.name, "Tried to {} from {} mode", command.name(), mode);
        }

        debug!(peripheral = %self.config.name, command = %command, "Dispatching");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&command)));
        let result = outcome.unwrap_or_else(|payload| Err(HubError::unexpected(panic_message(payload.as_ref()))));

        if let Err(e) = result {
            self.escalate(command.name(), &e);
        }
    }

    fn execute(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::TurnOn => {
                let outputs = self.driver_mut()?.turn_on()?;
                self.setpoints.replace(outputs);
                self.publish_setpoints();
            }
            Command::TurnOff => {
                let outputs = self.driver_mut()?.turn_off()?;
                self.setpoints.replace(outputs);
                self.publish_setpoints();
            }
            Command::SetChannel { channel, percent } => {
                self.driver_mut()?.set_output(channel, *percent)?;
                self.setpoints.set(channel.as_str(), *percent);
                self.publish_setpoints();
            }
            Command::Fade { channel } => self.run_sequence(Sequence::Fade {
                channel: channel.clone(),
            })?,
            Command::Sunrise => self.run_sequence(Sequence::Sunrise)?,
            Command::Orbit => self.run_sequence(Sequence::Orbit)?,
            Command::SwitchMode(mode) => {
                info!(peripheral = %self.config.name, from = %self.status.mode(), to = %mode, "Switching mode");
                self.status.set_mode(*mode);
            }
            Command::Shutdown => self.shutdown(),
        }
        Ok(())
    }

    fn run_sequence(&mut self, sequence: Sequence) -> Result<()> {
        let driver = self.driver.as_mut().ok_or(HubError::DriverNotInitialized)?;
        let outcome = SequenceRunner::new(
            &self.config.name,
            driver,
            &self.queue,
            &mut self.setpoints,
            &self.config.timing,
        )
        .run(&sequence);

        self.publish_setpoints();

        match outcome {
            SequenceOutcome::Preempted => {
                debug!(peripheral = %self.config.name, sequence = sequence.name(), "Sequence preempted");
            }
            SequenceOutcome::Aborted(e) if e.is_driver_failure() => {
                warn!(peripheral = %self.config.name, sequence = sequence.name(), error = %e, "Sequence aborted");
            }
            SequenceOutcome::Aborted(e) => {
                error!(peripheral = %self.config.name, sequence = sequence.name(), error = %e, "Sequence aborted");
            }
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ChannelOutputs, PeripheralConfig, TimingConfig};
    use crate::constants::variables::CHANNEL_SETPOINTS;
    use crate::hw::{MemoryStateStore, MockDriver, SimulatedDriver};
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn led() -> PeripheralConfig {
        let mut config = PeripheralConfig::new("led");
        config.channels = ["R", "FR", "WW", "CW", "G", "B"].iter().map(|c| c.to_string()).collect();
        config.timing = TimingConfig::immediate();
        config
    }

    fn manual(driver: MockDriver) -> (Manager<MockDriver, MemoryStateStore>, MemoryStateStore) {
        let store = MemoryStateStore::new();
        let mut slot = Some(driver);
        let mut manager = Manager::new(led(), store.clone(), move |_| {
            slot.take().ok_or(HubError::DriverNotInitialized)
        })
        .unwrap();
        manager.initialize().unwrap();
        manager.status.set_mode(Mode::Manual);
        (manager, store)
    }

    fn all_off() -> ChannelOutputs {
        ["R", "FR", "WW", "CW", "G", "B"].iter().map(|c| (c.to_string(), 0.0)).collect()
    }

    #[test]
    fn test_set_channel_updates_and_publishes() {
        let mut driver = MockDriver::new();
        driver
            .expect_set_output()
            .with(eq("R"), eq(50.0))
            .times(1)
            .returning(|_, _| Ok(()));

        let (mut manager, store) = manual(driver);
        manager.queue.push(Command::SetChannel { channel: "R".into(), percent: 50.0 });
        assert!(manager.dispatch_next());
        assert!(!manager.dispatch_next());

        assert_eq!(manager.setpoints().get("R"), Some(50.0));
        assert_eq!(store.peripheral_reported_actuator("led", CHANNEL_SETPOINTS), Some(json!({"R": 50.0})));
        assert_eq!(store.environment_reported_actuator(CHANNEL_SETPOINTS), Some(json!({"R": 50.0})));
    }

    #[test]
    fn test_driver_failure_sets_error_and_keeps_setpoints() {
        let mut driver = MockDriver::new();
        driver
            .expect_set_output()
            .returning(|_, _| Err(HubError::driver("set_output", "nack")));

        let (mut manager, _) = manual(driver);
        manager.setpoints.set("R", 10.0);
        manager.dispatch(Command::SetChannel { channel: "R".into(), percent: 80.0 });

        assert_eq!(manager.mode(), Mode::Error);
        assert_eq!(manager.health(), 0.0);
        assert_eq!(manager.setpoints().get("R"), Some(10.0));
    }

    #[test]
    fn test_unexpected_failure_sets_error() {
        let mut driver = MockDriver::new();
        driver
            .expect_turn_on()
            .returning(|| Err(HubError::unexpected("register map corrupted")));

        let (mut manager, _) = manual(driver);
        manager.dispatch(Command::TurnOn);

        assert_eq!(manager.mode(), Mode::Error);
        assert_eq!(manager.health(), 0.0);
    }

    #[test]
    fn test_handler_panic_is_caught() {
        let driver = SimulatedDriver::from_config(&led(), 22.0);
        driver.set_write_hook(|_, _| panic!("register map corrupted"));

        let mut manager = Manager::with_driver(led(), MemoryStateStore::new(), driver).unwrap();
        manager.initialize().unwrap();
        manager.status.set_mode(Mode::Manual);
        manager.dispatch(Command::SetChannel { channel: "R".into(), percent: 5.0 });

        assert_eq!(manager.mode(), Mode::Error);
        assert_eq!(manager.health(), 0.0);
        assert_eq!(manager.setpoints().get("R"), None);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "handler panicked: boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "handler panicked: bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }

    #[test]
    fn test_halted_mode_discards_commands() {
        let mut driver = MockDriver::new();
        driver.expect_turn_on().never();
        driver.expect_shutdown().times(1).returning(|| Ok(()));

        let (mut manager, _) = manual(driver);
        manager.status.fail();
        manager.queue.push(Command::TurnOn);
        manager.queue.push(Command::Shutdown);

        assert_eq!(manager.drain(), 2);
        assert_eq!(manager.mode(), Mode::Shutdown);
    }

    #[test]
    fn test_commands_run_in_fifo_order() {
        let mut driver = MockDriver::new();
        let mut order = mockall::Sequence::new();
        for percent in [10.0, 20.0, 30.0] {
            driver
                .expect_set_output()
                .with(eq("G"), eq(percent))
                .times(1)
                .in_sequence(&mut order)
                .returning(|_, _| Ok(()));
        }
        driver.expect_turn_off().times(1).in_sequence(&mut order).returning(|| Ok(all_off()));

        let (mut manager, _) = manual(driver);
        let producer = manager.producer();
        for raw in ["G,10", "G,20", "G,30"] {
            assert!(producer.set_channel(Some(raw)).is_accepted());
        }
        assert!(producer.turn_off().is_accepted());

        assert_eq!(manager.drain(), 4);
        assert_eq!(manager.setpoints().get("G"), Some(0.0));
        assert_eq!(manager.mode(), Mode::Manual);
    }

    #[test]
    fn test_new_command_preempts_running_fade() {
        let writes = Arc::new(AtomicUsize::new(0));
        let mut driver = MockDriver::new();
        driver.expect_turn_off().times(1).returning(|| Ok(all_off()));
        driver.expect_set_output().with(eq("WW"), mockall::predicate::always()).returning({
            let writes = writes.clone();
            move |_, _| {
                writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        driver
            .expect_set_output()
            .with(eq("B"), eq(75.0))
            .times(1)
            .returning(|_, _| Ok(()));

        let (mut manager, store) = manual(driver);
        let producer = manager.producer();
        assert!(producer.fade(Some("WW")).is_accepted());

        // queue a newer command from inside the fade once it is underway
        let queue = manager.queue.clone();
        let seen = writes.clone();
        let watcher = std::thread::spawn(move || {
            while seen.load(Ordering::SeqCst) < 25 {
                std::thread::yield_now();
            }
            queue.push(Command::SetChannel { channel: "B".into(), percent: 75.0 });
        });

        assert!(manager.dispatch_next());
        watcher.join().unwrap();

        assert!(writes.load(Ordering::SeqCst) >= 25);
        assert_eq!(manager.mode(), Mode::Manual);
        assert_eq!(manager.queue.len(), 1);
        assert!(store.peripheral_reported_actuator("led", CHANNEL_SETPOINTS).is_some());

        assert!(manager.dispatch_next());
        assert_eq!(manager.setpoints().get("B"), Some(75.0));
    }

    #[test]
    fn test_sequence_failure_is_local() {
        let mut driver = MockDriver::new();
        driver
            .expect_turn_off()
            .returning(|| Err(HubError::driver("turn_off", "bus busy")));

        let (mut manager, _) = manual(driver);
        manager.dispatch(Command::Sunrise);

        assert_eq!(manager.mode(), Mode::Manual);
        assert_eq!(manager.health(), 100.0);
    }

    #[test]
    fn test_switch_mode() {
        let (mut manager, _) = manual(MockDriver::new());
        manager.dispatch(Command::SwitchMode(Mode::Auto));
        assert_eq!(manager.mode(), Mode::Auto);
        assert_eq!(manager.producer().turn_on().status, 400);

        manager.dispatch(Command::SwitchMode(Mode::Manual));
        assert_eq!(manager.mode(), Mode::Manual);
    }
}
