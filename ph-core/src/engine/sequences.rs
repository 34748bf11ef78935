//! Interruptible output sequences
//!
//! Fade, sunrise and orbit never finish on their own. Each one runs until a
//! preemption checkpoint observes a pending command, or until a driver call
//! fails. A checkpoint follows every output write and every wait, so the
//! latency of a preemption is bounded by one write (or one wait).
//!
//! Failures here are local to the sequence: the runner reports them and the
//! dispatcher logs them, but the peripheral mode is left alone.

use std::convert::Infallible;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use super::queue::CommandQueue;
use crate::constants::sequence::{
    FADE_DOWN_STEPS, FADE_UP_STEPS, ORBIT_CHANNEL, ORBIT_SETPOINT, PAIRED_GROUP_STEP_DELTA,
    SINGLE_GROUP_STEP_DELTA, STEPS_MAX, STEPS_MIN, SUNRISE_GROUPS,
};
use crate::data::{ChannelSetpoints, TimingConfig};
use crate::error::HubError;
use crate::hw::Driver;

/// Sequence selected by a dispatched command
#[derive(Debug, Clone, PartialEq)]
pub enum Sequence {
    Fade { channel: Option<String> },
    Sunrise,
    Orbit,
}

impl Sequence {
    pub fn name(&self) -> &'static str {
        match self {
            Sequence::Fade { .. } => "fade",
            Sequence::Sunrise => "sunrise",
            Sequence::Orbit => "orbit",
        }
    }
}

/// How a sequence ended
#[derive(Debug)]
pub enum SequenceOutcome {
    /// A newer command arrived
    Preempted,
    /// A driver call failed; remaining steps were skipped
    Aborted(HubError),
}

enum Stop {
    Preempted,
    Failed(HubError),
}

impl From<HubError> for Stop {
    fn from(e: HubError) -> Self {
        Stop::Failed(e)
    }
}

/// Borrowed view of the manager state a sequence may touch
pub struct SequenceRunner<'a, D: Driver + ?Sized> {
    peripheral: &'a str,
    driver: &'a mut D,
    queue: &'a CommandQueue,
    setpoints: &'a mut ChannelSetpoints,
    timing: &'a TimingConfig,
}

impl<'a, D: Driver + ?Sized> SequenceRunner<'a, D> {
    pub fn new(
        peripheral: &'a str,
        driver: &'a mut D,
        queue: &'a CommandQueue,
        setpoints: &'a mut ChannelSetpoints,
        timing: &'a TimingConfig,
    ) -> Self {
        Self {
            peripheral,
            driver,
            queue,
            setpoints,
            timing,
        }
    }

    /// Turn every output off, then loop `sequence` until preempted or failed
    pub fn run(mut self, sequence: &Sequence) -> SequenceOutcome {
        debug!(peripheral = %self.peripheral, sequence = sequence.name(), "Starting sequence");

        let result = self.reset_outputs().and_then(|_| match sequence {
            Sequence::Fade { channel } => self.fade(channel.as_deref()),
            Sequence::Sunrise => self.sunrise(),
            Sequence::Orbit => self.orbit(),
        });

        match result {
            Ok(never) => match never {},
            Err(Stop::Preempted) => SequenceOutcome::Preempted,
            Err(Stop::Failed(e)) => SequenceOutcome::Aborted(e),
        }
    }

    fn reset_outputs(&mut self) -> Result<(), Stop> {
        let outputs = self.driver.turn_off()?;
        self.setpoints.replace(outputs);
        Ok(())
    }

    fn fade(&mut self, channel: Option<&str>) -> Result<Infallible, Stop> {
        let channels: Vec<String> = match channel {
            Some(channel) => vec![channel.to_string()],
            None => self.driver.build_channel_outputs(0.0).into_keys().collect(),
        };
        if channels.is_empty() {
            return Err(HubError::unexpected("no channels to fade").into());
        }

        loop {
            for channel in &channels {
                self.ramp(channel, &FADE_UP_STEPS)?;
                self.pause(self.timing.ramp_step_delay())?;
                self.ramp(channel, &FADE_DOWN_STEPS)?;
                self.pause(self.timing.ramp_step_delay())?;
            }
        }
    }

    fn sunrise(&mut self) -> Result<Infallible, Stop> {
        loop {
            for group in SUNRISE_GROUPS {
                let delta = step_delta(group);
                for channel in group.iter() {
                    self.linear_ramp(channel, (STEPS_MIN..=STEPS_MAX).step_by(delta), STEPS_MAX)?;
                }
            }

            // noon
            self.pause(self.timing.hold())?;

            for group in SUNRISE_GROUPS.iter().rev() {
                let delta = step_delta(group);
                for channel in group.iter() {
                    self.linear_ramp(channel, (STEPS_MIN..=STEPS_MAX).rev().step_by(delta), STEPS_MIN)?;
                }
            }

            // midnight
            self.pause(self.timing.hold())?;
        }
    }

    fn orbit(&mut self) -> Result<Infallible, Stop> {
        let panels = self.driver.panels();
        if panels.is_empty() {
            return Err(HubError::unexpected("no panels to orbit").into());
        }

        loop {
            self.checkpoint()?;
            for panel in &panels {
                trace!(peripheral = %self.peripheral, panel = %panel, "Setting panel red");
                let channel_number = self.driver.get_channel_number(ORBIT_CHANNEL)?;
                let setpoint = self.driver.translate_setpoint(ORBIT_SETPOINT)?;
                // panel outputs are not channel setpoints
                self.driver.write_panel_output(panel, channel_number, setpoint)?;
                self.checkpoint()?;
                self.pause(self.timing.panel_pacing())?;
            }
        }
    }

    fn ramp(&mut self, channel: &str, steps: &[f32]) -> Result<(), Stop> {
        for &step in steps {
            self.write(channel, step)?;
        }
        Ok(())
    }

    /// Walk `steps`, then settle on `last` so coarse deltas still end exactly
    fn linear_ramp(&mut self, channel: &str, steps: impl Iterator<Item = u32>, last: u32) -> Result<(), Stop> {
        for step in steps {
            self.write(channel, step as f32)?;
            self.pause(self.timing.ramp_step_delay())?;
        }
        self.write(channel, last as f32)
    }

    fn write(&mut self, channel: &str, percent: f32) -> Result<(), Stop> {
        trace!(peripheral = %self.peripheral, channel, percent, "Setting channel output");
        self.driver.set_output(channel, percent)?;
        self.setpoints.set(channel, percent);
        self.checkpoint()
    }

    /// Blocking wait followed by a checkpoint
    fn pause(&self, duration: Duration) -> Result<(), Stop> {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
        self.checkpoint()
    }

    fn checkpoint(&self) -> Result<(), Stop> {
        if self.queue.is_empty() {
            Ok(())
        } else {
            Err(Stop::Preempted)
        }
    }
}

fn step_delta(group: &[&str]) -> usize {
    let delta = if group.len() == 1 {
        SINGLE_GROUP_STEP_DELTA
    } else {
        PAIRED_GROUP_STEP_DELTA
    };
    delta as usize
}
