//! Constants and configuration defaults for Peripheral Hub
//!
//! Centralizes timing defaults, health scores and the fixed step tables used
//! by the actuation engine. Add new magic numbers here first.

use std::time::Duration;

/// Default timing values (overridable per peripheral through `TimingConfig`)
pub mod timing {
    use super::Duration;

    /// Monitor pass period
    pub const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 3_000;

    /// Time allowed for tachometer-enabled fans to spin up during SETUP
    pub const DEFAULT_FAN_SPINUP_GRACE_MS: u64 = 5_000;

    /// Pause between ramp steps (sunrise) and between fade ramps
    pub const DEFAULT_RAMP_STEP_DELAY_MS: u64 = 1;

    /// Simulated noon / midnight hold
    pub const DEFAULT_HOLD_MS: u64 = 500;

    /// Delay between orbit panels
    pub const DEFAULT_PANEL_PACING_MS: u64 = 500;

    /// Upper bound for any configured delay
    pub const MAX_DELAY_MS: u64 = 60_000;

    /// Scheduler idle wait when there is nothing to do
    pub const IDLE_POLL: Duration = Duration::from_millis(50);
}

/// Health score values
pub mod health {
    /// Everything verified
    pub const HEALTHY: f32 = 100.0;

    /// A tachometer-enabled fan could not be verified as spinning
    pub const FAN_UNVERIFIED: f32 = 60.0;

    /// Driver failure during init/setup/update
    pub const FAILED: f32 = 0.0;
}

/// Output percentage limits
pub mod output {
    pub const MIN_PERCENT: f32 = 0.0;
    pub const MAX_PERCENT: f32 = 100.0;

    /// Duty cycle written to tachometer-enabled fans before verification
    pub const SPINUP_DUTY_CYCLE: u8 = 100;
}

/// Sequence step tables
pub mod sequence {
    /// Fade up, exp(1.6)-shaped
    pub const FADE_UP_STEPS: [f32; 19] = [
        0.0, 1.0, 3.0, 5.0, 9.0, 13.0, 17.0, 22.0, 27.0, 33.0, 39.0, 46.0, 53.0, 60.0, 68.0, 76.0,
        84.0, 93.0, 100.0,
    ];

    /// Fade down, mirror of `FADE_UP_STEPS`
    pub const FADE_DOWN_STEPS: [f32; 19] = [
        100.0, 93.0, 84.0, 76.0, 68.0, 60.0, 53.0, 46.0, 39.0, 33.0, 27.0, 22.0, 17.0, 13.0, 9.0,
        5.0, 3.0, 1.0, 0.0,
    ];

    /// Channels that must be configured before sunrise/orbit are accepted
    pub const REQUIRED_CHANNELS: [&str; 6] = ["R", "FR", "WW", "CW", "G", "B"];

    /// Sunrise channel groups, in sunrise order (sunset runs them reversed)
    pub const SUNRISE_GROUPS: &[&[&str]] = &[&["FR"], &["R"], &["WW"], &["CW"], &["G", "B"]];

    /// Step delta for single-channel groups
    pub const SINGLE_GROUP_STEP_DELTA: u32 = 1;

    /// Step delta for multi-channel groups
    pub const PAIRED_GROUP_STEP_DELTA: u32 = 10;

    pub const STEPS_MIN: u32 = 0;
    pub const STEPS_MAX: u32 = 100;

    /// Channel lit on each panel during orbit
    pub const ORBIT_CHANNEL: &str = "R";

    /// Setpoint (percent) written to each orbit panel before translation
    pub const ORBIT_SETPOINT: f32 = 100.0;
}

/// State store variable names
pub mod variables {
    /// Actuator variable carrying the channel setpoint map
    pub const CHANNEL_SETPOINTS: &str = "channel_setpoints";
}

/// Configuration limits
pub mod limits {
    /// Maximum configuration file size (256KB)
    pub const MAX_CONFIG_FILE_SIZE: u64 = 256 * 1024;
}
