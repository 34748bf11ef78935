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

use std::env;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (trace, debug, info, warn, error)
pub const LOG_ENV: &str = "PERIPHERAL_HUB_LOG";

const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter directive from the environment, or the default level
pub fn log_level() -> String {
    env::var(LOG_ENV)
        .ok()
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Install the global subscriber; logs go to stderr, stdout carries responses
///
/// Returns the filter in effect. Calling this twice keeps the first subscriber.
pub fn init_logging() -> String {
    let level = log_level();
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|e| {
        eprintln!("Invalid {} value '{}': {}, using {}", LOG_ENV, level, e, DEFAULT_LOG_LEVEL);
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    });

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();

    level
}
