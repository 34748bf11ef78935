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

//! Peripheral Hub - control daemon for fan hubs and LED drivers
//!
//! This library wires the control core to the outside world: config file
//! loading, log setup, the scheduler thread and the JSON-lines request intake.

pub mod config;
pub mod intake;
pub mod logger;
pub mod worker;
