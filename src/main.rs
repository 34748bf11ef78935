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

//! Peripheral Hub daemon (phd)
//!
//! Runs one peripheral against simulated hardware. Requests arrive as JSON
//! lines on stdin and are answered on stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use peripheral_hub::config::{self, CONFIG_ENV};
use peripheral_hub::logger::{self, LOG_ENV};
use peripheral_hub::{intake, worker::Worker};
use ph_core::{Manager, MemoryStateStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("phd {} - Peripheral Hub control daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    phd [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Config file (JSON)");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    {:<20}Config file when --config is not given", CONFIG_ENV);
    eprintln!("    {:<20}Log level (trace, debug, info, warn, error)", LOG_ENV);
}

enum Cli {
    Run { config: Option<PathBuf> },
    Exit,
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut config = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(Cli::Exit);
            }
            "-v" | "--version" => {
                println!("phd {}", VERSION);
                return Ok(Cli::Exit);
            }
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).ok_or_else(|| anyhow!("--config requires a path argument"))?;
                config = Some(PathBuf::from(path));
            }
            arg => {
                print_help();
                return Err(anyhow!("Unknown argument: {}", arg));
            }
        }
        i += 1;
    }
    Ok(Cli::Run { config })
}

fn main() -> Result<()> {
    // PHASE 1: Arguments
    let args: Vec<String> = std::env::args().collect();
    let explicit_config = match parse_args(&args)? {
        Cli::Run { config } => config,
        Cli::Exit => return Ok(()),
    };

    // PHASE 2: Logging
    let log_level = logger::init_logging();
    info!("STARTUP: phd {} starting", VERSION);
    info!("STARTUP: Log level: {}", log_level);

    // PHASE 3: Configuration
    let (hub_config, source) =
        config::load_or_default(explicit_config.as_deref()).context("Failed to load configuration")?;
    match &source {
        Some(path) => info!("STARTUP: Config: {}", path.display()),
        None => info!("STARTUP: No config file found, using the demo light driver"),
    }

    // PHASE 4: Peripheral
    let simulation = hub_config.simulation.clone();
    let store = MemoryStateStore::new();
    let manager = Manager::new(hub_config.peripheral, store.clone(), move |peripheral| {
        Ok(simulation.driver_for(peripheral))
    })
    .context("Invalid peripheral descriptors")?;
    let producer = manager.producer();
    info!("STARTUP: Peripheral: {}", manager.name());

    // PHASE 5: Scheduler
    let worker = Worker::spawn(manager).context("Failed to start scheduler thread")?;

    // PHASE 6: Signal handlers
    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
        signal.notify_one();
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    // PHASE 7: Request intake until stdin closes or a signal arrives
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(async {
        tokio::select! {
            result = intake::serve(tokio::io::stdin(), tokio::io::stdout(), &producer) => match result {
                Ok(answered) => info!("Input closed after {} requests", answered),
                Err(e) => error!("Request intake failed: {}", e),
            },
            _ = shutdown.notified() => {}
        }
    });
    // stdin reads block a runtime thread that would otherwise never finish
    runtime.shutdown_background();

    // PHASE 8: Shutdown
    let status = worker.status().clone();
    worker.stop();
    worker.join().map_err(|_| anyhow!("Scheduler thread panicked"))?;

    info!(
        "SHUTDOWN: {} mode={} health={}",
        producer.peripheral(),
        status.mode(),
        status.health()
    );
    match serde_json::to_string(&store.snapshot()) {
        Ok(json) => debug!("SHUTDOWN: Final state: {}", json),
        Err(e) => warn!("Could not serialize final state: {}", e),
    }

    Ok(())
}
