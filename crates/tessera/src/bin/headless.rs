//! # TESSERA Headless
//!
//! Runs the demo world without a window.
//!
//! ```bash
//! # Defaults
//! ./tessera_headless
//!
//! # From a config file, with verbose core logs
//! RUST_LOG=tessera_core=trace ./tessera_headless tessera.toml
//! ```

use std::process::ExitCode;

use tessera::{logger, HeadlessConfig, HeadlessError};

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "headless run failed");
            eprintln!("tessera_headless: {err}");
            ExitCode::FAILURE
        }
    }
}

fn real_main() -> Result<(), HeadlessError> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => HeadlessConfig::from_file(path)?,
        None => HeadlessConfig::default(),
    };
    logger::init(&config.log_filter)?;

    let stats = tessera::run(&config)?;
    println!(
        "frames={} living={} children={} expired={} spawned={} drawn={}",
        stats.frames, stats.living, stats.children, stats.expired, stats.spawned, stats.drawn
    );
    Ok(())
}
