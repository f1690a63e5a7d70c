use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

mod config;
mod manager;
mod report;
mod worker;

use config::Args;
use manager::Manager;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    info!("Starting CLOCKWORK simulator...");

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install interrupt handler")?;

    let mut manager = Manager::new(&args, interrupted)?;
    manager.run()
}
