use std::fs::File;
use std::path::Path;

use anyhow::Result;
use simplelog::{Config, LevelFilter, WriteLogger};

pub fn init(log_file: &Path) -> Result<()> {
    WriteLogger::init(LevelFilter::Info, Config::default(), File::create(log_file)?)?;
    info!("logging initialized");
    Ok(())
}
