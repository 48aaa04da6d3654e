use super::CliError;
use crate::config::user_config_path;
use std::fs;
use std::path::{Path, PathBuf};

const SAMPLE_CONFIG: &str = include_str!("../../samples/sample-config.yml");

pub fn init(stdout: bool) -> Result<(), CliError> {
    if stdout {
        print!("{}", SAMPLE_CONFIG);
        return Ok(());
    }

    // Fall back to /etc/batchstore when the home config dir can't be created
    let config_path = user_config_path()
        .filter(|path| match path.parent() {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(()) => true,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/batchstore/config.yml");
                    false
                }
            },
            None => false,
        })
        .unwrap_or_else(|| PathBuf::from("/etc/batchstore/config.yml"));

    let written = write_sample(&config_path)?;
    println!("Config file written to {}", written.display());
    Ok(())
}

/// Write the sample config to `path`, refusing to overwrite an existing file.
pub fn write_sample(path: &Path) -> Result<PathBuf, CliError> {
    if path.exists() {
        return Err(CliError::ConfigExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, SAMPLE_CONFIG)?;

    Ok(path.to_path_buf())
}
