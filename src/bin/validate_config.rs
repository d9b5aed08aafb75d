//! Configuration Validation Binary
//!
//! Validates scholarfinder.yml before the service starts:
//! - Matching weights and thresholds are consistent
//! - Token settings are usable
//! - Reports missing notification channels as warnings

use anyhow::{Context, Result};
use std::path::PathBuf;

use scholarfinder::config::{Config, DEFAULT_CONFIG_PATH};

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SCHOLARFINDER_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    println!("=== Configuration Validator ===");
    if !path.exists() {
        println!("{:?} not found; checking built-in defaults", path);
    }

    let config = Config::load(&path).context("Failed to load configuration")?;
    let (errors, warnings) = config.validate();

    if errors.is_empty() && warnings.is_empty() {
        println!("✓ Configuration {:?} is valid", path);
        return Ok(());
    }

    if !errors.is_empty() {
        println!("\n❌ ERRORS (must fix):");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    if !warnings.is_empty() {
        println!("\n⚠️  WARNINGS:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    if !errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
