//! Configuration file loading.

use cap_std::{ambient_authority, fs::Dir};
use kiln::config::{ConfigError, CoordinatorConfig};
use rstest::rstest;
use tempfile::TempDir;

use super::helpers::CONFIG;

#[rstest]
fn loads_configuration_from_directory() -> Result<(), eyre::Report> {
    let temp = TempDir::new()?;
    std::fs::write(temp.path().join("kiln.json"), CONFIG)?;
    let dir = Dir::open_ambient_dir(temp.path(), ambient_authority())?;

    let config = CoordinatorConfig::load(&dir, "kiln.json")?;

    eyre::ensure!(config.project.pack_root == "kiln", "pack root");
    eyre::ensure!(config.batch.len() == 3, "batch targets");
    Ok(())
}

#[rstest]
fn missing_file_is_an_io_error() -> Result<(), eyre::Report> {
    let temp = TempDir::new()?;
    let dir = Dir::open_ambient_dir(temp.path(), ambient_authority())?;

    let result = CoordinatorConfig::load(&dir, "absent.json");

    eyre::ensure!(matches!(result, Err(ConfigError::Io(_))), "expected I/O error");
    Ok(())
}

#[rstest]
fn malformed_file_is_a_parse_error() -> Result<(), eyre::Report> {
    let temp = TempDir::new()?;
    std::fs::write(temp.path().join("kiln.json"), "{ not json")?;
    let dir = Dir::open_ambient_dir(temp.path(), ambient_authority())?;

    let result = CoordinatorConfig::load(&dir, "kiln.json");

    eyre::ensure!(matches!(result, Err(ConfigError::Parse(_))), "expected parse error");
    Ok(())
}
