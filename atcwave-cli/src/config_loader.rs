//! Config file discovery — §6 "Configuration (not simulated)".
//!
//! With `--config <path>` given, that path is authoritative. Otherwise
//! search the current directory, then its two parents, for `config.yaml`.

use anyhow::{Context, Result};
use atcwave_core::Config;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.yaml";

pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().context("reading current directory")?;
    let mut candidate = cwd.clone();
    for _ in 0..3 {
        let file = candidate.join(CONFIG_FILENAME);
        if file.exists() {
            return Ok(file);
        }
        if !candidate.pop() {
            break;
        }
    }

    anyhow::bail!(
        "no {CONFIG_FILENAME} found in {} or its two parent directories",
        cwd.display()
    )
}

pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = locate(explicit)?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_an_error() {
        let result = locate(Some(Path::new("/nonexistent/config.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn finds_config_in_current_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "tts_binary: /bin/true").unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let found = locate(None);
        std::env::set_current_dir(previous).unwrap();
        assert!(found.is_ok());
    }
}
