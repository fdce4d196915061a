// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Helpers for locating and reading YAML configuration files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};

/// Returns the path if it is `Some` or the first of the default paths that exists.
pub fn path_or_defaults_if_exist(
    path: Option<impl AsRef<Path>>,
    defaults: &[PathBuf],
) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path.as_ref().to_path_buf());
    }
    let found = defaults.iter().find(|default| default.exists()).cloned();
    tracing::debug!(?found, "looked up default configuration paths");
    found
}

/// Returns the user's home directory joined with `relative`, if the home directory is known.
pub fn home_relative(relative: impl AsRef<Path>) -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(relative))
}

/// Reads and deserializes a YAML file.
pub fn load_from_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "reading from yaml file");
    let reader = fs::File::open(path)
        .with_context(|| format!("unable to load config from {}", path.display()))?;
    serde_yaml::from_reader(reader)
        .with_context(|| format!("unable to parse config from {}", path.display()))
}

/// Serializes `value` as YAML and writes it to `path`, creating parent directories as needed.
pub fn save_to_yaml<T: Serialize>(value: &T, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("unable to create directory {}", parent.display()))?;
    }
    let serialized = serde_yaml::to_string(value).context("unable to serialize config")?;
    fs::write(path, serialized)
        .with_context(|| format!("unable to write config to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde::Deserialize;
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        retries: u32,
    }

    #[test]
    fn explicit_path_wins_over_defaults() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let existing = dir.path().join("existing.yaml");
        fs::write(&existing, "")?;

        let explicit = dir.path().join("missing.yaml");
        let chosen = path_or_defaults_if_exist(Some(&explicit), std::slice::from_ref(&existing));
        assert_eq!(chosen, Some(explicit));
        Ok(())
    }

    #[test]
    fn first_existing_default_is_used() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let missing = dir.path().join("a.yaml");
        let second = dir.path().join("b.yaml");
        let third = dir.path().join("c.yaml");
        fs::write(&second, "")?;
        fs::write(&third, "")?;

        let chosen = path_or_defaults_if_exist(None::<&Path>, &[missing, second.clone(), third]);
        assert_eq!(chosen, Some(second));
        Ok(())
    }

    #[test]
    fn no_existing_default_yields_none() {
        let chosen =
            path_or_defaults_if_exist(None::<&Path>, &[PathBuf::from("/does/not/exist.yaml")]);
        assert!(chosen.is_none());
    }

    #[test]
    fn yaml_round_trips_through_files() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("sample.yaml");
        let sample = Sample {
            name: "testnet".to_owned(),
            retries: 3,
        };

        save_to_yaml(&sample, &path)?;
        let loaded: Sample = load_from_yaml(&path)?;
        assert_eq!(loaded, sample);
        Ok(())
    }

    #[test]
    fn reports_the_path_on_parse_errors() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("broken.yaml");
        fs::write(
            &path,
            indoc! {"
                name: [unterminated
            "},
        )?;

        let error = load_from_yaml::<Sample>(&path).expect_err("the file is not valid yaml");
        assert!(format!("{error:#}").contains("broken.yaml"));
        Ok(())
    }
}
