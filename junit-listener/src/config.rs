// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for junit-listener.
//!
//! Configuration is layered: the built-in defaults in `default-config.toml`, then an optional
//! TOML file. Command-line overrides are applied on top of the result by the caller.

use crate::errors::ConfigParseError;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Overall configuration for junit-listener.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListenerConfig {
    /// Where and how the report is written.
    pub report: ReportConfig,

    /// Overrides for the environment properties.
    #[serde(default)]
    pub properties: PropertiesConfig,
}

impl ListenerConfig {
    /// The default location of the config file, relative to the current directory.
    pub const CONFIG_PATH: &'static str = ".config/junit-listener.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config, layering `config_file` over the defaults.
    ///
    /// If `config_file` is `None`, the file at [`Self::CONFIG_PATH`] under `root` is used if it
    /// exists. An explicitly specified config file must exist.
    pub fn from_sources(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, required) = match config_file {
            Some(config_file) => (config_file.to_owned(), true),
            None => (root.join(Self::CONFIG_PATH), false),
        };
        let builder = Self::make_default_config()
            .add_source(File::new(config_file.as_str(), FileFormat::Toml).required(required));

        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|error| ConfigParseError::new(Some(config_file.clone()), error))?;
        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in {config_file}: {}",
                unknown.iter().join(", ")
            );
        }

        Ok(config)
    }

    /// Returns the default config, with no overrides.
    pub fn default_config() -> Self {
        let (config, unknown) = Self::build_and_deserialize_config(&Self::make_default_config())
            .unwrap_or_else(|error| panic!("default config is always valid: {error}"));

        // Make sure there aren't any unknown keys in the default config, since it is
        // embedded/shipped with this binary.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.iter().join(", ")
            );
        }
        config
    }

    /// Overrides the result file, e.g. from the command line.
    pub fn set_result_file(&mut self, result_file: impl Into<Utf8PathBuf>) -> &mut Self {
        self.report.result_file = Some(result_file.into());
        self
    }

    /// Serializes this config as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigError> {
        let config = builder.build_cloned()?;

        let mut ignored = BTreeSet::new();
        let config: Self = serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        })?;

        Ok((config, ignored))
    }
}

/// Configuration for the report destination.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    /// The preferred file to write the report to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_file: Option<Utf8PathBuf>,

    /// Files to try, in order, if the result file can't be written to.
    #[serde(default)]
    pub fallback_paths: Vec<Utf8PathBuf>,

    /// The directory unique report files are created in.
    pub dir: Utf8PathBuf,

    /// The prefix for unique report files.
    pub file_prefix: String,

    /// Overrides the suite name passed in by the test runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_name: Option<String>,
}

/// Overrides for the environment properties written to the report.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PropertiesConfig {
    /// The device manufacturer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    /// The device model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The API level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn write_config(contents: &str) -> Utf8TempDir {
        let dir = Utf8TempDir::new().unwrap();
        let config_path = dir.path().join(ListenerConfig::CONFIG_PATH);
        fs_err::create_dir_all(config_path.parent().unwrap()).unwrap();
        fs_err::write(&config_path, contents).unwrap();
        dir
    }

    #[test]
    fn default_config_is_valid() {
        let config = ListenerConfig::default_config();
        assert_eq!(config.report.result_file, None);
        assert!(config.report.fallback_paths.is_empty());
        assert_eq!(config.report.dir, "target/junit");
        assert_eq!(config.report.file_prefix, "report");
        assert_eq!(config.report.suite_name, None);
        assert_eq!(config.properties.manufacturer, None);
    }

    #[test]
    fn missing_default_file_is_fine() {
        let dir = Utf8TempDir::new().unwrap();
        let config = ListenerConfig::from_sources(dir.path(), None).unwrap();
        assert_eq!(config.report.dir, "target/junit");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = Utf8TempDir::new().unwrap();
        let config_file = dir.path().join("does-not-exist.toml");
        let error = ListenerConfig::from_sources(dir.path(), Some(&config_file)).unwrap_err();
        assert_eq!(error.config_file(), Some(&config_file));
    }

    #[test_case(
        indoc! {r#"
            [report]
            result-file = "out/results.xml"
            fallback-paths = ["/sdcard/results.xml", "/tmp/results.xml"]
        "#},
        Some("out/results.xml"),
        &["/sdcard/results.xml", "/tmp/results.xml"],
        "target/junit"

        ; "result file and fallbacks"
    )]
    #[test_case(
        indoc! {r#"
            [report]
            dir = "reports"
            file-prefix = "shard"
        "#},
        None,
        &[],
        "reports"

        ; "dir only"
    )]
    fn report_config(
        contents: &str,
        result_file: Option<&str>,
        fallback_paths: &[&str],
        dir: &str,
    ) {
        let workspace = write_config(contents);
        let config = ListenerConfig::from_sources(workspace.path(), None).unwrap();

        assert_eq!(config.report.result_file.as_deref(), result_file.map(Utf8Path::new));
        assert_eq!(
            config.report.fallback_paths,
            fallback_paths
                .iter()
                .map(Utf8PathBuf::from)
                .collect::<Vec<_>>()
        );
        assert_eq!(config.report.dir, dir);
    }

    #[test]
    fn properties_config() {
        let workspace = write_config(indoc! {r#"
            [properties]
            manufacturer = "Google"
            api-level = "34"
        "#});
        let config = ListenerConfig::from_sources(workspace.path(), None).unwrap();
        assert_eq!(config.properties.manufacturer.as_deref(), Some("Google"));
        assert_eq!(config.properties.model, None);
        assert_eq!(config.properties.api_level.as_deref(), Some("34"));
    }

    #[test]
    fn unknown_keys_are_collected() {
        let workspace = write_config(indoc! {r#"
            [report]
            reslt-file = "typo.xml"

            [colors]
            enabled = true
        "#});
        let config_file = workspace.path().join(ListenerConfig::CONFIG_PATH);
        let builder = ListenerConfig::make_default_config()
            .add_source(File::new(config_file.as_str(), FileFormat::Toml));
        let (config, unknown) = ListenerConfig::build_and_deserialize_config(&builder).unwrap();

        assert_eq!(config.report.result_file, None);
        assert_eq!(
            unknown.into_iter().collect::<Vec<_>>(),
            vec!["colors".to_owned(), "report.reslt-file".to_owned()]
        );
    }

    #[test]
    fn invalid_type_is_an_error() {
        let workspace = write_config(indoc! {r#"
            [report]
            fallback-paths = "not-a-list"
        "#});
        let error = ListenerConfig::from_sources(workspace.path(), None).unwrap_err();
        assert_eq!(
            error.config_file(),
            Some(&workspace.path().join(ListenerConfig::CONFIG_PATH))
        );
    }

    #[test]
    fn cli_override_and_toml() {
        let mut config = ListenerConfig::default_config();
        config.set_result_file("cli/results.xml");
        let toml = config.to_toml().unwrap();
        assert!(toml.contains(r#"result-file = "cli/results.xml""#), "{toml}");
        assert!(toml.contains(r#"file-prefix = "report""#), "{toml}");
    }
}
