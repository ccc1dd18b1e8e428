// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment properties recorded alongside a test run.
//!
//! Exactly three properties are written to the report, in a fixed order: the device
//! manufacturer, the device model and the API level. Where those values come from is up to a
//! [`PropertyProvider`].

use crate::config::PropertiesConfig;

/// The name of the manufacturer property.
pub static MANUFACTURER_PROPERTY: &str = "device.manufacturer";

/// The name of the model property.
pub static MODEL_PROPERTY: &str = "device.model";

/// The name of the API level property.
pub static API_LEVEL_PROPERTY: &str = "device.apiLevel";

/// The environment a test run happened in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EnvironmentProperties {
    /// The device manufacturer.
    pub manufacturer: String,

    /// The device model.
    pub model: String,

    /// The API or OS version level.
    pub api_level: String,
}

impl EnvironmentProperties {
    /// Creates a new `EnvironmentProperties`.
    pub fn new(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        api_level: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            api_level: api_level.into(),
        }
    }

    /// Returns the properties as `(name, value)` pairs, in the order they're reported.
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            (MANUFACTURER_PROPERTY, self.manufacturer.as_str()),
            (MODEL_PROPERTY, self.model.as_str()),
            (API_LEVEL_PROPERTY, self.api_level.as_str()),
        ]
    }
}

/// Supplies the [`EnvironmentProperties`] for a run.
pub trait PropertyProvider {
    /// Returns the properties to attach to the report.
    fn properties(&self) -> EnvironmentProperties;
}

/// A [`PropertyProvider`] that always returns the same values.
#[derive(Clone, Debug, Default)]
pub struct StaticProperties(EnvironmentProperties);

impl StaticProperties {
    /// Creates a new `StaticProperties`.
    pub fn new(properties: EnvironmentProperties) -> Self {
        Self(properties)
    }
}

impl PropertyProvider for StaticProperties {
    fn properties(&self) -> EnvironmentProperties {
        self.0.clone()
    }
}

/// A [`PropertyProvider`] that describes the host this process is running on.
///
/// Without overrides, the manufacturer is the OS family (e.g. `unix`), the model is the CPU
/// architecture and the API level is the OS name. Each of these can be overridden through
/// config.
#[derive(Clone, Debug, Default)]
pub struct HostProperties {
    manufacturer: Option<String>,
    model: Option<String>,
    api_level: Option<String>,
}

impl HostProperties {
    /// Creates a new `HostProperties` with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `HostProperties` with overrides from config.
    pub fn from_config(config: &PropertiesConfig) -> Self {
        Self {
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
            api_level: config.api_level.clone(),
        }
    }
}

impl PropertyProvider for HostProperties {
    fn properties(&self) -> EnvironmentProperties {
        EnvironmentProperties {
            manufacturer: self
                .manufacturer
                .clone()
                .unwrap_or_else(|| std::env::consts::FAMILY.to_owned()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| std::env::consts::ARCH.to_owned()),
            api_level: self
                .api_level
                .clone()
                .unwrap_or_else(|| std::env::consts::OS.to_owned()),
        }
    }
}
