use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use wattech_parser::{transformer_descriptor, LocationSalt};

pub const INPUT_DIR_ENV: &str = "INPUT_FOLDER";
pub const OUTPUT_DIR_ENV: &str = "PROCESSED_FOLDER";
pub const SALT_ENV: &str = "SENSORS_LOCATION_SALT";

/// Input and output file names inside the configured folders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub appliance_input: String,
    pub appliance_output: String,
    pub price_input: String,
    pub price_output: String,
    pub weather_input: String,
    pub weather_output: String,
    pub sensor_input: String,
    pub sensor_output: String,
}

impl Default for FileNames {
    fn default() -> Self {
        let input = |code: &str| {
            transformer_descriptor(code)
                .map(|d| d.default_input.to_string())
                .unwrap_or_default()
        };
        let output = |code: &str| {
            transformer_descriptor(code)
                .map(|d| d.default_output.to_string())
                .unwrap_or_default()
        };
        Self {
            appliance_input: input("appliance"),
            appliance_output: output("appliance"),
            price_input: input("price"),
            price_output: output("price"),
            weather_input: input("weather"),
            weather_output: output("weather"),
            sensor_input: input("sensor"),
            sensor_output: output("sensor"),
        }
    }
}

impl FileNames {
    /// Input and output names for a transformer code.
    pub fn for_code(&self, code: &str) -> Option<(&str, &str)> {
        match code {
            "appliance" => Some((self.appliance_input.as_str(), self.appliance_output.as_str())),
            "price" => Some((self.price_input.as_str(), self.price_output.as_str())),
            "weather" => Some((self.weather_input.as_str(), self.weather_output.as_str())),
            "sensor" => Some((self.sensor_input.as_str(), self.sensor_output.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub location_salt: LocationSalt,
    pub files: FileNames,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./sendToRaw/files/"),
            output_dir: PathBuf::from("./processed_data"),
            location_salt: LocationSalt::default(),
            files: FileNames::default(),
        }
    }
}

impl NormalizerConfig {
    /// Defaults, overlaid by the TOML file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Overlay values from the environment; `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(INPUT_DIR_ENV).filter(|v| !v.is_empty()) {
            self.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(salt) = lookup(SALT_ENV).filter(|v| !v.is_empty()) {
            self.location_salt = LocationSalt::new(salt);
        }
    }

    pub fn input_path(&self, code: &str) -> Option<PathBuf> {
        self.files
            .for_code(code)
            .map(|(input, _)| self.input_dir.join(input))
    }

    pub fn output_path(&self, code: &str) -> Option<PathBuf> {
        self.files
            .for_code(code)
            .map(|(_, output)| self.output_dir.join(output))
    }
}
