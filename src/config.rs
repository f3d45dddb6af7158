use crate::errors::ConfigError;
use std::{env, path::PathBuf};

/// Candidate separators tried, in order, when the separator is auto-detected.
pub const AUTO_SEPARATORS: [u8; 4] = [b',', b';', b'\t', b' '];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparatorMode {
    Auto,
    Fixed(u8),
}

impl SeparatorMode {
    pub fn candidates(self) -> Vec<u8> {
        match self {
            SeparatorMode::Auto => AUTO_SEPARATORS.to_vec(),
            SeparatorMode::Fixed(sep) => vec![sep],
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let mode = match value {
            "" | "auto" => SeparatorMode::Auto,
            "tab" | "\\t" | "\t" => SeparatorMode::Fixed(b'\t'),
            "space" | " " => SeparatorMode::Fixed(b' '),
            "semicolon" => SeparatorMode::Fixed(b';'),
            "comma" => SeparatorMode::Fixed(b','),
            other if other.len() == 1 && other.is_ascii() => SeparatorMode::Fixed(other.as_bytes()[0]),
            other => {
                return Err(ConfigError::Invalid {
                    var: "TREE_CSV_SEPARATOR",
                    value: other.to_string(),
                    expected: "auto, tab, space, semicolon, comma or a single ASCII character",
                });
            }
        };
        Ok(mode)
    }
}

/// What happens to rows whose latitude or longitude failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCoordinates {
    Drop,
    Keep,
}

impl MissingCoordinates {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "" | "drop" => Ok(MissingCoordinates::Drop),
            "keep" => Ok(MissingCoordinates::Keep),
            other => Err(ConfigError::Invalid {
                var: "TREE_MISSING_COORDS",
                value: other.to_string(),
                expected: "drop or keep",
            }),
        }
    }
}

/// How a click on the grid bar chart changes the grid selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSelectionMode {
    /// The first clicked bar becomes the only selected cell.
    Replace,
    /// Every clicked bar is added to the current selection.
    Accumulate,
}

impl GridSelectionMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "" | "replace" => Ok(GridSelectionMode::Replace),
            "accumulate" => Ok(GridSelectionMode::Accumulate),
            other => Err(ConfigError::Invalid {
                var: "TREE_GRID_SELECTION",
                value: other.to_string(),
                expected: "replace or accumulate",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub separator: SeparatorMode,
    pub missing_coordinates: MissingCoordinates,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            separator: SeparatorMode::Auto,
            missing_coordinates: MissingCoordinates::Drop,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub port: u16,
    pub load: LoadOptions,
    pub grid_selection: GridSelectionMode,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_path = env::var("TREE_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/tree_data.csv"));

        let port = match env::var("PORT") {
            Ok(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value,
                expected: "a port number",
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            data_path,
            port,
            load: LoadOptions {
                separator: SeparatorMode::parse(&env_lower("TREE_CSV_SEPARATOR"))?,
                missing_coordinates: MissingCoordinates::parse(&env_lower("TREE_MISSING_COORDS"))?,
            },
            grid_selection: GridSelectionMode::parse(&env_lower("TREE_GRID_SELECTION"))?,
        })
    }
}

fn env_lower(var: &str) -> String {
    env::var(var)
        .map(|value| {
            // a bare space or tab is a meaningful separator value
            if value.trim().is_empty() {
                value
            } else {
                value.trim().to_ascii_lowercase()
            }
        })
        .unwrap_or_default()
}
