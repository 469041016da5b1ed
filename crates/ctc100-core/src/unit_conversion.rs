//! Unit Conversion Functions
//!
//! The controller reports temperatures and takes setpoints in kelvin.
//! These helpers convert between kelvin, °C and °F for display and input.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Offset between the Kelvin and Celsius scales
pub const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

/// Convert kelvin to Celsius
pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - ZERO_CELSIUS_IN_KELVIN
}

/// Convert Celsius to kelvin
pub fn celsius_to_kelvin(c: f64) -> f64 {
    c + ZERO_CELSIUS_IN_KELVIN
}

/// Convert Celsius to Fahrenheit
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Convert kelvin to Fahrenheit
pub fn kelvin_to_fahrenheit(k: f64) -> f64 {
    celsius_to_fahrenheit(kelvin_to_celsius(k))
}

/// Convert Fahrenheit to kelvin
pub fn fahrenheit_to_kelvin(f: f64) -> f64 {
    celsius_to_kelvin(fahrenheit_to_celsius(f))
}

/// Temperature scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Kelvin, the controller's native scale
    #[default]
    Kelvin,
    /// Degrees Celsius
    Celsius,
    /// Degrees Fahrenheit
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a value in this unit to kelvin
    pub fn to_kelvin(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => value,
            TemperatureUnit::Celsius => celsius_to_kelvin(value),
            TemperatureUnit::Fahrenheit => fahrenheit_to_kelvin(value),
        }
    }

    /// Convert a value in kelvin to this unit
    pub fn from_kelvin(self, kelvin: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => kelvin,
            TemperatureUnit::Celsius => kelvin_to_celsius(kelvin),
            TemperatureUnit::Fahrenheit => kelvin_to_fahrenheit(kelvin),
        }
    }

    /// Unit suffix for display
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Kelvin => "K",
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "k" | "kelvin" => Ok(TemperatureUnit::Kelvin),
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(format!("unknown temperature unit '{}'", other)),
        }
    }
}
