//! Unit equivalencies.
//!
//! An equivalency is an invertible conversion between two units whose
//! dimensions differ, e.g. a dimensionless redshift and a velocity. Plain
//! conversions within one dimension are pure scalings and need no equivalency.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Speed of light in vacuum, m/s (exact).
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// Speed of light in vacuum, km/s.
pub const SPEED_OF_LIGHT_KM_S: f64 = SPEED_OF_LIGHT_M_S / 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Dimensionless,
    Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Unit {
    /// Dimensionless redshift `z`.
    #[serde(rename = "redshift")]
    #[value(name = "redshift")]
    Redshift,
    #[serde(rename = "m/s")]
    #[value(name = "m/s")]
    MetersPerSecond,
    #[serde(rename = "km/s")]
    #[value(name = "km/s")]
    KilometersPerSecond,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Redshift => Dimension::Dimensionless,
            Unit::MetersPerSecond | Unit::KilometersPerSecond => Dimension::Velocity,
        }
    }

    /// Multiplier to the dimension's base unit (m/s for velocities).
    pub fn scale(self) -> f64 {
        match self {
            Unit::Redshift | Unit::MetersPerSecond => 1.0,
            Unit::KilometersPerSecond => 1000.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Redshift => "",
            Unit::MetersPerSecond => "m / s",
            Unit::KilometersPerSecond => "km / s",
        }
    }
}

type ConvertFn = fn(f64) -> Result<f64, AppError>;

/// An invertible conversion between `from` and `to`.
#[derive(Clone, Copy)]
pub struct Equivalency {
    pub name: &'static str,
    pub from: Unit,
    pub to: Unit,
    forward: ConvertFn,
    backward: ConvertFn,
}

impl Equivalency {
    pub fn forward(&self, value: f64) -> Result<f64, AppError> {
        (self.forward)(value)
    }

    pub fn backward(&self, value: f64) -> Result<f64, AppError> {
        (self.backward)(value)
    }
}

impl std::fmt::Debug for Equivalency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Equivalency")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Relativistic Doppler relation between redshift and radial velocity (km/s).
///
/// ```text
/// v = c ((1+z)² - 1) / ((1+z)² + 1)
/// z = sqrt((1 + v/c) / (1 - v/c)) - 1
/// ```
pub fn doppler_redshift() -> Equivalency {
    Equivalency {
        name: "doppler_redshift",
        from: Unit::Redshift,
        to: Unit::KilometersPerSecond,
        forward: redshift_to_velocity,
        backward: velocity_to_redshift,
    }
}

fn redshift_to_velocity(z: f64) -> Result<f64, AppError> {
    if !(z.is_finite() && z > -1.0) {
        return Err(AppError::input(format!("Redshift must be finite and > -1, got {z}.")));
    }
    let zp1_sq = (1.0 + z) * (1.0 + z);
    Ok(SPEED_OF_LIGHT_KM_S * (zp1_sq - 1.0) / (zp1_sq + 1.0))
}

fn velocity_to_redshift(v_km_s: f64) -> Result<f64, AppError> {
    let beta = v_km_s / SPEED_OF_LIGHT_KM_S;
    if !(beta.is_finite() && beta.abs() < 1.0) {
        return Err(AppError::input(format!(
            "Velocity must be below the speed of light, got {v_km_s} km/s."
        )));
    }
    Ok(((1.0 + beta) / (1.0 - beta)).sqrt() - 1.0)
}

/// Convert `value` from `from` to `to`, using `equivalencies` when the
/// dimensions differ.
pub fn convert(value: f64, from: Unit, to: Unit, equivalencies: &[Equivalency]) -> Result<f64, AppError> {
    if !value.is_finite() {
        return Err(AppError::input(format!("Cannot convert non-finite value {value}.")));
    }
    if from.dimension() == to.dimension() {
        return Ok(value * from.scale() / to.scale());
    }

    for eq in equivalencies {
        if eq.from.dimension() == from.dimension() && eq.to.dimension() == to.dimension() {
            let v = value * from.scale() / eq.from.scale();
            let out = eq.forward(v)?;
            log::debug!("convert via {} (forward): {value} -> {out} {}", eq.name, eq.to.symbol());
            return Ok(out * eq.to.scale() / to.scale());
        }
        if eq.to.dimension() == from.dimension() && eq.from.dimension() == to.dimension() {
            let v = value * from.scale() / eq.to.scale();
            let out = eq.backward(v)?;
            log::debug!("convert via {} (backward): {value} -> {out}", eq.name);
            return Ok(out * eq.from.scale() / to.scale());
        }
    }

    Err(AppError::input(format!(
        "Cannot convert {from:?} to {to:?}: units are not equivalent."
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_redshift_is_zero_velocity() {
        let v = convert(0.0, Unit::Redshift, Unit::KilometersPerSecond, &[doppler_redshift()]).unwrap();
        assert_eq!(v, 0.0);
    }

    #[test]
    fn known_values() {
        // (1+z)² = 4 -> v = 3c/5
        let v = convert(1.0, Unit::Redshift, Unit::KilometersPerSecond, &[doppler_redshift()]).unwrap();
        assert_relative_eq!(v, 0.6 * SPEED_OF_LIGHT_KM_S, max_relative = 1e-14);

        let z = convert(
            0.6 * SPEED_OF_LIGHT_M_S,
            Unit::MetersPerSecond,
            Unit::Redshift,
            &[doppler_redshift()],
        )
        .unwrap();
        assert_relative_eq!(z, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn round_trips_through_both_directions() {
        let eq = [doppler_redshift()];
        for &z in &[-0.5, 0.001, 0.1, 2.0, 10.0] {
            let v = convert(z, Unit::Redshift, Unit::MetersPerSecond, &eq).unwrap();
            let back = convert(v, Unit::MetersPerSecond, Unit::Redshift, &eq).unwrap();
            assert_relative_eq!(back, z, max_relative = 1e-9);
        }
    }

    #[test]
    fn velocity_approaches_light_speed() {
        let v = redshift_to_velocity(1e4).unwrap();
        assert!(v < SPEED_OF_LIGHT_KM_S);
        assert!(SPEED_OF_LIGHT_KM_S - v < 1e-2);
    }

    #[test]
    fn same_dimension_is_plain_scaling() {
        assert_eq!(convert(3.0, Unit::KilometersPerSecond, Unit::MetersPerSecond, &[]).unwrap(), 3000.0);
    }

    #[test]
    fn non_finite_values_are_rejected_on_every_path() {
        let eq = [doppler_redshift()];
        let err = convert(f64::INFINITY, Unit::KilometersPerSecond, Unit::MetersPerSecond, &eq).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.message(), "Cannot convert non-finite value inf.");
        assert!(convert(f64::NAN, Unit::MetersPerSecond, Unit::MetersPerSecond, &eq).is_err());
        assert!(convert(f64::NAN, Unit::Redshift, Unit::KilometersPerSecond, &eq).is_err());
    }

    #[test]
    fn errors() {
        assert!(convert(1.0, Unit::Redshift, Unit::KilometersPerSecond, &[]).is_err());
        assert!(velocity_to_redshift(SPEED_OF_LIGHT_KM_S).is_err());
        assert!(redshift_to_velocity(-1.0).is_err());
    }
}
