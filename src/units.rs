//! Physical constants in SI units.
//!
//! The simulation works directly in SI: meters, seconds, kilograms,
//! coulombs, volts. Electron temperatures are specified in eV.

/// Vacuum permittivity [C/(V·m)].
pub const EPS_0: f64 = 8.854_187_82e-12;
/// Elementary charge [C].
pub const QE: f64 = 1.602_176_565e-19;
/// Atomic mass unit [kg].
pub const AMU: f64 = 1.660_538_921e-27;
/// Electron mass [kg].
pub const ME: f64 = 9.109_382_15e-31;
/// Boltzmann constant [J/K].
pub const K_B: f64 = 1.380_648e-23;
/// One electronvolt expressed in kelvin, ~11604 K.
pub const EV_TO_K: f64 = QE / K_B;
