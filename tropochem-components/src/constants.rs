//! Rate constants of the tropospheric CO/NOx/O3/HOx reaction network
//!
//! First order (photolysis) rates are in 1/s, second order rates in
//! cm^3 / (molec s).

use tropochem_core::timeseries::FloatValue;

/// O3 + hv (+ H2O) -> 2 OH
/// unit: 1 / s
pub const K4: FloatValue = 6.9e-8;
/// CO + OH (+ O2) -> CO2 + HO2
/// unit: cm^3 / (molec s)
pub const K5: FloatValue = 1.9e-13;
/// HO2 + O3 -> OH + 2 O2
/// unit: cm^3 / (molec s)
pub const K6: FloatValue = 1.5e-15;
/// NO + O3 -> NO2 + O2
/// unit: cm^3 / (molec s)
pub const K7: FloatValue = 7.9e-15;
/// NO2 + hv (+ O2) -> NO + O3
/// unit: 1 / s
pub const K8: FloatValue = 3.9e-3;
/// HO2 + NO -> OH + NO2
/// unit: cm^3 / (molec s)
pub const K9: FloatValue = 9.6e-12;
/// OH + NO2 -> HNO3
/// unit: cm^3 / (molec s)
pub const K10: FloatValue = 1.3e-11;

/// Unit of every concentration in the model
pub const CONCENTRATION_UNIT: &str = "molec/cm^3";
