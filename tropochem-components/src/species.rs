use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tropochem_core::errors::ChemError;

/// Chemical species tracked by the model
///
/// The discriminant is the species' index in the state vector.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    CO = 0,
    NO = 1,
    O3 = 2,
    NO2 = 3,
    OH = 4,
    HO2 = 5,
}

impl Species {
    /// Number of species in the state vector
    pub const COUNT: usize = 6;

    /// All species in state vector order
    pub const ALL: [Species; Species::COUNT] = [
        Species::CO,
        Species::NO,
        Species::O3,
        Species::NO2,
        Species::OH,
        Species::HO2,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::CO => "CO",
            Species::NO => "NO",
            Species::O3 => "O3",
            Species::NO2 => "NO2",
            Species::OH => "OH",
            Species::HO2 => "HO2",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = ChemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Species::ALL
            .into_iter()
            .find(|species| species.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChemError::InvalidParameter(format!("unknown species '{s}'")))
    }
}
