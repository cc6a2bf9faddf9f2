//! Difficulty levels and test complexity shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered test difficulty level.
///
/// The ordering matters: demotion and promotion move one step along this
/// scale, and pass thresholds grow with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Basic,
    Intermediate,
    Advanced,
    Expert,
    Master,
}

impl Difficulty {
    /// All levels in ascending order.
    pub const ALL: [Self; 5] = [
        Self::Basic,
        Self::Intermediate,
        Self::Advanced,
        Self::Expert,
        Self::Master,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
            Self::Master => "master",
        }
    }

    /// One step down the scale, saturating at `Basic`.
    pub fn demoted(self) -> Self {
        match self {
            Self::Basic | Self::Intermediate => Self::Basic,
            Self::Advanced => Self::Intermediate,
            Self::Expert => Self::Advanced,
            Self::Master => Self::Expert,
        }
    }

    /// One step up the scale, saturating at `Master`.
    pub fn promoted(self) -> Self {
        match self {
            Self::Basic => Self::Intermediate,
            Self::Intermediate => Self::Advanced,
            Self::Advanced => Self::Expert,
            Self::Expert | Self::Master => Self::Master,
        }
    }

    /// XP multiplier applied to the raw score on a passed attempt.
    pub fn xp_multiplier(self) -> u64 {
        match self {
            Self::Basic => 1,
            Self::Intermediate => 2,
            Self::Advanced => 3,
            Self::Expert => 4,
            Self::Master => 5,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            "expert" => Ok(Self::Expert),
            "master" => Ok(Self::Master),
            _ => Err(anyhow::anyhow!("Invalid difficulty: {s}")),
        }
    }
}

/// How many layers a generated test stacks.
///
/// A separate output dimension from [`Difficulty`]: a struggling agent can be
/// forced down to a single layer while its difficulty is computed normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityShape {
    SingleLayer,
    DualLayer,
    TriLayer,
}

impl ComplexityShape {
    pub fn layers(self) -> u8 {
        match self {
            Self::SingleLayer => 1,
            Self::DualLayer => 2,
            Self::TriLayer => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleLayer => "single_layer",
            Self::DualLayer => "dual_layer",
            Self::TriLayer => "tri_layer",
        }
    }
}

impl fmt::Display for ComplexityShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ComplexityShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_layer" => Ok(Self::SingleLayer),
            "dual_layer" => Ok(Self::DualLayer),
            "tri_layer" => Ok(Self::TriLayer),
            _ => Err(anyhow::anyhow!("Invalid complexity shape: {s}")),
        }
    }
}
