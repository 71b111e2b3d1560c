//! Uniqueness analysis configuration
//!
//! Configurations are plain serde structures, typically read from YAML:
//!
//! ```yaml
//! method: invariance
//! invariance:
//!   method: combination
//!   max_distance_disparity: 0.01
//!   include_hydrogens_in_uniqueness_analysis: false
//!   worker_count: 4
//! ```

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown method '{name}', valid options are: {}", .valid.join(", "))]
    UnknownMethod {
        name: String,
        valid: Vec<&'static str>,
    },
    #[error("Invalid configuration document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Distance tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),
    #[error("Worker count must be at least one")]
    InvalidWorkerCount,
}

/// Implements string conversions for a unit-only method enum
macro_rules! named_methods {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<$name, ConfigError> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ConfigError::UnknownMethod {
                        name: s.to_owned(),
                        valid: $name::ALL.iter().map(|m| m.as_str()).collect(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ConfigError;

            fn try_from(s: String) -> Result<$name, ConfigError> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(method: $name) -> String {
                method.as_str().to_owned()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

/// Deduplication method for a collection of systems
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    /// Every system is unique
    None,
    AtomicDistance,
    Averaging,
    /// Equivalence under rotation, reflection and translation
    Invariance,
}

named_methods!(Method {
    None => "none",
    AtomicDistance => "atomic_distance",
    Averaging => "averaging",
    Invariance => "invariance",
});

impl Default for Method {
    fn default() -> Self {
        Method::Invariance
    }
}

/// Candidate search strategy of the invariance method
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InvarianceMethod {
    /// Exhaustive search over graph isomorphisms
    Comprehensive,
    /// Anchor-based search on the rarest elements
    MinimalElementalAbundance,
    /// Choose one of the above from the composition of the data set
    Combination,
}

named_methods!(InvarianceMethod {
    Comprehensive => "comprehensive",
    MinimalElementalAbundance => "minimal_elemental_abundance",
    Combination => "combination",
});

impl Default for InvarianceMethod {
    fn default() -> Self {
        InvarianceMethod::Combination
    }
}

fn default_max_distance_disparity() -> f64 {
    0.01
}

fn default_worker_count() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceConfig {
    #[serde(default)]
    pub method: InvarianceMethod,

    /// Largest distance in Angstrom at which two atoms are considered superimposed
    #[serde(default = "default_max_distance_disparity")]
    pub max_distance_disparity: f64,

    /// Keep hydrogen atoms as explicit atoms instead of folding them into counts
    #[serde(default)]
    pub include_hydrogens_in_uniqueness_analysis: bool,

    /// Number of worker threads for the pairwise sweep
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        EquivalenceConfig {
            method: InvarianceMethod::default(),
            max_distance_disparity: default_max_distance_disparity(),
            include_hydrogens_in_uniqueness_analysis: false,
            worker_count: default_worker_count(),
        }
    }
}

impl EquivalenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_distance_disparity.is_finite() && self.max_distance_disparity > 0.0) {
            return Err(ConfigError::InvalidTolerance(self.max_distance_disparity));
        }

        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }

        Ok(())
    }
}

impl fmt::Display for EquivalenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} search, tolerance {:.3e} A, hydrogens {}, {} worker(s)",
            self.method,
            self.max_distance_disparity,
            if self.include_hydrogens_in_uniqueness_analysis { "kept" } else { "folded" },
            self.worker_count
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UniquenessConfig {
    #[serde(default)]
    pub method: Method,

    #[serde(default)]
    pub invariance: EquivalenceConfig,
}

impl UniquenessConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<UniquenessConfig, ConfigError> {
        let config: UniquenessConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.invariance.validate()
    }
}
