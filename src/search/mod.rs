//! Candidate search strategies deciding whether two systems are equivalent

use itertools::Itertools;

use crate::alignment::{AlignmentError, EnvironmentPair, Verdict};
use crate::config::InvarianceMethod;
use crate::environment::Environments;
use crate::strong::{FragmentIndex, Index};
use crate::system::System;

pub mod comprehensive;
pub mod mea;

pub use comprehensive::Comprehensive;
pub use mea::MinimalElementalAbundance;

/// Largest number of rarest-element atoms for which the anchor search is chosen
pub const ANCHOR_SEARCH_LIMIT: usize = 4;

/// Number of rarest-element atoms an anchor basis needs at minimum
const ANCHOR_TARGET: usize = 2;

/// Decides whether two systems are rigidly superimposable
pub trait EquivalenceSearch {
    fn compare(&self, a: &System, b: &System, environments: &Environments) -> Result<Verdict, AlignmentError>;
}

/// Environments of both systems, if both are known
pub fn environment_pair<'a>(a: &System, b: &System, environments: &'a Environments) -> Option<EnvironmentPair<'a>> {
    match (environments.get(&a.id), environments.get(&b.id)) {
        (Some(environment_a), Some(environment_b)) => Some((environment_a, environment_b)),
        _ => None,
    }
}

/// Atoms needed to exhaust the rarest elements of a fragment up to the anchor target
///
/// Hydrogen atoms kept as explicit atoms are not counted.
pub fn rare_atom_count(system: &System, fragment: FragmentIndex) -> usize {
    let counts = system.fragment_atoms(fragment)
        .element_counts()
        .into_iter()
        .filter(|(element, _)| !element.is_hydrogen())
        .map(|(_, count)| count)
        .sorted();

    let mut total = 0;
    for count in counts {
        if total >= ANCHOR_TARGET {
            break;
        }
        total += count;
    }
    total
}

/// Concrete strategy, resolved once per run
#[derive(Debug, Clone)]
pub enum Strategy {
    Comprehensive(Comprehensive),
    MinimalElementalAbundance(MinimalElementalAbundance),
}

impl Strategy {
    /// Resolve a configured method against the systems of a run
    pub fn resolve(method: InvarianceMethod, systems: &[System], tolerance: f64) -> Strategy {
        match method {
            InvarianceMethod::Comprehensive => Strategy::Comprehensive(Comprehensive::new(tolerance)),
            InvarianceMethod::MinimalElementalAbundance => Strategy::MinimalElementalAbundance(MinimalElementalAbundance::new(tolerance)),
            InvarianceMethod::Combination => {
                let worst = systems.iter()
                    .flat_map(|system| {
                        FragmentIndex::range(system.fragments.len())
                            .map(move |f| rare_atom_count(system, f))
                    })
                    .max()
                    .unwrap_or(0);

                let strategy = if worst <= ANCHOR_SEARCH_LIMIT {
                    Strategy::MinimalElementalAbundance(MinimalElementalAbundance::new(tolerance))
                } else {
                    Strategy::Comprehensive(Comprehensive::new(tolerance))
                };
                log::info!("Up to {} rarest-element atoms per molecule, using {} search", worst, strategy.name());
                strategy
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Comprehensive(_) => InvarianceMethod::Comprehensive.as_str(),
            Strategy::MinimalElementalAbundance(_) => InvarianceMethod::MinimalElementalAbundance.as_str(),
        }
    }
}

impl EquivalenceSearch for Strategy {
    fn compare(&self, a: &System, b: &System, environments: &Environments) -> Result<Verdict, AlignmentError> {
        match self {
            Strategy::Comprehensive(search) => search.compare(a, b, environments),
            Strategy::MinimalElementalAbundance(search) => search.compare(a, b, environments),
        }
    }
}
