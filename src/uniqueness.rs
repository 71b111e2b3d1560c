//! Deduplication of molecule and dimer collections
//!
//! All unordered pairs of systems are compared with the configured search
//! strategy. Equivalent pairs are partitioned into groups and the smallest id
//! of each group is reported as unique.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use itertools::Itertools;
use rayon::prelude::*;
use thiserror::Error;

use crate::alignment::AlignmentError;
use crate::config::{ConfigError, Method, UniquenessConfig};
use crate::environment::Environments;
use crate::groups::{equivalence_groups, EquivalenceGroups, EquivalencePair, GroupError};
use crate::isomorphism::{automorphisms, check_combinatorial_load};
use crate::search::{EquivalenceSearch, Strategy};
use crate::system::{self, Dimer, DimerId, Molecule, MoleculeId, System, SystemError, SystemId};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    System(#[from] SystemError),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error("Deduplication method '{0}' is not supported")]
    UnsupportedMethod(Method),
    #[error("Could not start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result of a uniqueness analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uniqueness {
    /// Sorted representative ids
    pub unique: Vec<SystemId>,
    pub groups: EquivalenceGroups,
    /// Sorted, normalised equivalent pairs
    pub pairs: Vec<EquivalencePair>,
}

impl Uniqueness {
    /// Groups as representative id to the sorted ids of its other members
    pub fn group_map(&self) -> BTreeMap<SystemId, Vec<SystemId>> {
        self.groups.to_map()
    }
}

fn check_unique_ids(systems: &[System]) -> Result<(), SystemError> {
    let mut seen = HashSet::with_capacity(systems.len());
    match systems.iter().find(|system| !seen.insert(system.id)) {
        Some(duplicate) => Err(SystemError::DuplicateId(duplicate.id)),
        None => Ok(()),
    }
}

/// Warn ahead of the sweep about systems with many combined symmetries
fn check_combinatorics(systems: &[System]) {
    for system in systems.iter() {
        let counts: Vec<usize> = system.fragments.iter()
            .map(|fragment| automorphisms(&fragment.graph).len())
            .collect();
        check_combinatorial_load(&format!("System {}", system.id), &counts);
    }
}

fn compare_pair<S: EquivalenceSearch>(
    search: &S,
    a: &System,
    b: &System,
    environments: &Environments
) -> Result<Option<EquivalencePair>, AlignmentError> {
    let verdict = search.compare(a, b, environments)?;
    Ok(verdict.is_match().then(|| (a.id.min(b.id), a.id.max(b.id))))
}

/// Compare all unordered pairs, in parallel if several workers are requested
fn equivalent_pairs<S: EquivalenceSearch + Sync>(
    search: &S,
    systems: &[System],
    environments: &Environments,
    worker_count: usize
) -> Result<Vec<EquivalencePair>, Error> {
    let indices: Vec<(usize, usize)> = (0..systems.len()).tuple_combinations().collect();
    let compare = |&(i, j): &(usize, usize)| compare_pair(search, &systems[i], &systems[j], environments);

    let results: Vec<Option<EquivalencePair>> = if worker_count <= 1 {
        indices.iter().map(compare).collect::<Result<_, _>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()?;
        pool.install(|| indices.par_iter().map(compare).collect::<Result<_, _>>())?
    };

    Ok(results.into_iter().flatten().sorted().collect())
}

/// Find the unique systems of a collection
pub fn find_unique(systems: &[System], config: &UniquenessConfig, environments: &Environments) -> Result<Uniqueness, Error> {
    config.validate()?;
    check_unique_ids(systems)?;

    let universe: Vec<SystemId> = systems.iter().map(|system| system.id).sorted().collect();
    let invariance = &config.invariance;

    let pairs = match config.method {
        Method::None => Vec::new(),
        Method::Invariance => {
            log::info!("Invariance analysis of {} systems: {}", systems.len(), invariance);
            check_combinatorics(systems);
            let start = Instant::now();
            let strategy = Strategy::resolve(invariance.method, systems, invariance.max_distance_disparity);
            let pairs = equivalent_pairs(&strategy, systems, environments, invariance.worker_count)?;
            log::info!(
                "Compared {} systems with {} search in {:.2?}, {} equivalent pairs",
                systems.len(),
                strategy.name(),
                start.elapsed(),
                pairs.len()
            );
            pairs
        },
        method => return Err(Error::UnsupportedMethod(method)),
    };

    let groups = equivalence_groups(&universe, &pairs)?;
    let unique = groups.representatives();
    log::info!("{} of {} systems are unique", unique.len(), universe.len());

    Ok(Uniqueness {unique, groups, pairs})
}

/// Find the unique molecules of a collection
pub fn find_unique_molecules(
    molecules: &BTreeMap<MoleculeId, Molecule>,
    config: &UniquenessConfig,
    environments: &Environments
) -> Result<Uniqueness, Error> {
    let systems = system::molecule_systems(molecules, config.invariance.include_hydrogens_in_uniqueness_analysis);
    find_unique(&systems, config, environments)
}

/// Find the unique dimers of a collection
pub fn find_unique_dimers(
    dimers: &BTreeMap<DimerId, Dimer>,
    molecules: &BTreeMap<MoleculeId, Molecule>,
    config: &UniquenessConfig,
    environments: &Environments
) -> Result<Uniqueness, Error> {
    let systems = system::dimer_systems(dimers, molecules, config.invariance.include_hydrogens_in_uniqueness_analysis)?;
    find_unique(&systems, config, environments)
}

#[cfg(test)]
mod tests {
    use crate::uniqueness::*;
    use crate::config::{EquivalenceConfig, InvarianceMethod};
    use crate::environment::NeighbourEnvironment;
    use crate::quaternions::Matrix3N;
    use crate::search::tests::chain;
    use crate::system::HeavyAtomSet;

    fn config(method: Method) -> UniquenessConfig {
        UniquenessConfig {method, invariance: EquivalenceConfig::default()}
    }

    #[test]
    fn method_selection() {
        let systems = vec![chain(0, &["C", "N", "O"]), chain(1, &["C", "N", "O"])];
        let environments = Environments::new();

        let all_unique = find_unique(&systems, &config(Method::None), &environments).unwrap();
        assert_eq!(all_unique.unique, vec![0, 1]);
        assert!(all_unique.pairs.is_empty());

        let invariance = find_unique(&systems, &config(Method::Invariance), &environments).unwrap();
        assert_eq!(invariance.unique, vec![0]);
        assert_eq!(invariance.pairs, vec![(0, 1)]);

        assert!(matches!(
            find_unique(&systems, &config(Method::Averaging), &environments),
            Err(Error::UnsupportedMethod(Method::Averaging))
        ));
    }

    #[test]
    fn malformed_collections() {
        let systems = vec![chain(3, &["C", "N"]), chain(3, &["C", "O"])];
        assert!(matches!(
            find_unique(&systems, &config(Method::Invariance), &Environments::new()),
            Err(Error::System(SystemError::DuplicateId(3)))
        ));

        let mut invalid = config(Method::Invariance);
        invalid.invariance.worker_count = 0;
        assert!(matches!(
            find_unique(&[], &invalid, &Environments::new()),
            Err(Error::Config(ConfigError::InvalidWorkerCount))
        ));

        let empty = find_unique(&[], &config(Method::Invariance), &Environments::new()).unwrap();
        assert!(empty.unique.is_empty());
    }

    #[test]
    fn worker_count_independence() {
        let systems: Vec<System> = (0..6)
            .map(|id| match id % 3 {
                0 => chain(id, &["C", "N", "O", "C"]),
                1 => chain(id, &["C", "C", "O", "N"]),
                _ => chain(id, &["S", "C", "C", "C"]),
            })
            .collect();

        let mut sequential = config(Method::Invariance);
        sequential.invariance.method = InvarianceMethod::Comprehensive;
        let mut parallel = sequential.clone();
        parallel.invariance.worker_count = 4;

        let environments = Environments::new();
        let expected = find_unique(&systems, &sequential, &environments).unwrap();
        assert_eq!(expected.unique, vec![0, 1, 2]);
        assert_eq!(expected.group_map().get(&0), Some(&vec![3]));
        assert_eq!(find_unique(&systems, &parallel, &environments).unwrap(), expected);
    }

    #[test]
    fn neighbour_environments_separate_identical_systems() {
        let systems = vec![chain(0, &["C", "N", "O", "C"]), chain(1, &["C", "N", "O", "C"])];
        let argon = |z: f64| NeighbourEnvironment::new(&[HeavyAtomSet::without_hydrogen_counts(
            vec!["Ar".parse().unwrap()],
            Matrix3N::from_column_slice(&[2.0, 0.0, z])
        ).unwrap()]);

        for method in [InvarianceMethod::Comprehensive, InvarianceMethod::MinimalElementalAbundance] {
            let mut config = config(Method::Invariance);
            config.invariance.method = method;

            let same: Environments = [(0, argon(5.0)), (1, argon(5.0))].into_iter().collect();
            assert_eq!(find_unique(&systems, &config, &same).unwrap().unique, vec![0]);

            let different: Environments = [(0, argon(5.0)), (1, argon(9.0))].into_iter().collect();
            let result = find_unique(&systems, &config, &different).unwrap();
            assert_eq!(result.unique, vec![0, 1]);
            assert!(result.pairs.is_empty());

            let partial: Environments = [(0, argon(5.0))].into_iter().collect();
            assert_eq!(find_unique(&systems, &config, &partial).unwrap().unique, vec![0]);
        }
    }
}
