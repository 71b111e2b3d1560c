//! Rigid superposition testing of two atom sets
//!
//! Two sets are equivalent if some combination of a reflection operator, a
//! proper rotation and a translation maps every atom of the second set onto a
//! distinct atom of the same kind in the first set within a tolerance.

extern crate nalgebra as na;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::environment::{NeighbourEnvironment, ENVIRONMENT_TOLERANCE};
use crate::isomorphism::IndexMapping;
use crate::permutation::{Permutation, PermutationError};
use crate::quaternions::{self, Fit, Matrix3, Matrix3N, Quaternion};
use crate::system::{AtomAttributes, HeavyAtomSet, Vector3};

#[derive(Error, Debug, PartialEq)]
pub enum AlignmentError {
    #[error("Atom sets of differing length cannot be aligned: {len1} vs {len2}\n  first: {dump1}\n  second: {dump2}")]
    LengthMismatch {
        len1: usize,
        len2: usize,
        dump1: String,
        dump2: String,
    },
    #[error(transparent)]
    Permutation(#[from] PermutationError),
}

impl AlignmentError {
    pub fn length_mismatch(s1: &HeavyAtomSet, s2: &HeavyAtomSet) -> AlignmentError {
        AlignmentError::LengthMismatch {len1: s1.len(), len2: s2.len(), dump1: s1.dump(), dump2: s2.dump()}
    }
}

/// Axis-sign reflection operators tried before each rotation fit
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Reflection {
    Identity,
    /// Mirror through the yz plane
    Yz,
    /// Mirror through the xz plane
    Xz,
    /// Mirror through the xy plane
    Xy,
    /// Yz and Xz mirrors combined
    YzXz,
    /// Yz and Xy mirrors combined
    YzXy,
    /// Xz and Xy mirrors combined
    XzXy,
    Inversion,
}

impl Reflection {
    pub const ALL: [Reflection; 8] = [
        Reflection::Identity,
        Reflection::Yz,
        Reflection::Xz,
        Reflection::Xy,
        Reflection::YzXz,
        Reflection::YzXy,
        Reflection::XzXy,
        Reflection::Inversion,
    ];

    /// Signs applied to the x, y and z coordinates
    pub fn signs(&self) -> [f64; 3] {
        match self {
            Reflection::Identity => [1.0, 1.0, 1.0],
            Reflection::Yz => [-1.0, 1.0, 1.0],
            Reflection::Xz => [1.0, -1.0, 1.0],
            Reflection::Xy => [1.0, 1.0, -1.0],
            Reflection::YzXz => [-1.0, -1.0, 1.0],
            Reflection::YzXy => [-1.0, 1.0, -1.0],
            Reflection::XzXy => [1.0, -1.0, -1.0],
            Reflection::Inversion => [-1.0, -1.0, -1.0],
        }
    }

    pub fn matrix(&self) -> Matrix3 {
        Matrix3::from_diagonal(&Vector3::from(self.signs()))
    }

    /// Whether the operator preserves handedness
    pub fn is_proper(&self) -> bool {
        self.signs().iter().product::<f64>() > 0.0
    }

    pub fn apply(&self, positions: &Matrix3N) -> Matrix3N {
        let mut reflected = positions.clone();
        for (i, sign) in self.signs().iter().enumerate() {
            reflected.row_mut(i).scale_mut(*sign);
        }
        reflected
    }
}

/// A successful superposition of the second atom set onto the first
#[derive(Debug, Clone, PartialEq)]
pub struct Superposition {
    /// Atom `i` of the first set corresponds to atom `correspondence(i)` of the second
    pub correspondence: IndexMapping,
    /// Reflection applied to the second set first
    pub reflection: Reflection,
    /// Rotation applied to the reflected second set
    pub rotation: Quaternion,
}

/// Outcome of a superposition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Match(Superposition),
    NoMatch,
    /// No operator matched, but some rotation fit was not uniquely determined
    Inconclusive,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match(_))
    }
}

pub type EnvironmentPair<'a> = (&'a NeighbourEnvironment, &'a NeighbourEnvironment);

/// Whether two sets have the same (element, hydrogen count) multiset
pub fn same_composition(s1: &HeavyAtomSet, s2: &HeavyAtomSet) -> bool {
    s1.len() == s2.len() && s1.attribute_multiset() == s2.attribute_multiset()
}

/// Pair atoms of like kind in ascending distance order, each atom used at most once
///
/// Returns the correspondence of first atoms onto second atoms if every atom
/// is matched within `tolerance`.
pub fn greedy_correspondence(
    attributes1: &[AtomAttributes],
    positions1: &Matrix3N,
    attributes2: &[AtomAttributes],
    positions2: &Matrix3N,
    tolerance: f64
) -> Option<Vec<usize>> {
    let n = attributes1.len();
    if n != attributes2.len() {
        return None;
    }

    let candidates = (0..n).cartesian_product(0..n)
        .filter(|&(i, j)| attributes1[i] == attributes2[j])
        .map(|(i, j)| (OrderedFloat((positions1.column(i) - positions2.column(j)).norm()), i, j))
        .filter(|(distance, _, _)| distance.0 <= tolerance)
        .sorted();

    let mut forward: Vec<Option<usize>> = vec![None; n];
    let mut used = vec![false; n];
    let mut matched = 0;
    for (_, i, j) in candidates {
        if forward[i].is_none() && !used[j] {
            forward[i] = Some(j);
            used[j] = true;
            matched += 1;
            if matched == n {
                break;
            }
        }
    }

    forward.into_iter().collect()
}

/// A pair of atom sets expressed relative to their centres of mass
pub struct Frame<'a> {
    pub attributes1: Vec<AtomAttributes>,
    pub attributes2: Vec<AtomAttributes>,
    pub centred1: Matrix3N,
    pub centred2: Matrix3N,
    com1: Vector3,
    com2: Vector3,
    tolerance: f64,
    environments: Option<EnvironmentPair<'a>>,
}

impl<'a> Frame<'a> {
    pub fn new(s1: &HeavyAtomSet, s2: &HeavyAtomSet, tolerance: f64, environments: Option<EnvironmentPair<'a>>) -> Frame<'a> {
        let com1 = s1.centre_of_mass();
        let com2 = s2.centre_of_mass();
        Frame {
            attributes1: s1.iter_attributes().collect(),
            attributes2: s2.iter_attributes().collect(),
            centred1: s1.centred_positions(),
            centred2: s2.centred_positions(),
            com1,
            com2,
            tolerance,
            environments,
        }
    }

    /// Fit the reflected second set onto the first using all index-aligned atoms
    pub fn fit(&self, reflection: Reflection) -> Fit {
        quaternions::fit(&reflection.apply(&self.centred2), &self.centred1)
    }

    /// Fit the reflected second set onto the first using (first, second) atom pairs only
    pub fn fit_pairs(&self, reflection: Reflection, pairs: &[(usize, usize)]) -> Fit {
        let flipped: Vec<(usize, usize)> = pairs.iter().map(|&(i, j)| (j, i)).collect();
        quaternions::fit_with_pairs(&reflection.apply(&self.centred2), &self.centred1, &flipped)
    }

    fn environment_matches(&self, operator: &Matrix3) -> bool {
        let (environment1, environment2) = match self.environments {
            Some(pair) => pair,
            None => return true,
        };

        if environment1.len() != environment2.len() {
            return false;
        }

        let neighbours1 = environment1.positions_relative_to(&self.com1);
        let neighbours2 = operator * environment2.positions_relative_to(&self.com2);
        let attributes1: Vec<_> = environment1.atoms.iter_attributes().collect();
        let attributes2: Vec<_> = environment2.atoms.iter_attributes().collect();
        greedy_correspondence(&attributes1, &neighbours1, &attributes2, &neighbours2, ENVIRONMENT_TOLERANCE).is_some()
    }

    /// Check whether a fitted operator superimposes every atom and the environments
    pub fn validate(&self, reflection: Reflection, fit: &Fit) -> Option<Superposition> {
        let operator = fit.rotation_matrix() * reflection.matrix();
        let transformed = operator * &self.centred2;
        let sigma = greedy_correspondence(
            &self.attributes1,
            &self.centred1,
            &self.attributes2,
            &transformed,
            self.tolerance
        )?;

        if !self.environment_matches(&operator) {
            log::debug!("Atoms superimpose under {:?}, but the environments do not", reflection);
            return None;
        }

        let correspondence = IndexMapping::new(Permutation::try_from(sigma).ok()?);
        Some(Superposition {correspondence, reflection, rotation: fit.quaternion})
    }
}

/// Test whether two index-aligned atom sets are rigidly superimposable
///
/// Atom `i` of `s1` is presumed to correspond to atom `i` of `s2` for the
/// purpose of fitting. The final correspondence is established independently
/// by nearest-neighbour matching.
pub fn align(
    s1: &HeavyAtomSet,
    s2: &HeavyAtomSet,
    tolerance: f64,
    environments: Option<EnvironmentPair>
) -> Result<Verdict, AlignmentError> {
    if s1.len() != s2.len() {
        return Err(AlignmentError::length_mismatch(s1, s2));
    }

    if !same_composition(s1, s2) || !s1.iter_attributes().eq(s2.iter_attributes()) {
        return Ok(Verdict::NoMatch);
    }

    let frame = Frame::new(s1, s2, tolerance, environments);
    let mut degenerate = false;
    for reflection in Reflection::ALL {
        let fit = frame.fit(reflection);
        degenerate |= fit.degenerate;
        if let Some(superposition) = frame.validate(reflection, &fit) {
            return Ok(Verdict::Match(superposition));
        }
    }

    if degenerate {
        Ok(Verdict::Inconclusive)
    } else {
        Ok(Verdict::NoMatch)
    }
}
