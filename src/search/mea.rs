//! Anchor search on the atoms of the least abundant elements
//!
//! A handful of atoms of rare elements fix a reference frame per fragment.
//! Assignments of these anchors to like atoms in the other system are
//! filtered by distances and angles about the centre of mass, and the
//! rotation fitted on the anchors alone is validated against all atoms.

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::alignment::{AlignmentError, Frame, Reflection, Verdict};
use crate::environment::Environments;
use crate::permutation::{permutations, Permutation};
use crate::quaternions::Matrix3N;
use crate::search::comprehensive::{fragments_compatible, Comprehensive};
use crate::search::{environment_pair, EquivalenceSearch};
use crate::system::{AtomAttributes, System, Vector3};

/// Smallest sine of the angle between anchor directions (or of a direction with a plane)
const ANCHOR_ANGLE_THRESHOLD: f64 = 0.1;

/// Largest number of direction atoms per fragment
const MAX_DIRECTIONS: usize = 3;

/// Fragment size needed for a shared anchor point and one direction
const MIN_ANCHOR_ATOMS: usize = 2;

/// Fragment size needed for a full basis of a centre and three directions
const FULL_BASIS_ATOMS: usize = MAX_DIRECTIONS + 1;

#[derive(Debug, Clone)]
pub struct MinimalElementalAbundance {
    pub tolerance: f64,
    fallback: Comprehensive,
}

impl MinimalElementalAbundance {
    pub fn new(tolerance: f64) -> MinimalElementalAbundance {
        MinimalElementalAbundance {tolerance, fallback: Comprehensive::new(tolerance)}
    }
}

/// Anchor atoms of each fragment, as system-wide atom indices
///
/// The first anchor of a fragment is its centre, followed by up to three
/// direction atoms spanning independent directions from the centre. Atoms are
/// considered rarest first by the abundance of their element in the whole
/// system, then by element, then by index.
pub fn anchors(system: &System) -> Vec<Vec<usize>> {
    let counts = system.atoms.element_counts();
    let positions = system.atoms.positions();

    system.fragments.iter()
        .map(|fragment| {
            let ranked: Vec<usize> = fragment.atoms()
                .sorted_by_key(|&i| {
                    let element = system.atoms.elements()[i];
                    (counts.get(&element).copied().unwrap_or(0), element, i)
                })
                .collect();

            let mut chosen: Vec<usize> = Vec::with_capacity(MAX_DIRECTIONS + 1);
            let mut directions: Vec<Vector3> = Vec::with_capacity(MAX_DIRECTIONS);
            let centre = match ranked.first() {
                Some(&c) => c,
                None => return chosen,
            };
            chosen.push(centre);

            for &i in ranked.iter().skip(1) {
                if directions.len() == MAX_DIRECTIONS {
                    break;
                }

                let d: Vector3 = positions.column(i) - positions.column(centre);
                if is_independent(&directions, &d) {
                    directions.push(d);
                    chosen.push(i);
                }
            }

            chosen
        })
        .collect()
}

/// Whether a direction adds a new dimension to those already chosen
fn is_independent(directions: &[Vector3], d: &Vector3) -> bool {
    let norm = d.norm();
    if norm <= f64::EPSILON {
        return false;
    }

    match directions {
        [] => true,
        [first] => first.cross(d).norm() > ANCHOR_ANGLE_THRESHOLD * first.norm() * norm,
        [first, second, ..] => {
            let normal = first.cross(second);
            normal.dot(d).abs() > ANCHOR_ANGLE_THRESHOLD * normal.norm() * norm
        }
    }
}

/// Centre-of-mass relative geometry filter for anchor assignments
struct Filter<'a> {
    centred1: &'a Matrix3N,
    centred2: &'a Matrix3N,
    tolerance: f64,
}

impl<'a> Filter<'a> {
    fn length_compatible(&self, i: usize, j: usize) -> bool {
        let difference = self.centred1.column(i).norm() - self.centred2.column(j).norm();
        difference.abs() <= 2.0 * self.tolerance
    }

    fn dot_compatible(&self, (i, j): (usize, usize), (k, l): (usize, usize)) -> bool {
        let (a, c) = (self.centred1.column(i), self.centred1.column(k));
        let (b, d) = (self.centred2.column(j), self.centred2.column(l));
        let slack = 2.0 * self.tolerance * (a.norm() + c.norm()) + 4.0 * self.tolerance.powi(2);
        (a.dot(&c) - b.dot(&d)).abs() <= slack
    }

    fn assignment_compatible(&self, pairs: &[(usize, usize)]) -> bool {
        pairs.iter()
            .tuple_combinations()
            .all(|(&p, &q)| self.dot_compatible(p, q))
    }
}

impl MinimalElementalAbundance {
    /// Candidate atoms of `b` for each anchor of `a` under a fragment pairing
    fn anchor_candidates(
        &self,
        a: &System,
        b: &System,
        anchors: &[Vec<usize>],
        pairing: &Permutation,
        filter: &Filter
    ) -> Vec<(usize, Vec<usize>)> {
        anchors.iter()
            .zip(pairing.sigma())
            .flat_map(|(fragment_anchors, &partner)| {
                let range = b.fragments[partner].atoms();
                fragment_anchors.iter().map(move |&anchor| {
                    let attributes: AtomAttributes = a.atoms.attributes(anchor.into());
                    let candidates = range.clone()
                        .filter(|&j| b.atoms.attributes(j.into()) == attributes)
                        .filter(|&j| filter.length_compatible(anchor, j))
                        .sorted_by_key(|&j| OrderedFloat((filter.centred1.column(anchor).norm() - filter.centred2.column(j).norm()).abs()))
                        .collect();
                    (anchor, candidates)
                })
            })
            .collect()
    }

    fn search(&self, a: &System, b: &System, environments: &Environments) -> Result<Verdict, AlignmentError> {
        let frame = Frame::new(&a.atoms, &b.atoms, self.tolerance, environment_pair(a, b, environments));
        let filter = Filter {centred1: &frame.centred1, centred2: &frame.centred2, tolerance: self.tolerance};
        let anchors = anchors(a);
        let mut degenerate = false;

        for pairing in permutations(a.fragments.len()) {
            let sizes_match = a.fragments.iter()
                .zip(pairing.sigma())
                .all(|(fragment, &partner)| fragment.len() == b.fragments[partner].len());
            if !sizes_match {
                continue;
            }

            let candidates = self.anchor_candidates(a, b, &anchors, &pairing, &filter);
            if candidates.iter().any(|(_, c)| c.is_empty()) {
                continue;
            }

            let assignments = candidates.iter()
                .map(|(_, c)| c.iter().copied())
                .multi_cartesian_product()
                .filter(|assigned| assigned.iter().all_unique());

            for assigned in assignments {
                let pairs: Vec<(usize, usize)> = candidates.iter()
                    .map(|(anchor, _)| *anchor)
                    .zip(assigned)
                    .collect();
                if !filter.assignment_compatible(&pairs) {
                    continue;
                }

                for reflection in Reflection::ALL {
                    let fit = frame.fit_pairs(reflection, &pairs);
                    degenerate |= fit.degenerate;
                    if let Some(superposition) = frame.validate(reflection, &fit) {
                        return Ok(Verdict::Match(superposition));
                    }
                }
            }
        }

        if degenerate {
            Ok(Verdict::Inconclusive)
        } else {
            Ok(Verdict::NoMatch)
        }
    }
}

impl EquivalenceSearch for MinimalElementalAbundance {
    fn compare(&self, a: &System, b: &System, environments: &Environments) -> Result<Verdict, AlignmentError> {
        if !fragments_compatible(a, b) {
            return Ok(Verdict::NoMatch);
        }

        if let Some(fragment) = a.fragments.iter().find(|fragment| fragment.len() < FULL_BASIS_ATOMS) {
            let needed = if fragment.len() < MIN_ANCHOR_ATOMS { "an anchor point" } else { "a full anchor basis" };
            log::debug!("System {} has a fragment of {} atoms, too few for {}, searching exhaustively", a.id, fragment.len(), needed);
            return self.fallback.compare(a, b, environments);
        }

        match self.search(a, b, environments)? {
            Verdict::Inconclusive => {
                log::debug!("Anchor fits for systems {} and {} were degenerate, searching exhaustively", a.id, b.id);
                self.fallback.compare(a, b, environments)
            },
            verdict => Ok(verdict),
        }
    }
}
