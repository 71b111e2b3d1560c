//! Exhaustive search over bond graph isomorphisms

use itertools::Itertools;

use crate::alignment::{align, same_composition, AlignmentError, Superposition, Verdict};
use crate::environment::Environments;
use crate::isomorphism::{isomorphisms, IndexMapping, SelfComparison};
use crate::permutation::{permutations, Permutation};
use crate::search::{environment_pair, EquivalenceSearch};
use crate::system::System;

/// Tries every combination of per-fragment isomorphisms under every fragment pairing
#[derive(Debug, Clone)]
pub struct Comprehensive {
    pub tolerance: f64,
}

impl Comprehensive {
    pub fn new(tolerance: f64) -> Comprehensive {
        Comprehensive {tolerance}
    }
}

/// Per-fragment isomorphisms from the fragments of `a` onto their paired fragments of `b`
///
/// Fragment `i` of `a` is paired with fragment `pairing(i)` of `b`. Returns
/// `None` if some fragment pair admits no isomorphism.
fn fragment_isomorphisms(a: &System, b: &System, pairing: &Permutation) -> Option<Vec<Vec<IndexMapping>>> {
    let mut result = Vec::with_capacity(a.fragments.len());
    for (fragment, &partner) in a.fragments.iter().zip(pairing.sigma()) {
        let mappings = isomorphisms(&fragment.graph, &b.fragments[partner].graph, SelfComparison::Exclude);
        if mappings.is_empty() {
            return None;
        }
        result.push(mappings);
    }
    Some(result)
}

/// Lazy sequence of whole-system permutations for one fragment pairing
///
/// Each yielded permutation maps atom indices of `a` onto atom indices of `b`.
pub fn candidate_permutations<'a>(
    b: &'a System,
    pairing: &'a Permutation,
    per_fragment: &'a [Vec<IndexMapping>]
) -> impl Iterator<Item=Permutation> + 'a {
    per_fragment.iter()
        .map(|mappings| mappings.iter())
        .multi_cartesian_product()
        .map(move |combination| {
            let blocks: Vec<(&Permutation, usize)> = combination.iter()
                .zip(pairing.sigma())
                .map(|(mapping, &partner)| (&mapping.permutation, b.fragments[partner].offset))
                .collect();
            Permutation::concatenate(&blocks)
        })
}

/// Whether the fragments can be paired at all
pub fn fragments_compatible(a: &System, b: &System) -> bool {
    a.fragments.len() == b.fragments.len()
        && a.atoms.len() == b.atoms.len()
        && same_composition(&a.atoms, &b.atoms)
}

impl EquivalenceSearch for Comprehensive {
    fn compare(&self, a: &System, b: &System, environments: &Environments) -> Result<Verdict, AlignmentError> {
        if !fragments_compatible(a, b) {
            return Ok(Verdict::NoMatch);
        }

        let environments = environment_pair(a, b, environments);
        for pairing in permutations(a.fragments.len()) {
            let per_fragment = match fragment_isomorphisms(a, b, &pairing) {
                Some(lists) => lists,
                None => continue,
            };

            for candidate in candidate_permutations(b, &pairing, &per_fragment) {
                let reordered = b.atoms.gather(&candidate)?;
                if let Verdict::Match(superposition) = align(&a.atoms, &reordered, self.tolerance, environments)? {
                    // Express the correspondence in the original order of b
                    let correspondence = superposition.correspondence.compose(&IndexMapping::new(candidate))?;
                    log::debug!("Systems {} and {} match with fragment pairing {}", a.id, b.id, pairing);
                    return Ok(Verdict::Match(Superposition {
                        correspondence,
                        ..superposition
                    }));
                }
            }
        }

        Ok(Verdict::NoMatch)
    }
}
