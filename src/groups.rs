//! Partition of systems into equivalence groups
//!
//! Pairwise equivalence found by superposition under a tolerance is not
//! transitive. Groups are therefore grown as cliques: an id joins a group only
//! if it is equivalent to every current member.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use itertools::Itertools;
use sorted_vec::SortedVec;
use thiserror::Error;

use crate::system::SystemId;

/// Unordered pair of equivalent systems, stored as `(min, max)`
pub type EquivalencePair = (SystemId, SystemId);

pub fn normalize((a, b): EquivalencePair) -> EquivalencePair {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GroupError {
    #[error("Id {id} occurs more than once in group {representative}\n  partition: {partition}")]
    DuplicateMember {
        representative: SystemId,
        id: SystemId,
        partition: String,
    },
    #[error("Id {id} occurs in several groups: {representatives:?}\n  partition: {partition}")]
    MultipleGroups {
        id: SystemId,
        representatives: Vec<SystemId>,
        partition: String,
    },
    #[error("Id {id} is missing from all groups\n  partition: {partition}")]
    MissingId {
        id: SystemId,
        partition: String,
    },
    #[error("Group {representative} contains id {id}, which is not part of the analysed systems\n  partition: {partition}")]
    ForeignId {
        representative: SystemId,
        id: SystemId,
        partition: String,
    },
    #[error("Group {representative} is not represented by its smallest member\n  partition: {partition}")]
    InvalidRepresentative {
        representative: SystemId,
        partition: String,
    },
}

/// Groups keyed by their representative, the smallest member id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceGroups {
    groups: BTreeMap<SystemId, SortedVec<SystemId>>,
}

impl EquivalenceGroups {
    /// Build from explicit groups, checking that they partition the universe
    pub fn new(universe: &[SystemId], groups: Vec<SortedVec<SystemId>>) -> Result<EquivalenceGroups, GroupError> {
        let groups: BTreeMap<SystemId, SortedVec<SystemId>> = groups.into_iter()
            .filter_map(|members| members.first().copied().map(|representative| (representative, members)))
            .collect();
        let partition = EquivalenceGroups {groups};
        partition.verify(universe)?;
        Ok(partition)
    }

    pub fn verify(&self, universe: &[SystemId]) -> Result<(), GroupError> {
        let universe: BTreeSet<SystemId> = universe.iter().copied().collect();
        let mut owners: BTreeMap<SystemId, Vec<SystemId>> = BTreeMap::new();

        for (&representative, members) in self.groups.iter() {
            if members.first() != Some(&representative) {
                return Err(GroupError::InvalidRepresentative {representative, partition: self.dump()});
            }

            if let Some((&id, _)) = members.iter().tuple_windows().find(|(a, b)| a == b) {
                return Err(GroupError::DuplicateMember {representative, id, partition: self.dump()});
            }

            for &id in members.iter() {
                if !universe.contains(&id) {
                    return Err(GroupError::ForeignId {representative, id, partition: self.dump()});
                }
                owners.entry(id).or_default().push(representative);
            }
        }

        if let Some((&id, representatives)) = owners.iter().find(|(_, r)| r.len() > 1) {
            return Err(GroupError::MultipleGroups {id, representatives: representatives.clone(), partition: self.dump()});
        }

        if let Some(&id) = universe.iter().find(|id| !owners.contains_key(id)) {
            return Err(GroupError::MissingId {id, partition: self.dump()});
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sorted representative ids
    pub fn representatives(&self) -> Vec<SystemId> {
        self.groups.keys().copied().collect()
    }

    /// Members of a group other than its representative, sorted
    pub fn members(&self, representative: SystemId) -> Option<&[SystemId]> {
        self.groups.get(&representative).map(|members| &members[1..])
    }

    /// Representative of the group containing an id
    pub fn representative_of(&self, id: SystemId) -> Option<SystemId> {
        self.groups.iter()
            .find(|(_, members)| members.binary_search(&id).is_ok())
            .map(|(&representative, _)| representative)
    }

    /// Representatives with their remaining members
    pub fn iter(&self) -> impl Iterator<Item=(SystemId, &[SystemId])> + '_ {
        self.groups.iter().map(|(&representative, members)| (representative, &members[1..]))
    }

    /// Representative to the sorted remaining members of its group
    pub fn to_map(&self) -> BTreeMap<SystemId, Vec<SystemId>> {
        self.iter()
            .map(|(representative, members)| (representative, members.to_vec()))
            .collect()
    }

    /// Human-readable partition for diagnostics
    pub fn dump(&self) -> String {
        self.groups.iter()
            .map(|(representative, members)| format!("{}: [{}]", representative, members.iter().join(", ")))
            .join("; ")
    }
}

/// Partition the universe into cliques of pairwise equivalent ids
///
/// Pairs are processed in ascending normalised order. A pair whose ids are
/// both already grouped is skipped, whether the groups coincide or not. Ids
/// without any admitted pair become singleton groups.
pub fn equivalence_groups(universe: &[SystemId], pairs: &[EquivalencePair]) -> Result<EquivalenceGroups, GroupError> {
    let ordered: Vec<EquivalencePair> = pairs.iter()
        .map(|&pair| normalize(pair))
        .filter(|(a, b)| a != b)
        .sorted()
        .dedup()
        .collect();
    let equivalent: HashSet<EquivalencePair> = ordered.iter().copied().collect();
    let is_equivalent = |a: SystemId, b: SystemId| equivalent.contains(&normalize((a, b)));

    let mut groups: Vec<SortedVec<SystemId>> = Vec::new();
    let mut membership: HashMap<SystemId, usize> = HashMap::new();

    for &(a, b) in ordered.iter() {
        match (membership.get(&a).copied(), membership.get(&b).copied()) {
            (Some(_), Some(_)) => continue,
            (Some(g), None) | (None, Some(g)) => {
                let outsider = if membership.contains_key(&a) { b } else { a };
                if groups[g].iter().all(|&member| is_equivalent(member, outsider)) {
                    groups[g].insert(outsider);
                    membership.insert(outsider, g);
                } else {
                    log::debug!("Id {} is not equivalent to every member of group {:?}", outsider, groups[g].as_slice());
                }
            },
            (None, None) => {
                membership.insert(a, groups.len());
                membership.insert(b, groups.len());
                groups.push(SortedVec::from_unsorted(vec![a, b]));
            },
        }
    }

    let singletons: Vec<SystemId> = universe.iter()
        .copied()
        .filter(|id| !membership.contains_key(id))
        .sorted()
        .dedup()
        .collect();
    groups.extend(singletons.into_iter().map(|id| SortedVec::from_unsorted(vec![id])));

    EquivalenceGroups::new(universe, groups)
}
