//! Crystal neighbourhoods used as a secondary alignment check

use std::collections::HashMap;

use crate::quaternions::Matrix3N;
use crate::system::{HeavyAtomSet, Molecule, SystemId, Vector3};

/// Absolute tolerance in Angstrom for superimposing neighbour atoms
pub const ENVIRONMENT_TOLERANCE: f64 = 0.1;

/// Neighbouring molecules of a system, in the same Cartesian frame as the system
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourEnvironment {
    /// All neighbour atoms, flattened
    pub atoms: HeavyAtomSet,
}

/// Optional per-system environments, missing entries skip validation
pub type Environments = HashMap<SystemId, NeighbourEnvironment>;

impl NeighbourEnvironment {
    pub fn new(neighbours: &[HeavyAtomSet]) -> NeighbourEnvironment {
        let atoms = neighbours.iter()
            .fold(HeavyAtomSet::empty(), |acc, neighbour| acc.concatenate(neighbour));
        NeighbourEnvironment {atoms}
    }

    /// Reduce full neighbour molecules the same way their system was reduced
    pub fn from_molecules(neighbours: &[Molecule], keep_hydrogens: bool) -> NeighbourEnvironment {
        let reduced: Vec<HeavyAtomSet> = neighbours.iter()
            .map(|molecule| molecule.reduce(keep_hydrogens).0)
            .collect();
        NeighbourEnvironment::new(&reduced)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Neighbour positions relative to some origin, e.g. the system's centre of mass
    pub fn positions_relative_to(&self, origin: &Vector3) -> Matrix3N {
        let mut positions = self.atoms.positions().clone();
        for mut v in positions.column_iter_mut() {
            v -= origin;
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use crate::environment::*;
    use crate::system::tests::{element, methanol};

    #[test]
    fn flattening() {
        let water = HeavyAtomSet::new(
            vec![element("O")],
            Matrix3N::from_column_slice(&[3.0, 0.0, 0.0]),
            vec![2]
        ).unwrap();
        let environment = NeighbourEnvironment::new(&[water.clone(), water.translated(&Vector3::new(0.0, 3.0, 0.0))]);
        assert_eq!(environment.len(), 2);
        assert_eq!(environment.atoms.hydrogens(), &[2, 2]);

        let relative = environment.positions_relative_to(&Vector3::new(1.0, 1.0, 0.0));
        approx::assert_relative_eq!(relative.column(1).y, 2.0);

        let from_molecules = NeighbourEnvironment::from_molecules(&[methanol(3), methanol(4)], false);
        assert_eq!(from_molecules.len(), 4);
        assert!(NeighbourEnvironment::new(&[]).is_empty());
    }
}
