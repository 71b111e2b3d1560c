//! Systems under comparison: molecules and dimers reduced to ordered heavy-atom sets
//!
//! Hydrogen atoms are folded into a per-atom attached-hydrogen count unless
//! they are explicitly kept. The order of the atoms in a [`HeavyAtomSet`]
//! defines the index space that permutations and mappings act on.

extern crate nalgebra as na;

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use itertools::Itertools;
use petgraph::graph::{NodeIndex, UnGraph};
use thiserror::Error;

use crate::element::{Element, ElementError};
use crate::permutation::{Permutation, PermutationError};
use crate::quaternions::Matrix3N;
use crate::strong::{Atom, FragmentIndex, Index};

pub type Vector3 = na::Vector3<f64>;

/// Identifier of a system within its collection (molecule or dimer id)
pub type SystemId = usize;
pub type MoleculeId = usize;
pub type DimerId = usize;

#[derive(Error, Debug, PartialEq)]
pub enum SystemError {
    #[error("Mismatched lengths: {elements} elements, {positions} positions, {hydrogens} hydrogen counts\n  elements: [{element_dump}]")]
    LengthMismatch {
        elements: usize,
        positions: usize,
        hydrogens: usize,
        element_dump: String,
    },
    #[error("Bond ({0}, {1}) is invalid for a molecule of {2} atoms")]
    InvalidBond(usize, usize, usize),
    #[error("Dimer {dimer} refers to unknown molecule {molecule}")]
    UnknownMolecule { dimer: DimerId, molecule: MoleculeId },
    #[error(transparent)]
    UnknownElement(#[from] ElementError),
    #[error("System id {0} occurs more than once")]
    DuplicateId(SystemId),
}

/// Attributes a bond graph vertex is compared by
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomAttributes {
    pub element: Element,
    /// Number of folded hydrogen atoms bonded to this atom
    pub hydrogens: usize,
}

impl std::fmt::Display for AtomAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.hydrogens {
            0 => write!(f, "{}", self.element),
            1 => write!(f, "{}H", self.element),
            h => write!(f, "{}H{}", self.element, h),
        }
    }
}

/// Chemical bond graph over a fragment's atoms, node indices match atom indices
pub type BondGraph = UnGraph<AtomAttributes, ()>;

/// Ordered sequence of atoms with attached-hydrogen counts
#[derive(Debug, Clone, PartialEq)]
pub struct HeavyAtomSet {
    elements: Vec<Element>,
    positions: Matrix3N,
    hydrogens: Vec<usize>,
}

impl HeavyAtomSet {
    pub fn new(elements: Vec<Element>, positions: Matrix3N, hydrogens: Vec<usize>) -> Result<HeavyAtomSet, SystemError> {
        if elements.len() != positions.ncols() || elements.len() != hydrogens.len() {
            return Err(SystemError::LengthMismatch {
                elements: elements.len(),
                positions: positions.ncols(),
                hydrogens: hydrogens.len(),
                element_dump: elements.iter().join(", "),
            });
        }

        Ok(HeavyAtomSet {elements, positions, hydrogens})
    }

    /// Atom set without any attached hydrogens
    pub fn without_hydrogen_counts(elements: Vec<Element>, positions: Matrix3N) -> Result<HeavyAtomSet, SystemError> {
        let hydrogens = vec![0; elements.len()];
        HeavyAtomSet::new(elements, positions, hydrogens)
    }

    pub fn empty() -> HeavyAtomSet {
        HeavyAtomSet {elements: Vec::new(), positions: Matrix3N::zeros(0), hydrogens: Vec::new()}
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn hydrogens(&self) -> &[usize] {
        &self.hydrogens
    }

    pub fn positions(&self) -> &Matrix3N {
        &self.positions
    }

    pub fn position(&self, atom: Atom) -> na::MatrixView3x1<f64> {
        self.positions.column(atom.to_usize())
    }

    pub fn attributes(&self, atom: Atom) -> AtomAttributes {
        let i = atom.to_usize();
        AtomAttributes {element: self.elements[i], hydrogens: self.hydrogens[i]}
    }

    pub fn iter_attributes(&self) -> impl Iterator<Item=AtomAttributes> + '_ {
        self.elements.iter()
            .zip(self.hydrogens.iter())
            .map(|(&element, &hydrogens)| AtomAttributes {element, hydrogens})
    }

    /// Sorted attributes of all atoms, equal for sets that can possibly be superimposed
    pub fn attribute_multiset(&self) -> Vec<AtomAttributes> {
        self.iter_attributes().sorted().collect()
    }

    /// Number of atoms per element, not counting folded hydrogens
    pub fn element_counts(&self) -> BTreeMap<Element, usize> {
        self.elements.iter().copied().counts().into_iter().collect()
    }

    /// Mass-weighted centre, attached hydrogen masses sit on their heavy atom
    pub fn centre_of_mass(&self) -> Vector3 {
        let hydrogen_mass = Element::HYDROGEN.mass();
        let (weighted, total) = self.iter_attributes()
            .zip(self.positions.column_iter())
            .fold((Vector3::zeros(), 0.0), |(sum, total), (attributes, position)| {
                let mass = attributes.element.mass() + attributes.hydrogens as f64 * hydrogen_mass;
                (sum + mass * position, total + mass)
            });

        if total > 0.0 {
            weighted / total
        } else {
            Vector3::zeros()
        }
    }

    /// Positions relative to the centre of mass
    pub fn centred_positions(&self) -> Matrix3N {
        let com = self.centre_of_mass();
        let mut centred = self.positions.clone();
        for mut v in centred.column_iter_mut() {
            v -= com;
        }
        centred
    }

    pub fn translated(&self, shift: &Vector3) -> HeavyAtomSet {
        let mut positions = self.positions.clone();
        for mut v in positions.column_iter_mut() {
            v += shift;
        }
        HeavyAtomSet {elements: self.elements.clone(), positions, hydrogens: self.hydrogens.clone()}
    }

    /// Append another set's atoms after this set's
    pub fn concatenate(&self, other: &HeavyAtomSet) -> HeavyAtomSet {
        let n = self.len();
        let m = other.len();
        let positions = Matrix3N::from_fn(n + m, |i, j| {
            if j < n {
                self.positions[(i, j)]
            } else {
                other.positions[(i, j - n)]
            }
        });

        HeavyAtomSet {
            elements: self.elements.iter().chain(other.elements.iter()).copied().collect(),
            positions,
            hydrogens: self.hydrogens.iter().chain(other.hydrogens.iter()).copied().collect(),
        }
    }

    /// Reorder atoms so that atom `i` of the result is atom `p(i)` of `self`
    pub fn gather(&self, p: &Permutation) -> Result<HeavyAtomSet, PermutationError> {
        if p.set_size() != self.len() {
            return Err(PermutationError::LengthMismatch);
        }

        let positions = Matrix3N::from_fn(self.len(), |i, j| self.positions[(i, p[j])]);
        Ok(HeavyAtomSet {
            elements: p.gather(&self.elements)?,
            positions,
            hydrogens: p.gather(&self.hydrogens)?,
        })
    }

    /// Human-readable dump for diagnostics
    pub fn dump(&self) -> String {
        self.iter_attributes()
            .zip(self.positions.column_iter())
            .map(|(attributes, p)| format!("{} ({:.4}, {:.4}, {:.4})", attributes, p.x, p.y, p.z))
            .join("; ")
    }
}

/// Full molecule as supplied by the crystal-processing collaborator
#[derive(Debug, Clone)]
pub struct Molecule {
    pub id: MoleculeId,
    pub elements: Vec<Element>,
    pub positions: Matrix3N,
    /// Bonds as pairs of atom indices
    pub bonds: Vec<(usize, usize)>,
}

impl Molecule {
    pub fn new(id: MoleculeId, elements: Vec<Element>, positions: Matrix3N, bonds: Vec<(usize, usize)>) -> Result<Molecule, SystemError> {
        if elements.len() != positions.ncols() {
            return Err(SystemError::LengthMismatch {
                elements: elements.len(),
                positions: positions.ncols(),
                hydrogens: elements.len(),
                element_dump: elements.iter().join(", "),
            });
        }

        let n = elements.len();
        if let Some(&(i, j)) = bonds.iter().find(|(i, j)| i == j || *i >= n || *j >= n) {
            return Err(SystemError::InvalidBond(i, j, n));
        }

        Ok(Molecule {id, elements, positions, bonds})
    }

    /// Construct from element symbols, e.g. `["C", "H", "H"]`
    pub fn from_symbols<S: AsRef<str>>(id: MoleculeId, symbols: &[S], positions: Matrix3N, bonds: Vec<(usize, usize)>) -> Result<Molecule, SystemError> {
        let elements = symbols.iter()
            .map(|s| s.as_ref().parse::<Element>())
            .collect::<Result<Vec<_>, _>>()?;
        Molecule::new(id, elements, positions, bonds)
    }

    /// Reduce to heavy atoms and their bond graph
    ///
    /// If `keep_hydrogens` is set, hydrogen atoms stay as explicit atoms and
    /// no counts are folded.
    pub fn reduce(&self, keep_hydrogens: bool) -> (HeavyAtomSet, BondGraph) {
        let kept: Vec<usize> = (0..self.elements.len())
            .filter(|&i| keep_hydrogens || !self.elements[i].is_hydrogen())
            .collect();
        let reindex: HashMap<usize, usize> = kept.iter()
            .enumerate()
            .map(|(new, &old)| (old, new))
            .collect();

        let mut hydrogens = vec![0; kept.len()];
        if !keep_hydrogens {
            for &(i, j) in self.bonds.iter() {
                match (self.elements[i].is_hydrogen(), self.elements[j].is_hydrogen()) {
                    (true, false) => hydrogens[reindex[&j]] += 1,
                    (false, true) => hydrogens[reindex[&i]] += 1,
                    _ => ()
                }
            }
        }

        let elements: Vec<Element> = kept.iter().map(|&i| self.elements[i]).collect();
        let positions = Matrix3N::from_fn(kept.len(), |r, c| self.positions[(r, kept[c])]);

        let mut graph = BondGraph::with_capacity(kept.len(), self.bonds.len());
        for (&element, &h) in elements.iter().zip(hydrogens.iter()) {
            graph.add_node(AtomAttributes {element, hydrogens: h});
        }
        for &(i, j) in self.bonds.iter() {
            if let (Some(&a), Some(&b)) = (reindex.get(&i), reindex.get(&j)) {
                graph.update_edge(NodeIndex::new(a), NodeIndex::new(b), ());
            }
        }

        let atoms = HeavyAtomSet {elements, positions, hydrogens};
        (atoms, graph)
    }
}

/// Pair of molecules placed relative to one another in the crystal
#[derive(Debug, Clone)]
pub struct Dimer {
    pub id: DimerId,
    pub molecule_a: MoleculeId,
    pub molecule_b: MoleculeId,
    /// Lattice translation applied to molecule B, in unit cells
    pub cell_displacement: [i32; 3],
    /// Cartesian translation placing molecule B relative to molecule A
    pub cartesian_displacement: Vector3,
    /// Shift between the centres of mass of A and the placed B
    pub com_shift: Vector3,
    /// Reference distance between the molecules
    pub distance: f64,
}

/// Contiguous block of a system's atoms originating from one molecule
#[derive(Debug, Clone)]
pub struct Fragment {
    pub molecule: MoleculeId,
    pub offset: usize,
    pub graph: BondGraph,
}

impl Fragment {
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn atoms(&self) -> Range<usize> {
        self.offset..(self.offset + self.len())
    }
}

/// A molecule or dimer under comparison
#[derive(Debug, Clone)]
pub struct System {
    pub id: SystemId,
    pub atoms: HeavyAtomSet,
    pub fragments: Vec<Fragment>,
}

impl System {
    pub fn from_molecule(molecule: &Molecule, keep_hydrogens: bool) -> System {
        let (atoms, graph) = molecule.reduce(keep_hydrogens);
        System {
            id: molecule.id,
            atoms,
            fragments: vec![Fragment {molecule: molecule.id, offset: 0, graph}]
        }
    }

    /// Concatenate the reduced molecules of a dimer, translating molecule B into place
    pub fn from_dimer(dimer: &Dimer, molecules: &BTreeMap<MoleculeId, Molecule>, keep_hydrogens: bool) -> Result<System, SystemError> {
        let lookup = |id| molecules.get(&id)
            .ok_or(SystemError::UnknownMolecule {dimer: dimer.id, molecule: id});
        let (atoms_a, graph_a) = lookup(dimer.molecule_a)?.reduce(keep_hydrogens);
        let (atoms_b, graph_b) = lookup(dimer.molecule_b)?.reduce(keep_hydrogens);

        let offset = atoms_a.len();
        let atoms = atoms_a.concatenate(&atoms_b.translated(&dimer.cartesian_displacement));
        let fragments = vec![
            Fragment {molecule: dimer.molecule_a, offset: 0, graph: graph_a},
            Fragment {molecule: dimer.molecule_b, offset, graph: graph_b},
        ];

        Ok(System {id: dimer.id, atoms, fragments})
    }

    pub fn fragment(&self, index: FragmentIndex) -> &Fragment {
        &self.fragments[index.to_usize()]
    }

    /// Atoms of a single fragment
    pub fn fragment_atoms(&self, index: FragmentIndex) -> HeavyAtomSet {
        let fragment = self.fragment(index);
        let range = fragment.atoms();
        HeavyAtomSet {
            elements: self.atoms.elements[range.clone()].to_vec(),
            positions: self.atoms.positions.columns(fragment.offset, fragment.len()).into_owned(),
            hydrogens: self.atoms.hydrogens[range].to_vec(),
        }
    }
}

/// Build systems for a molecule collection, ordered by id
pub fn molecule_systems(molecules: &BTreeMap<MoleculeId, Molecule>, keep_hydrogens: bool) -> Vec<System> {
    molecules.values()
        .map(|molecule| System::from_molecule(molecule, keep_hydrogens))
        .collect()
}

/// Build systems for a dimer collection, ordered by id
pub fn dimer_systems(dimers: &BTreeMap<DimerId, Dimer>, molecules: &BTreeMap<MoleculeId, Molecule>, keep_hydrogens: bool) -> Result<Vec<System>, SystemError> {
    dimers.values()
        .map(|dimer| System::from_dimer(dimer, molecules, keep_hydrogens))
        .collect()
}
