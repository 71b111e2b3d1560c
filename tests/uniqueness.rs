use std::collections::BTreeMap;

use invarmol::alignment::{align, Verdict};
use invarmol::config::{InvarianceMethod, Method, UniquenessConfig};
use invarmol::element::Element;
use invarmol::environment::Environments;
use invarmol::groups::equivalence_groups;
use invarmol::quaternions::{random_rotation, Matrix3, Matrix3N};
use invarmol::system::{Dimer, HeavyAtomSet, Molecule, MoleculeId, Vector3};
use invarmol::uniqueness::{find_unique_dimers, find_unique_molecules};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(method: InvarianceMethod, keep_hydrogens: bool) -> UniquenessConfig {
    let mut config = UniquenessConfig::default();
    config.method = Method::Invariance;
    config.invariance.method = method;
    config.invariance.include_hydrogens_in_uniqueness_analysis = keep_hydrogens;
    config
}

fn transformed(positions: &Matrix3N, operator: &Matrix3, shift: &Vector3) -> Matrix3N {
    let mut result = operator * positions;
    for mut v in result.column_iter_mut() {
        v += shift;
    }
    result
}

/// Methyl radical, pyramidalized so that it is not planar
fn methyl(id: MoleculeId, symbols: &[&str], operator: &Matrix3) -> Molecule {
    let positions = Matrix3N::from_column_slice(&[
        0.0, 0.0, 0.0,
        1.03, 0.0, 0.3,
        -0.515, 0.892, 0.3,
        -0.515, -0.892, 0.3,
    ]);
    let positions = transformed(&positions, operator, &Vector3::zeros());
    Molecule::from_symbols(id, symbols, positions, vec![(0, 1), (0, 2), (0, 3)]).unwrap()
}

/// Chiral amino alcohol with hydrogens on the heteroatoms
fn amino_alcohol(id: MoleculeId, operator: &Matrix3, shift: &Vector3, distortion: f64) -> Molecule {
    let positions = Matrix3N::from_column_slice(&[
        0.0, 0.0, 0.0,
        1.53, 0.0, 0.0,
        2.1, 1.42, 0.0,
        -0.55, -1.3, 0.45,
        2.05, -0.75, 1.15,
        3.5, 1.5 + distortion, -0.3,
        -1.55, -1.25, 0.5,
        -0.2, -1.6, 1.35,
        2.55, -0.35, 1.9,
    ]);
    Molecule::from_symbols(
        id,
        &["C", "C", "C", "N", "O", "C", "H", "H", "H"],
        transformed(&positions, operator, shift),
        vec![(0, 1), (1, 2), (0, 3), (1, 4), (2, 5), (3, 6), (3, 7), (4, 8)]
    ).unwrap()
}

fn rotation_about_z(degrees: f64) -> Matrix3 {
    let angle = degrees.to_radians();
    Matrix3::new(
        angle.cos(), -angle.sin(), 0.0,
        angle.sin(), angle.cos(), 0.0,
        0.0, 0.0, 1.0,
    )
}

fn random_matrix() -> Matrix3 {
    random_rotation().to_rotation_matrix().into_inner()
}

fn mirror() -> Matrix3 {
    Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0))
}

#[test]
fn rotated_methyl_is_equivalent() {
    init_logging();
    let mut molecules = BTreeMap::new();
    molecules.insert(0, methyl(0, &["C", "H", "H", "H"], &Matrix3::identity()));
    molecules.insert(1, methyl(1, &["C", "H", "H", "H"], &rotation_about_z(90.0)));

    for keep_hydrogens in [false, true] {
        let result = find_unique_molecules(&molecules, &config(InvarianceMethod::Combination, keep_hydrogens), &Environments::new()).unwrap();
        assert_eq!(result.unique, vec![0]);
        assert_eq!(result.pairs, vec![(0, 1)]);
    }
}

#[test]
fn substituted_methyl_is_distinct() {
    init_logging();
    let mut molecules = BTreeMap::new();
    molecules.insert(0, methyl(0, &["C", "H", "H", "H"], &Matrix3::identity()));
    molecules.insert(1, methyl(1, &["C", "F", "H", "H"], &rotation_about_z(90.0)));

    for method in [InvarianceMethod::Comprehensive, InvarianceMethod::MinimalElementalAbundance] {
        let result = find_unique_molecules(&molecules, &config(method, false), &Environments::new()).unwrap();
        assert_eq!(result.unique, vec![0, 1]);
        assert!(result.pairs.is_empty());
    }
}

#[test]
fn strategies_agree() {
    init_logging();
    let mut molecules = BTreeMap::new();
    molecules.insert(0, amino_alcohol(0, &Matrix3::identity(), &Vector3::zeros(), 0.0));
    molecules.insert(1, amino_alcohol(1, &random_matrix(), &Vector3::new(4.0, -2.0, 9.0), 0.0));
    molecules.insert(2, amino_alcohol(2, &(random_matrix() * mirror()), &Vector3::new(-3.0, 1.0, 0.0), 0.0));
    molecules.insert(3, amino_alcohol(3, &Matrix3::identity(), &Vector3::zeros(), 0.5));
    molecules.insert(4, amino_alcohol(4, &random_matrix(), &Vector3::new(0.0, 6.0, 0.0), 0.5));

    let expected: BTreeMap<usize, Vec<usize>> = BTreeMap::from([(0, vec![1, 2]), (3, vec![4])]);
    for method in [InvarianceMethod::Comprehensive, InvarianceMethod::MinimalElementalAbundance, InvarianceMethod::Combination] {
        let result = find_unique_molecules(&molecules, &config(method, false), &Environments::new()).unwrap();
        assert_eq!(result.unique, vec![0, 3], "{} search", method);
        assert_eq!(result.group_map(), expected, "{} search", method);
    }
}

#[test]
fn swapped_dimer_fragments_are_equivalent() {
    init_logging();
    let mut molecules = BTreeMap::new();
    molecules.insert(0, amino_alcohol(0, &Matrix3::identity(), &Vector3::zeros(), 0.0));
    molecules.insert(1, amino_alcohol(1, &Matrix3::identity(), &Vector3::zeros(), 0.0));

    let dimer = |id, a, b, displacement: Vector3| Dimer {
        id,
        molecule_a: a,
        molecule_b: b,
        cell_displacement: [0, 0, displacement.z.signum() as i32],
        cartesian_displacement: displacement,
        com_shift: displacement,
        distance: displacement.norm(),
    };

    let mut dimers = BTreeMap::new();
    dimers.insert(10, dimer(10, 0, 1, Vector3::new(0.0, 0.0, 3.6)));
    dimers.insert(11, dimer(11, 1, 0, Vector3::new(0.0, 0.0, -3.6)));
    dimers.insert(12, dimer(12, 0, 1, Vector3::new(1.2, 0.0, 3.6)));

    for method in [InvarianceMethod::Comprehensive, InvarianceMethod::MinimalElementalAbundance] {
        let result = find_unique_dimers(&dimers, &molecules, &config(method, false), &Environments::new()).unwrap();
        assert_eq!(result.unique, vec![10, 12], "{} search", method);
        assert_eq!(result.pairs, vec![(10, 11)], "{} search", method);
    }
}

#[test]
fn parallel_sweep_matches_sequential() {
    init_logging();
    let molecules: BTreeMap<MoleculeId, Molecule> = (0..8)
        .map(|id| {
            let distortion = if id % 2 == 0 { 0.0 } else { 0.5 };
            (id, amino_alcohol(id, &random_matrix(), &Vector3::new(id as f64, 0.0, 0.0), distortion))
        })
        .collect();

    let sequential = config(InvarianceMethod::Combination, false);
    let mut parallel = sequential.clone();
    parallel.invariance.worker_count = 3;

    let expected = find_unique_molecules(&molecules, &sequential, &Environments::new()).unwrap();
    assert_eq!(expected.unique, vec![0, 1]);
    assert_eq!(find_unique_molecules(&molecules, &parallel, &Environments::new()).unwrap(), expected);
}

#[test]
fn pairwise_equivalence_is_not_transitive() {
    let groups = equivalence_groups(&[1, 2, 3], &[(1, 2), (2, 3)]).unwrap();
    assert_eq!(groups.representatives(), vec![1, 3]);
}

#[test]
fn configuration_from_yaml() {
    let config = UniquenessConfig::from_yaml_str("method: none\n").unwrap();
    let mut molecules = BTreeMap::new();
    molecules.insert(5, methyl(5, &["C", "H", "H", "H"], &Matrix3::identity()));
    molecules.insert(6, methyl(6, &["C", "H", "H", "H"], &Matrix3::identity()));

    let result = find_unique_molecules(&molecules, &config, &Environments::new()).unwrap();
    assert_eq!(result.unique, vec![5, 6]);
}

fn atom_set(symbols: &[&str], positions: Matrix3N) -> HeavyAtomSet {
    let elements: Vec<Element> = symbols.iter().map(|s| s.parse().unwrap()).collect();
    HeavyAtomSet::without_hydrogen_counts(elements, positions).unwrap()
}

fn tetrahedral_corner() -> Matrix3N {
    Matrix3N::from_column_slice(&[
        0.0, 0.0, 0.0,
        1.0, 0.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
    ])
}

#[test]
fn explicit_methyl_alignment() {
    let s1 = atom_set(&["C", "H", "H", "H"], tetrahedral_corner());
    let s2 = atom_set(&["C", "H", "H", "H"], rotation_about_z(90.0) * tetrahedral_corner());
    assert!(align(&s1, &s2, 0.01, None).unwrap().is_match());

    let substituted = atom_set(&["C", "H", "F", "H"], rotation_about_z(90.0) * tetrahedral_corner());
    assert_eq!(align(&s1, &substituted, 0.01, None).unwrap(), Verdict::NoMatch);
}

#[test]
fn alignment_is_invariant_under_common_motions() {
    let reference = amino_alcohol(0, &Matrix3::identity(), &Vector3::zeros(), 0.0).reduce(false).0;
    let rotated = amino_alcohol(1, &random_matrix(), &Vector3::new(1.0, 2.0, 3.0), 0.0).reduce(false).0;
    let distorted = amino_alcohol(2, &random_matrix(), &Vector3::zeros(), 0.3).reduce(false).0;

    for operator in [random_matrix(), random_matrix() * mirror()] {
        let moved = |atoms: &HeavyAtomSet| HeavyAtomSet::new(
            atoms.elements().to_vec(),
            transformed(atoms.positions(), &operator, &Vector3::new(-5.0, 0.0, 2.0)),
            atoms.hydrogens().to_vec()
        ).unwrap();

        for other in [&rotated, &distorted] {
            let before = align(&reference, other, 0.01, None).unwrap().is_match();
            let after = align(&moved(&reference), &moved(other), 0.01, None).unwrap().is_match();
            assert_eq!(before, after);
        }
    }

    assert!(align(&reference, &rotated, 0.01, None).unwrap().is_match());
    assert!(!align(&reference, &distorted, 0.01, None).unwrap().is_match());
    assert_eq!(reference.len(), 6);
}
