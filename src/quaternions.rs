extern crate nalgebra as na;

pub type Matrix3N = na::Matrix3xX<f64>;
pub type Matrix3 = na::Matrix3<f64>;
pub type Quaternion = na::UnitQuaternion<f64>;
type Matrix4 = na::Matrix4<f64>;

/// Relative eigenvalue gap below which a fitted rotation is not uniquely determined
pub const DEGENERACY_THRESHOLD: f64 = 1e-3;

pub fn random_rotation() -> Quaternion {
    let random_axis = na::Unit::new_normalize(na::Vector3::new_random() - na::Vector3::repeat(0.5));
    let random_angle = rand::random::<f64>() * std::f64::consts::PI;
    Quaternion::from_axis_angle(&random_axis, random_angle)
}

pub fn quaternion_pair_contribution<'a>(stator_col: &na::MatrixView3x1<'a, f64>, rotor_col: &na::MatrixView3x1<'a, f64>) -> Matrix4 {
    let mut a = Matrix4::zeros();

    let forward_difference = (rotor_col - stator_col).transpose();
    a.fixed_view_mut::<1, 3>(0, 1).copy_from(&forward_difference);

    let backward_difference = stator_col - rotor_col;
    a.fixed_view_mut::<3, 1>(1, 0).copy_from(&backward_difference);

    let mut block = Matrix3::zeros();
    let sum = stator_col + rotor_col;
    for (col, mut block_col) in Matrix3::identity().column_iter().zip(block.column_iter_mut()) {
        block_col.copy_from(&col.cross(&sum));
    }
    a.fixed_view_mut::<3, 3>(1, 1).copy_from(&block);

    a.transpose() * a
}

/// Least-squares rotation between two point sets
#[derive(Debug, Clone)]
pub struct Fit {
    pub quaternion: Quaternion,
    /// Sum of squared deviations remaining after rotation
    pub msd: f64,
    /// Whether the two lowest eigenvalues coincide, i.e. the rotation is not unique
    pub degenerate: bool,
}

impl Fit {
    pub fn rotation_matrix(&self) -> Matrix3 {
        self.quaternion.to_rotation_matrix().into_inner()
    }
}

/// Extract the best rotation from the summed pair contributions
///
/// `scale` is the summed squared norm of all participating points, against
/// which the eigenvalue gap is compared.
pub fn quaternion_decomposition(mat: Matrix4, scale: f64) -> Fit {
    let decomposition = na::SymmetricEigen::new(mat);

    let mut order: Vec<usize> = (0..4).collect();
    order.sort_by(|&i, &j| decomposition.eigenvalues[i].total_cmp(&decomposition.eigenvalues[j]));
    let msd = decomposition.eigenvalues[order[0]].max(0.0);
    let gap = decomposition.eigenvalues[order[1]] - decomposition.eigenvalues[order[0]];
    let degenerate = !(scale > f64::EPSILON) || gap <= DEGENERACY_THRESHOLD * scale;

    let q = decomposition.eigenvectors.column(order[0]);
    let pre_quat = na::Quaternion::new(q[0], q[1], q[2], q[3]);

    Fit {
        quaternion: na::UnitQuaternion::from_quaternion(pre_quat),
        msd,
        degenerate
    }
}

/// Find a quaternion that best transforms the stator into the rotor
///
/// Rotations are about the origin, so both matrices should be expressed
/// relative to corresponding reference points (e.g. their centres of mass).
///
/// Postconditions
/// - rotor = quat * stator and stator = quat.inverse() * rotor
/// - The resulting quaternion is a proper rotation (no inversions)
pub fn fit(stator: &Matrix3N, rotor: &Matrix3N) -> Fit {
    debug_assert_eq!(stator.ncols(), rotor.ncols());

    let mut a = Matrix4::zeros();
    let mut scale = 0.0;
    for (rotor_col, stator_col) in rotor.column_iter().zip(stator.column_iter()) {
        a += quaternion_pair_contribution(&stator_col, &rotor_col);
        scale += stator_col.norm_squared() + rotor_col.norm_squared();
    }

    quaternion_decomposition(a, scale)
}

/// Fit only the listed (stator column, rotor column) pairs
pub fn fit_with_pairs(stator: &Matrix3N, rotor: &Matrix3N, pairs: &[(usize, usize)]) -> Fit {
    let mut a = Matrix4::zeros();
    let mut scale = 0.0;
    for &(stator_i, rotor_i) in pairs {
        let stator_col = stator.column(stator_i);
        let rotor_col = rotor.column(rotor_i);
        a += quaternion_pair_contribution(&stator_col, &rotor_col);
        scale += stator_col.norm_squared() + rotor_col.norm_squared();
    }

    quaternion_decomposition(a, scale)
}
