use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Column-major 4x4 matrix, laid out the way devices report poses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4 {
    elements: [f32; 16],
}

impl Matrix4 {
    pub const fn identity() -> Self {
        Self {
            elements: [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    pub const fn from_array(elements: [f32; 16]) -> Self {
        Self { elements }
    }

    /// Reads the first 16 values of `values`. Returns `None` if there are fewer.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let elements: [f32; 16] = values.get(..16)?.try_into().ok()?;
        Some(Self { elements })
    }

    pub const fn to_array(&self) -> [f32; 16] {
        self.elements
    }

    pub fn element(&self, row: usize, column: usize) -> f32 {
        self.elements[column * 4 + row]
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut matrix = Self::identity();
        matrix.elements[12] = x;
        matrix.elements[13] = y;
        matrix.elements[14] = z;
        matrix
    }

    pub fn rotation_y(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::from_array([
            cos, 0.0, -sin, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            sin, 0.0, cos, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Builds a transform from a position, a unit quaternion `[x, y, z, w]` and a scale.
    pub fn compose(position: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let [x, y, z, w] = rotation;
        let (x2, y2, z2) = (x + x, y + y, z + z);
        let (xx, xy, xz) = (x * x2, x * y2, x * z2);
        let (yy, yz, zz) = (y * y2, y * z2, z * z2);
        let (wx, wy, wz) = (w * x2, w * y2, w * z2);
        let [sx, sy, sz] = scale;

        Self::from_array([
            (1.0 - (yy + zz)) * sx,
            (xy + wz) * sx,
            (xz - wy) * sx,
            0.0,
            (xy - wz) * sy,
            (1.0 - (xx + zz)) * sy,
            (yz + wx) * sy,
            0.0,
            (xz + wy) * sz,
            (yz - wx) * sz,
            (1.0 - (xx + yy)) * sz,
            0.0,
            position[0],
            position[1],
            position[2],
            1.0,
        ])
    }

    /// Right-handed perspective projection with a vertical field of view in radians.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let f = 1.0 / (fov_y * 0.5).tan();
        let range = 1.0 / (near - far);
        Self::from_array([
            f / aspect,
            0.0,
            0.0,
            0.0,
            0.0,
            f,
            0.0,
            0.0,
            0.0,
            0.0,
            (far + near) * range,
            -1.0,
            0.0,
            0.0,
            2.0 * far * near * range,
            0.0,
        ])
    }

    pub fn multiply(&self, other: &Matrix4) -> Matrix4 {
        let a = &self.elements;
        let b = &other.elements;
        let mut out = [0.0f32; 16];
        for column in 0..4 {
            for row in 0..4 {
                out[column * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[column * 4 + k]).sum();
            }
        }
        Matrix4::from_array(out)
    }

    /// General inverse. Returns `None` when the determinant is zero.
    pub fn inverse(&self) -> Option<Matrix4> {
        let m = &self.elements;
        let mut inv = [0.0f32; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14]
            + m[13] * m[6] * m[11]
            - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14]
            - m[12] * m[6] * m[11]
            + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13]
            + m[12] * m[5] * m[11]
            - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13]
            - m[12] * m[5] * m[10]
            + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14]
            - m[13] * m[2] * m[11]
            + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14]
            + m[12] * m[2] * m[11]
            - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13]
            - m[12] * m[1] * m[11]
            + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13]
            + m[12] * m[1] * m[10]
            - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14]
            + m[13] * m[2] * m[7]
            - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14]
            - m[12] * m[2] * m[7]
            + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13]
            + m[12] * m[1] * m[7]
            - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13]
            - m[12] * m[1] * m[6]
            + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10]
            - m[9] * m[2] * m[7]
            + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10]
            + m[8] * m[2] * m[7]
            - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9]
            - m[8] * m[1] * m[7]
            + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9]
            + m[8] * m[1] * m[6]
            - m[8] * m[2] * m[5];

        let determinant = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        if determinant == 0.0 || !determinant.is_finite() {
            return None;
        }

        let scale = 1.0 / determinant;
        for value in inv.iter_mut() {
            *value *= scale;
        }
        Some(Matrix4::from_array(inv))
    }

    pub fn position(&self) -> [f32; 3] {
        [self.elements[12], self.elements[13], self.elements[14]]
    }

    pub fn transform_point(&self, point: [f32; 3]) -> [f32; 3] {
        let e = &self.elements;
        let [x, y, z] = point;
        let w = e[3] * x + e[7] * y + e[11] * z + e[15];
        let w = if w == 0.0 { 1.0 } else { w };
        [
            (e[0] * x + e[4] * y + e[8] * z + e[12]) / w,
            (e[1] * x + e[5] * y + e[9] * z + e[13]) / w,
            (e[2] * x + e[6] * y + e[10] * z + e[14]) / w,
        ]
    }

    pub fn approx_eq(&self, other: &Matrix4, epsilon: f32) -> bool {
        self.elements
            .iter()
            .zip(other.elements.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, rhs: Matrix4) -> Matrix4 {
        self.multiply(&rhs)
    }
}

impl Mul<&Matrix4> for &Matrix4 {
    type Output = Matrix4;

    fn mul(self, rhs: &Matrix4) -> Matrix4 {
        self.multiply(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn from_slice_requires_sixteen_values() {
        assert!(Matrix4::from_slice(&[0.0; 15]).is_none());
        let matrix = Matrix4::from_slice(&[1.0; 20]).expect("enough values");
        assert_eq!(matrix.to_array(), [1.0; 16]);
    }

    #[test]
    fn translation_is_stored_in_last_column() {
        let matrix = Matrix4::translation(1.0, 2.0, 3.0);
        assert_eq!(matrix.position(), [1.0, 2.0, 3.0]);
        assert_eq!(matrix.element(0, 3), 1.0);
        assert_eq!(matrix.transform_point([1.0, 1.0, 1.0]), [2.0, 3.0, 4.0]);
    }

    #[test]
    fn multiply_applies_right_operand_first() {
        let translate = Matrix4::translation(0.0, 0.0, -2.0);
        let rotate = Matrix4::rotation_y(std::f32::consts::FRAC_PI_2);
        let point = (rotate * translate).transform_point([0.0, 0.0, 0.0]);
        assert!((point[0] + 2.0).abs() < EPSILON, "got {point:?}");
        assert!(point[2].abs() < EPSILON, "got {point:?}");
    }

    #[test]
    fn compose_with_identity_rotation_is_translation_and_scale() {
        let matrix = Matrix4::compose([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0], [2.0, 2.0, 2.0]);
        assert_eq!(matrix.transform_point([1.0, 0.0, 0.0]), [3.0, 2.0, 3.0]);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let flat = Matrix4::compose([0.0; 3], [0.0, 0.0, 0.0, 1.0], [1.0, 0.0, 1.0]);
        assert!(flat.inverse().is_none());
    }

    #[test]
    fn perspective_maps_near_plane_to_minus_one() {
        let projection = Matrix4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 1000.0);
        let projected = projection.transform_point([0.0, 0.0, -0.1]);
        assert!((projected[2] + 1.0).abs() < EPSILON, "got {projected:?}");
    }

    proptest! {
        #[test]
        fn rigid_transforms_invert_to_identity(
            x in -50.0f32..50.0,
            y in -50.0f32..50.0,
            z in -50.0f32..50.0,
            yaw in -3.1f32..3.1,
        ) {
            let matrix = Matrix4::translation(x, y, z) * Matrix4::rotation_y(yaw);
            let inverse = matrix.inverse().expect("rigid transforms are invertible");
            prop_assert!((matrix * inverse).approx_eq(&Matrix4::identity(), EPSILON));
        }
    }
}
