//! World-from-camera rigid transform.

use serde::{Deserialize, Serialize};

use super::point::{FrameId, Point3D, RawPoint};

/// Tolerance for the homogeneous bottom row check
const AFFINE_EPSILON: f32 = 1e-5;

/// A 4×4 world-from-camera transform, column-major.
///
/// Element `(row, col)` lives at index `col * 4 + row`, matching the layout
/// handed out by the AR SDK and OpenGL.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    matrix: [f32; 16],
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity transform (camera frame == world frame)
    pub const fn identity() -> Self {
        Self {
            matrix: [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    /// From a column-major array
    pub fn from_column_major(matrix: [f32; 16]) -> Self {
        Self { matrix }
    }

    /// From a row-major array
    pub fn from_row_major(rows: [f32; 16]) -> Self {
        let mut matrix = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                matrix[col * 4 + row] = rows[row * 4 + col];
            }
        }
        Self { matrix }
    }

    /// Pure translation
    pub fn from_translation(translation: [f32; 3]) -> Self {
        let mut pose = Self::identity();
        pose.matrix[12] = translation[0];
        pose.matrix[13] = translation[1];
        pose.matrix[14] = translation[2];
        pose
    }

    /// From a translation and a unit quaternion `(qx, qy, qz, qw)`.
    ///
    /// The quaternion is normalized first; a zero quaternion produces an
    /// invalid pose.
    pub fn from_translation_quaternion(translation: [f32; 3], rotation: [f32; 4]) -> Self {
        let [qx, qy, qz, qw] = rotation;
        let norm = (qx * qx + qy * qy + qz * qz + qw * qw).sqrt();
        let (x, y, z, w) = (qx / norm, qy / norm, qz / norm, qw / norm);

        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);

        Self {
            matrix: [
                // column 0
                1.0 - 2.0 * (yy + zz),
                2.0 * (xy + wz),
                2.0 * (xz - wy),
                0.0,
                // column 1
                2.0 * (xy - wz),
                1.0 - 2.0 * (xx + zz),
                2.0 * (yz + wx),
                0.0,
                // column 2
                2.0 * (xz + wy),
                2.0 * (yz - wx),
                1.0 - 2.0 * (xx + yy),
                0.0,
                // column 3
                translation[0],
                translation[1],
                translation[2],
                1.0,
            ],
        }
    }

    /// Rotation of `yaw` radians about the vertical (Y) axis plus translation
    pub fn from_yaw(yaw: f32, translation: [f32; 3]) -> Self {
        let half = yaw * 0.5;
        Self::from_translation_quaternion(translation, [0.0, half.sin(), 0.0, half.cos()])
    }

    /// Column-major matrix entries
    pub fn as_column_major(&self) -> &[f32; 16] {
        &self.matrix
    }

    /// Element at `(row, col)`
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.matrix[col * 4 + row]
    }

    /// Camera position in world frame
    #[inline]
    pub fn translation(&self) -> [f32; 3] {
        [self.matrix[12], self.matrix[13], self.matrix[14]]
    }

    /// Finite entries and a `(0, 0, 0, 1)` bottom row
    pub fn is_valid(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
            && self.at(3, 0).abs() < AFFINE_EPSILON
            && self.at(3, 1).abs() < AFFINE_EPSILON
            && self.at(3, 2).abs() < AFFINE_EPSILON
            && (self.at(3, 3) - 1.0).abs() < AFFINE_EPSILON
    }

    /// Apply the transform to a position
    #[inline]
    pub fn transform_position(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.matrix;
        [
            m[0] * p[0] + m[4] * p[1] + m[8] * p[2] + m[12],
            m[1] * p[0] + m[5] * p[1] + m[9] * p[2] + m[13],
            m[2] * p[0] + m[6] * p[1] + m[10] * p[2] + m[14],
        ]
    }

    /// Map a camera-local sample into the world frame.
    #[inline]
    pub fn transform_raw(&self, raw: &RawPoint, frame: FrameId) -> Point3D {
        let [x, y, z] = self.transform_position(raw.position());
        Point3D {
            x,
            y,
            z,
            confidence: raw.confidence,
            frame: Some(frame),
        }
    }
}
