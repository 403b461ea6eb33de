//! Mathematical utilities (quaternions, activation functions, etc.).

use nalgebra::{Matrix3, Quaternion, UnitQuaternion};

/// Convert a unit quaternion to a 3×3 rotation matrix.
///
/// Formula (from quaternion q = w + xi + yj + zk):
/// R = | 1-2(y²+z²)   2(xy-wz)    2(xz+wy)  |
///     | 2(xy+wz)     1-2(x²+z²)  2(yz-wx)  |
///     | 2(xz-wy)     2(yz+wx)    1-2(x²+y²)|
pub fn quaternion_to_matrix(q: &UnitQuaternion<f32>) -> Matrix3<f32> {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - w * z),
        2.0 * (x * z + w * y),
        2.0 * (x * y + w * z),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - w * x),
        2.0 * (x * z - w * y),
        2.0 * (y * z + w * x),
        1.0 - 2.0 * (x * x + y * y),
    )
}

/// Build a unit quaternion from raw `(w, x, y, z)` components.
///
/// Network outputs and files store unnormalized quaternions; this normalizes.
/// A zero quaternion maps to the identity rotation.
pub fn quaternion_from_wxyz(w: f32, x: f32, y: f32, z: f32) -> UnitQuaternion<f32> {
    let q = Quaternion::new(w, x, y, z);
    if q.norm_squared() <= f32::EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::from_quaternion(q)
}

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
///
/// Maps R → (0, 1)
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Inverse sigmoid (logit): logit(p) = log(p / (1-p))
pub fn inverse_sigmoid(p: f32) -> f32 {
    // Clamp to avoid log(0) or division by zero
    let p_clamped = p.clamp(1e-6, 1.0 - 1e-6);
    (p_clamped / (1.0 - p_clamped)).ln()
}

/// Softplus with sharpness `beta`: log(1 + e^(beta·x)) / beta.
///
/// Switches to the identity above `beta·x > 20` where the exponential would
/// overflow and the result equals `x` to float precision.
pub fn softplus(x: f32, beta: f32) -> f32 {
    let bx = beta * x;
    if bx > 20.0 {
        x
    } else {
        bx.exp().ln_1p() / beta
    }
}
