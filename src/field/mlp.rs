//! Dense MLP signed-distance network.
//!
//! Layout of the output vector:
//! - `[0]`      signed distance
//! - `[1..4]`   log-scale of the Gaussian at the query point (activated with exp)
//! - `[4..8]`   rotation quaternion (w, x, y, z), normalized
//! - `[8]`      opacity logit (activated with sigmoid)
//!
//! Networks with a single output are pure SDFs. Inputs are normalized to
//! [-1, 1] by the bounding box the network was trained in.

use super::{FieldError, FieldOutput, ScalarField};
use crate::core::{quaternion_from_wxyz, sigmoid, softplus, BoundingBox};
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;

/// Softplus sharpness for hidden activations.
const SOFTPLUS_BETA: f32 = 100.0;

/// Points per parallel evaluation chunk.
const CHUNK: usize = 4096;

/// One fully connected layer: y = W·x + b.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseLayer {
    /// `out × in`
    pub weights: DMatrix<f32>,
    pub bias: DVector<f32>,
}

impl DenseLayer {
    pub fn new(weights: DMatrix<f32>, bias: DVector<f32>) -> Result<Self, FieldError> {
        if weights.nrows() != bias.len() {
            return Err(FieldError::InvalidNetwork(format!(
                "layer has {} rows but {} biases",
                weights.nrows(),
                bias.len()
            )));
        }
        Ok(Self { weights, bias })
    }

    pub fn inputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MlpField {
    pub bounding_box: BoundingBox,
    pub layers: Vec<DenseLayer>,
}

impl MlpField {
    /// Validate layer chaining and wrap the network.
    pub fn new(bounding_box: BoundingBox, layers: Vec<DenseLayer>) -> Result<Self, FieldError> {
        let first = layers
            .first()
            .ok_or_else(|| FieldError::InvalidNetwork("network has no layers".to_string()))?;
        if first.inputs() != 3 {
            return Err(FieldError::InputDimension {
                expected: first.inputs(),
                got: 3,
            });
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(FieldError::InvalidNetwork(format!(
                    "layer {} outputs {} values but layer {} expects {}",
                    i,
                    pair[0].outputs(),
                    i + 1,
                    pair[1].inputs()
                )));
            }
        }
        let extent = bounding_box.extent();
        if extent.iter().any(|&e| e <= 0.0 || !e.is_finite()) {
            return Err(FieldError::InvalidNetwork(format!(
                "degenerate bounding box extent {:?}",
                extent
            )));
        }
        Ok(Self {
            bounding_box,
            layers,
        })
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map(DenseLayer::outputs).unwrap_or(0)
    }

    fn normalize(&self, p: &Vector3<f32>) -> DVector<f32> {
        let center = self.bounding_box.center();
        let half = self.bounding_box.extent() * 0.5;
        let n = (p - center).component_div(&half);
        DVector::from_column_slice(n.as_slice())
    }

    /// Raw network output for one point.
    fn forward(&self, p: &Vector3<f32>) -> DVector<f32> {
        let mut x = self.normalize(p);
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            x = &layer.weights * x + &layer.bias;
            if i != last {
                x.apply(|v| *v = softplus(*v, SOFTPLUS_BETA));
            }
        }
        x
    }

    fn forward_batch(&self, points: &[Vector3<f32>]) -> Vec<DVector<f32>> {
        points
            .par_chunks(CHUNK)
            .flat_map_iter(|chunk| chunk.iter().map(|p| self.forward(p)).collect::<Vec<_>>())
            .collect()
    }
}

impl ScalarField for MlpField {
    fn query_sdf(&self, points: &[Vector3<f32>]) -> Result<Vec<f32>, FieldError> {
        Ok(self.forward_batch(points).iter().map(|y| y[0]).collect())
    }

    fn query(&self, points: &[Vector3<f32>]) -> Result<FieldOutput, FieldError> {
        let raw = self.forward_batch(points);
        let width = self.output_width();

        let sdf = raw.iter().map(|y| y[0]).collect();
        let scale = (width >= 4).then(|| {
            raw.iter()
                .map(|y| Vector3::new(y[1].exp(), y[2].exp(), y[3].exp()))
                .collect()
        });
        let rotation = (width >= 8).then(|| {
            raw.iter()
                .map(|y| quaternion_from_wxyz(y[4], y[5], y[6], y[7]))
                .collect()
        });
        let opacity = (width >= 9).then(|| raw.iter().map(|y| sigmoid(y[8])).collect());

        Ok(FieldOutput {
            sdf,
            opacity,
            scale,
            rotation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Single linear layer computing sdf = x (in normalized coordinates).
    fn plane_field(width: usize) -> MlpField {
        let mut w = DMatrix::zeros(width, 3);
        w[(0, 0)] = 1.0;
        let mut b = DVector::zeros(width);
        if width >= 8 {
            b[4] = 1.0; // identity rotation
        }
        let layer = DenseLayer::new(w, b).unwrap();
        MlpField::new(BoundingBox::cube(2.0), vec![layer]).unwrap()
    }

    #[test]
    fn test_input_is_normalized_by_bbox() {
        let field = plane_field(1);
        let sdf = field.query_sdf(&[Vector3::new(1.0, 0.0, 0.0)]).unwrap();
        assert_relative_eq!(sdf[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_aux_outputs_follow_width() {
        let field = plane_field(9);
        let out = field.query(&[Vector3::zeros()]).unwrap();
        let scale = out.scale.unwrap();
        assert_relative_eq!(scale[0], Vector3::new(1.0, 1.0, 1.0), epsilon = 1e-6);
        assert_relative_eq!(out.rotation.unwrap()[0].angle(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(out.opacity.unwrap()[0], 0.5, epsilon = 1e-6);

        let bare = plane_field(1).query(&[Vector3::zeros()]).unwrap();
        assert!(bare.scale.is_none());
    }

    #[test]
    fn test_rejects_mismatched_layers() {
        let a = DenseLayer::new(DMatrix::zeros(4, 3), DVector::zeros(4)).unwrap();
        let b = DenseLayer::new(DMatrix::zeros(1, 5), DVector::zeros(1)).unwrap();
        assert!(MlpField::new(BoundingBox::cube(1.0), vec![a, b]).is_err());
        assert!(DenseLayer::new(DMatrix::zeros(2, 3), DVector::zeros(3)).is_err());
    }

    #[test]
    fn test_hidden_softplus_is_applied() {
        // Hidden layer passes -x through softplus, output reads it back.
        let hidden = DenseLayer::new(
            DMatrix::from_row_slice(1, 3, &[-1.0, 0.0, 0.0]),
            DVector::zeros(1),
        )
        .unwrap();
        let out = DenseLayer::new(DMatrix::from_element(1, 1, 1.0), DVector::zeros(1)).unwrap();
        let field = MlpField::new(BoundingBox::cube(1.0), vec![hidden, out]).unwrap();
        let sdf = field
            .query_sdf(&[Vector3::new(0.5, 0.0, 0.0), Vector3::new(-0.5, 0.0, 0.0)])
            .unwrap();
        assert!(sdf[0] >= 0.0 && sdf[0] < 1e-3);
        assert_relative_eq!(sdf[1], 0.5, epsilon = 1e-4);
    }
}
