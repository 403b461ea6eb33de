//! Binary search of crossing edges toward the zero level set.
//!
//! Each step queries the field once at every bracket midpoint and moves one
//! side of every bracket onto its midpoint. The left side always holds a
//! non-positive sample and the right side a positive one, so the crossing stays
//! bracketed and the width halves per step.

use super::marching::CrossingEdge;
use super::ExtractError;
use crate::field::ScalarField;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Per-edge refinement state, stored column-wise.
#[derive(Clone, Debug, Default)]
pub struct EdgeBrackets {
    pub left: Vec<Vector3<f32>>,
    pub right: Vec<Vector3<f32>>,
    /// Left/right distance before any refinement.
    pub original_distance: Vec<f32>,
    /// Sum of the endpoint scales before any refinement.
    pub original_scale_sum: Vec<f32>,
}

impl EdgeBrackets {
    pub fn from_edges(edges: &[CrossingEdge]) -> Self {
        Self {
            left: edges.iter().map(|e| e.left.position).collect(),
            right: edges.iter().map(|e| e.right.position).collect(),
            original_distance: edges.iter().map(CrossingEdge::span).collect(),
            original_scale_sum: edges.iter().map(CrossingEdge::scale_sum).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Current surface estimate per edge.
    pub fn midpoints(&self) -> Vec<Vector3<f32>> {
        self.left
            .par_iter()
            .zip(self.right.par_iter())
            .map(|(l, r)| (l + r) * 0.5)
            .collect()
    }

    /// Current bracket width per edge.
    pub fn widths(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(&self.right)
            .map(|(l, r)| (r - l).norm())
            .collect()
    }

    /// One bisection step over all edges.
    pub fn step<F: ScalarField + ?Sized>(&mut self, field: &F) -> Result<(), ExtractError> {
        if self.is_empty() {
            return Ok(());
        }
        let mids = self.midpoints();
        let values = field.query_sdf(&mids)?;
        if values.len() != mids.len() {
            return Err(ExtractError::LengthMismatch {
                what: "midpoint field values",
                expected: mids.len(),
                got: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ExtractError::NonFiniteField { index });
        }

        // Zero is non-positive and therefore replaces the left side.
        for ((mid, value), (l, r)) in mids
            .into_iter()
            .zip(values)
            .zip(self.left.iter_mut().zip(self.right.iter_mut()))
        {
            if value > 0.0 {
                *r = mid;
            } else {
                *l = mid;
            }
        }
        Ok(())
    }
}

/// Run `steps` bisection steps, calling `on_step(k, brackets)` after step `k`
/// (zero-based).
pub fn refine<F, C>(
    brackets: &mut EdgeBrackets,
    field: &F,
    steps: usize,
    mut on_step: C,
) -> Result<(), ExtractError>
where
    F: ScalarField + ?Sized,
    C: FnMut(usize, &EdgeBrackets) -> Result<(), ExtractError>,
{
    for k in 0..steps {
        brackets.step(field)?;
        log::debug!(
            "binary search step {}/{}: max bracket width {:.3e}",
            k + 1,
            steps,
            brackets.widths().into_iter().fold(0.0f32, f32::max)
        );
        on_step(k, brackets)?;
    }
    Ok(())
}
