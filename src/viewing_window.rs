// viewing_window.rs — Field-lens (viewing-window) depth transform.
//
// A field lens of focal distance f in front of the panel maps a depth
// level z to the apparent distance
//
//     z' = −f · z / (z − f)
//
// applied level by level, preserving table length and order of entries.
// A level that sits on the lens focal plane (z ≈ f) has no finite image and
// fails the stage; the caller aborts the run rather than emitting an
// unusable frame.

use crate::error::{HoloError, Result};
use crate::quantize::DepthLevelTable;

/// Relative tolerance for "z equals f".
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Depth levels after the viewing-window transform, same length and index
/// order as the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedDepthLevelTable {
    levels: Vec<f64>,
}

impl TransformedDepthLevelTable {
    /// Identity conversion, used when the transform is switched off.
    pub fn untransformed(table: &DepthLevelTable) -> Self {
        TransformedDepthLevelTable { levels: table.levels().to_vec() }
    }

    #[inline]
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewingWindowTransformer {
    field_lens: f64,
}

impl ViewingWindowTransformer {
    pub fn new(field_lens: f64) -> Self {
        ViewingWindowTransformer { field_lens }
    }

    /// Transform a single distance. Fails when `z` is on the focal plane.
    pub fn transform_level(&self, index: usize, z: f64) -> Result<f64> {
        let f = self.field_lens;
        let denom = z - f;
        let scale = 1f64.max(z.abs()).max(f.abs());
        if denom.abs() <= SINGULAR_TOLERANCE * scale {
            return Err(HoloError::NumericalEdgeCase { index, depth: z, field_lens: f });
        }
        Ok(-f * z / denom)
    }

    pub fn transform(&self, table: &DepthLevelTable) -> Result<TransformedDepthLevelTable> {
        let levels = table
            .levels()
            .iter()
            .enumerate()
            .map(|(i, &z)| self.transform_level(i, z))
            .collect::<Result<Vec<_>>>()?;
        Ok(TransformedDepthLevelTable { levels })
    }
}
