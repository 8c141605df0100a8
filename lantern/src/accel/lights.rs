use log::error;

use super::Blas;
use crate::gpu;

/// Table of every emissive triangle of every instance, grouped by instance
/// (in the same order as instances are given to the TLAS).
#[derive(Clone, Debug, Default)]
pub struct LightTable {
    entries: Vec<gpu::LightPickData>,
}

impl LightTable {
    /// Builds the table out of `(model_id, model's BLAS)` pairs, one per
    /// instance.
    ///
    /// Panics if there are no emissive triangles at all, since the resampling
    /// passes need at least one light to pick from.
    pub fn build<'a>(
        instances: impl IntoIterator<Item = (u32, &'a Blas)>,
    ) -> Self {
        let mut entries = Vec::new();

        for (instance_id, (model_id, blas)) in
            instances.into_iter().enumerate()
        {
            let lights_in_prim = blas.emissive().len() as u32;

            entries.extend(blas.emissive().iter().map(|&primitive_id| {
                gpu::LightPickData {
                    model_id,
                    instance_id: instance_id as u32,
                    primitive_id,
                    lights_in_prim,
                }
            }));
        }

        if entries.is_empty() {
            error!("Scene doesn't contain any emissive triangles");

            panic!(
                "cannot build light table: scene has no emissive primitives"
            );
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[gpu::LightPickData] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
