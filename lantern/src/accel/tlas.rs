use glam::Vec4;
use log::debug;

use super::{BoundingBox, Bvh, BvhPrimitive};

/// Top-level acceleration structure, built over instances' world-space
/// bounds.
///
/// Each leaf refers to exactly one instance, by its index in the instance
/// list.
#[derive(Clone, Debug, Default)]
pub struct Tlas {
    bvh: Bvh,
}

impl Tlas {
    pub fn build(instances: &[BoundingBox]) -> Self {
        debug!("Building TLAS; instances={}", instances.len());

        let primitives: Vec<_> =
            instances.iter().copied().map(BvhPrimitive::new).collect();

        Self {
            bvh: Bvh::build(&primitives, 1),
        }
    }

    pub fn refit(&mut self, instances: &[BoundingBox]) {
        self.bvh.refit(instances);
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bvh.bounds()
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn serialize(&self, buffer: &mut Vec<Vec4>) {
        let order = self.bvh.order();

        self.bvh.serialize(buffer, 0, |first, count| {
            if count == 0 {
                (0, 0)
            } else {
                (order[first as usize], count)
            }
        });
    }
}
