use std::collections::VecDeque;
use std::ops::Range;

use glam::{Vec3, Vec4};

use super::BoundingBox;
use crate::gpu;

const BINS: usize = 12;

#[derive(Clone, Copy, Debug)]
pub struct BvhPrimitive {
    pub center: Vec3,
    pub bounds: BoundingBox,
}

impl BvhPrimitive {
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            center: bounds.center(),
            bounds,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BvhNode {
    Internal {
        bounds: BoundingBox,
        left: u32,
        right: u32,
    },

    Leaf {
        bounds: BoundingBox,
        first: u32,
        count: u32,
    },
}

impl BvhNode {
    pub fn bounds(&self) -> BoundingBox {
        match self {
            BvhNode::Internal { bounds, .. } => *bounds,
            BvhNode::Leaf { bounds, .. } => *bounds,
        }
    }

    fn sah_cost(&self) -> f32 {
        match self {
            BvhNode::Internal { .. } => 0.0,
            BvhNode::Leaf { bounds, count, .. } => {
                (*count as f32) * bounds.half_area()
            }
        }
    }
}

/// Bounding volume hierarchy built over abstract primitives.
///
/// Nodes are stored so that children always come after their parents, which
/// makes refitting a single backwards sweep; leaves refer to ranges of
/// [`Self::order()`].
#[derive(Clone, Debug, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    order: Vec<u32>,
}

impl Bvh {
    /// Builds the tree using binned SAH.
    ///
    /// Leaves holding more than `max_leaf_size` primitives are split at the
    /// median even if SAH considers them good enough.
    pub fn build(primitives: &[BvhPrimitive], max_leaf_size: usize) -> Self {
        assert!(max_leaf_size > 0);

        let mut this = Self {
            nodes: Vec::new(),
            order: (0..primitives.len() as u32).collect(),
        };

        this.nodes.push(BvhNode::Leaf {
            bounds: primitives.iter().map(|p| p.bounds).collect(),
            first: 0,
            count: primitives.len() as u32,
        });

        let mut queue = VecDeque::from_iter([0]);

        while let Some(id) = queue.pop_front() {
            if let Some((left, right)) =
                this.balance(primitives, id, max_leaf_size)
            {
                queue.push_back(left);
                queue.push_back(right);
            }
        }

        this
    }

    fn balance(
        &mut self,
        primitives: &[BvhPrimitive],
        id: u32,
        max_leaf_size: usize,
    ) -> Option<(u32, u32)> {
        let node = self.nodes[id as usize];

        let BvhNode::Leaf { first, count, .. } = node else {
            unreachable!();
        };

        if count <= 1 {
            return None;
        }

        let range = (first as usize)..((first + count) as usize);
        let plane = self.find_splitting_plane(primitives, range.clone());
        let must_split = count as usize > max_leaf_size;

        let pivot = match plane {
            Some(plane) if plane.split_cost < node.sah_cost() => {
                self.partition(primitives, range.clone(), plane)
            }
            _ if must_split => None,
            _ => return None,
        };

        let pivot = match pivot {
            Some(pivot) if pivot > range.start && pivot < range.end => pivot,
            _ if must_split => self.split_at_median(primitives, range.clone()),
            _ => return None,
        };

        let left = self.push_leaf(primitives, range.start..pivot);
        let right = self.push_leaf(primitives, pivot..range.end);

        self.nodes[id as usize] = BvhNode::Internal {
            bounds: node.bounds(),
            left,
            right,
        };

        Some((left, right))
    }

    fn find_splitting_plane(
        &self,
        primitives: &[BvhPrimitive],
        range: Range<usize>,
    ) -> Option<SplittingPlane> {
        let centroid_bb: BoundingBox = self.order[range.clone()]
            .iter()
            .map(|&idx| primitives[idx as usize].center)
            .collect();

        let extent = centroid_bb.extent();
        let mut bins = [[Bin::default(); BINS]; 3];

        for &idx in &self.order[range] {
            let primitive = &primitives[idx as usize];

            for axis in 0..3 {
                if extent[axis] <= 0.0 {
                    continue;
                }

                let bin = (BINS as f32)
                    * (primitive.center[axis] - centroid_bb.min()[axis])
                    / extent[axis];

                let bin = (bin as usize).min(BINS - 1);

                bins[axis][bin].count += 1;
                bins[axis][bin].bounds += primitive.bounds;
            }
        }

        let mut best: Option<SplittingPlane> = None;

        for axis in 0..3 {
            if extent[axis] <= 0.0 {
                continue;
            }

            let mut left_counts = [0; BINS - 1];
            let mut left_areas = [0.0; BINS - 1];
            let mut right_counts = [0; BINS - 1];
            let mut right_areas = [0.0; BINS - 1];
            let mut left_bb = BoundingBox::default();
            let mut right_bb = BoundingBox::default();
            let mut left_count = 0;
            let mut right_count = 0;

            for i in 0..(BINS - 1) {
                left_count += bins[axis][i].count;
                left_bb += bins[axis][i].bounds;
                left_counts[i] = left_count;
                left_areas[i] = left_bb.half_area();

                right_count += bins[axis][BINS - 1 - i].count;
                right_bb += bins[axis][BINS - 1 - i].bounds;
                right_counts[BINS - 2 - i] = right_count;
                right_areas[BINS - 2 - i] = right_bb.half_area();
            }

            for i in 0..(BINS - 1) {
                if left_counts[i] == 0 || right_counts[i] == 0 {
                    continue;
                }

                let split_cost = (left_counts[i] as f32) * left_areas[i]
                    + (right_counts[i] as f32) * right_areas[i];

                if best.map_or(true, |best| split_cost < best.split_cost) {
                    best = Some(SplittingPlane {
                        axis,
                        split_at: centroid_bb.min()[axis]
                            + extent[axis] * ((i + 1) as f32)
                                / (BINS as f32),
                        split_cost,
                    });
                }
            }
        }

        best
    }

    /// Moves primitives on the left side of given plane to the beginning of
    /// the range, returning the index of the first primitive on the right.
    fn partition(
        &mut self,
        primitives: &[BvhPrimitive],
        range: Range<usize>,
        plane: SplittingPlane,
    ) -> Option<usize> {
        let mut pivot = range.start;

        for idx in range {
            let center = primitives[self.order[idx] as usize].center;

            if center[plane.axis] < plane.split_at {
                self.order.swap(idx, pivot);
                pivot += 1;
            }
        }

        Some(pivot)
    }

    fn split_at_median(
        &mut self,
        primitives: &[BvhPrimitive],
        range: Range<usize>,
    ) -> usize {
        let centroid_bb: BoundingBox = self.order[range.clone()]
            .iter()
            .map(|&idx| primitives[idx as usize].center)
            .collect();

        let extent = centroid_bb.extent();

        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        self.order[range.clone()].sort_by(|&a, &b| {
            let a = primitives[a as usize].center[axis];
            let b = primitives[b as usize].center[axis];

            a.total_cmp(&b)
        });

        range.start + range.len() / 2
    }

    fn push_leaf(
        &mut self,
        primitives: &[BvhPrimitive],
        range: Range<usize>,
    ) -> u32 {
        self.nodes.push(BvhNode::Leaf {
            bounds: self.order[range.clone()]
                .iter()
                .map(|&idx| primitives[idx as usize].bounds)
                .collect(),
            first: range.start as u32,
            count: range.len() as u32,
        });

        (self.nodes.len() - 1) as u32
    }

    /// Recomputes nodes' bounds, keeping the topology intact.
    ///
    /// `bounds` is indexed the same way as primitives given to
    /// [`Self::build()`].
    pub fn refit(&mut self, bounds: &[BoundingBox]) {
        assert_eq!(
            bounds.len(),
            self.order.len(),
            "cannot refit BVH: primitive count changed",
        );

        for id in (0..self.nodes.len()).rev() {
            let new_bounds = match self.nodes[id] {
                BvhNode::Internal { left, right, .. } => {
                    self.nodes[left as usize].bounds()
                        + self.nodes[right as usize].bounds()
                }

                BvhNode::Leaf { first, count, .. } => self.order
                    [(first as usize)..((first + count) as usize)]
                    .iter()
                    .map(|&idx| bounds[idx as usize])
                    .collect(),
            };

            match &mut self.nodes[id] {
                BvhNode::Internal { bounds, .. }
                | BvhNode::Leaf { bounds, .. } => {
                    *bounds = new_bounds;
                }
            }
        }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Primitive indices, in the order leaves refer to them.
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    pub fn bounds(&self) -> BoundingBox {
        self.nodes
            .first()
            .map(|node| node.bounds())
            .unwrap_or_default()
    }

    /// Appends the serialized tree to `buffer`, offsetting child indices by
    /// `node_offset` and mapping each leaf's range through `map_leaf`.
    pub fn serialize(
        &self,
        buffer: &mut Vec<Vec4>,
        node_offset: u32,
        map_leaf: impl Fn(u32, u32) -> (u32, u32),
    ) {
        for node in &self.nodes {
            let bounds = node.bounds();

            let encoded = match *node {
                BvhNode::Internal { left, right, .. } => {
                    gpu::BvhNodeView::encode_internal(
                        bounds.min(),
                        bounds.max(),
                        left + node_offset,
                        right + node_offset,
                    )
                }

                BvhNode::Leaf { first, count, .. } => {
                    let (first, count) = map_leaf(first, count);

                    gpu::BvhNodeView::encode_leaf(
                        bounds.min(),
                        bounds.max(),
                        first,
                        count,
                    )
                }
            };

            buffer.extend(encoded);
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SplittingPlane {
    axis: usize,
    split_at: f32,
    split_cost: f32,
}

#[derive(Clone, Copy, Default, Debug)]
struct Bin {
    bounds: BoundingBox,
    count: u32,
}
