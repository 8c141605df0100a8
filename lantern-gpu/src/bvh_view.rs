use glam::{Vec3, Vec4, Vec4Swizzles};

/// Maximum stack size per each invocation when traversing a BVH.
///
/// Affects the maximum depth of a BVH tree.
pub const BVH_STACK_SIZE: usize = 64;

/// Set on [`BvhNodeView::a`] when the node is a leaf.
pub const BVH_LEAF_BIT: u32 = 1 << 31;

/// Read-only view into a serialized BVH.
///
/// Each node takes two `Vec4`s:
///
/// - `[min.x, min.y, min.z, a]`,
/// - `[max.x, max.y, max.z, b]`,
///
/// ... where, for internal nodes, `a` and `b` are indices of the left and
/// right child, and for leaves `a` is the first primitive (with
/// [`BVH_LEAF_BIT`] set) and `b` is the number of primitives.
#[derive(Clone, Copy)]
pub struct BvhView<'a> {
    buffer: &'a [Vec4],
}

impl<'a> BvhView<'a> {
    pub fn new(buffer: &'a [Vec4]) -> Self {
        Self { buffer }
    }

    pub fn node(&self, idx: u32) -> BvhNodeView {
        let d0 = self.buffer[2 * idx as usize];
        let d1 = self.buffer[2 * idx as usize + 1];

        BvhNodeView {
            min: d0.xyz(),
            max: d1.xyz(),
            a: d0.w.to_bits(),
            b: d1.w.to_bits(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct BvhNodeView {
    pub min: Vec3,
    pub max: Vec3,
    pub a: u32,
    pub b: u32,
}

impl BvhNodeView {
    pub fn encode_internal(
        min: Vec3,
        max: Vec3,
        left: u32,
        right: u32,
    ) -> [Vec4; 2] {
        [
            min.extend(f32::from_bits(left)),
            max.extend(f32::from_bits(right)),
        ]
    }

    pub fn encode_leaf(
        min: Vec3,
        max: Vec3,
        first: u32,
        count: u32,
    ) -> [Vec4; 2] {
        [
            min.extend(f32::from_bits(first | BVH_LEAF_BIT)),
            max.extend(f32::from_bits(count)),
        ]
    }

    pub fn is_leaf(&self) -> bool {
        self.a & BVH_LEAF_BIT != 0
    }

    pub fn left(&self) -> u32 {
        self.a
    }

    pub fn right(&self) -> u32 {
        self.b
    }

    pub fn first(&self) -> u32 {
        self.a & !BVH_LEAF_BIT
    }

    pub fn count(&self) -> u32 {
        self.b
    }

    /// Returns distance at which given ray enters this node's bounding box, or
    /// `f32::MAX` if the ray misses it (or enters it beyond `max_t`).
    pub fn distance(&self, origin: Vec3, inv_dir: Vec3, max_t: f32) -> f32 {
        let t0 = (self.min - origin) * inv_dir;
        let t1 = (self.max - origin) * inv_dir;
        let t_min = t0.min(t1).max_element().max(0.0);
        let t_max = t0.max(t1).min_element().min(max_t);

        if t_min <= t_max {
            t_min
        } else {
            f32::MAX
        }
    }
}
