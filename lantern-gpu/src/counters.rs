use bytemuck::{Pod, Zeroable};
use glam::{uvec4, UVec4};

use crate::{div_ceil, WORKGROUP_SIZE_1D};

/// Counters driving the wavefront's ray-batch compaction.
///
/// Kernels never look at buffers' capacities - the number of rays alive in a
/// batch is always read from here.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct RayCounters {
    /// Number of rays in the batch being currently extended.
    pub active_rays: u32,

    /// Number of rays written into the other batch during this bounce.
    pub next_rays: u32,

    /// Number of shadow rays spawned during this bounce.
    pub shadow_rays: u32,

    /// Number of shadow rays the connect pass is going to trace.
    pub active_shadow_rays: u32,

    /// Number of paths terminated during this bounce.
    pub terminated_rays: u32,

    /// Number of rays that hit something during this bounce.
    pub hits: u32,

    pub bounce: u32,
    pub _pad: u32,
}

impl RayCounters {
    pub fn new(active_rays: u32) -> Self {
        Self {
            active_rays,
            ..Default::default()
        }
    }

    /// Moves to the next bounce: rays written into the other batch become the
    /// active ones, spawned shadow rays become ready to be connected.
    pub fn advance(&mut self) {
        self.active_rays = self.next_rays;
        self.active_shadow_rays = self.shadow_rays;
        self.next_rays = 0;
        self.shadow_rays = 0;
        self.terminated_rays = 0;
        self.hits = 0;
        self.bounce += 1;
    }
}

/// Arguments for indirect dispatches of the wavefront's 1D passes.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct DispatchArgs {
    pub rays: UVec4,
    pub shadow_rays: UVec4,
}

impl DispatchArgs {
    /// Byte-offset of [`Self::rays`], for the indirect dispatch.
    pub const RAYS_OFFSET: u64 = 0;

    /// Byte-offset of [`Self::shadow_rays`], for the indirect dispatch.
    pub const SHADOW_RAYS_OFFSET: u64 = 16;

    pub fn new(counters: &RayCounters) -> Self {
        Self {
            rays: Self::workgroups(counters.active_rays),
            shadow_rays: Self::workgroups(counters.active_shadow_rays),
        }
    }

    fn workgroups(count: u32) -> UVec4 {
        uvec4(div_ceil(count, WORKGROUP_SIZE_1D), 1, 1, 0)
    }
}

/// Atomically adds `value` to `counter`, returning the previous value.
///
/// On the CPU, where kernels are run one invocation at a time, this is a plain
/// addition.
pub fn atomic_add(counter: &mut u32, value: u32) -> u32 {
    #[cfg(target_arch = "spirv")]
    unsafe {
        use spirv_std::memory::{Scope, Semantics};

        spirv_std::arch::atomic_i_add::<
            u32,
            { Scope::Device as u32 },
            { Semantics::UNIFORM_MEMORY.bits() },
        >(counter, value)
    }

    #[cfg(not(target_arch = "spirv"))]
    {
        let prev = *counter;

        *counter += value;
        prev
    }
}
