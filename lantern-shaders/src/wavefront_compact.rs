use lantern_gpu::prelude::*;

#[spirv(compute(threads(1)))]
pub fn main(
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    counters: &mut RayCounters,
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    args: &mut DispatchArgs,
) {
    compact(counters, args);
}
