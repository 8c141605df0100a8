use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &BloomPassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)] input: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    output: &mut [Vec4],
) {
    bloom_downsample(global_id.xy(), params, input, output);
}
