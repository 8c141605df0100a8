use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &GeneratePassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    cameras: &[Camera],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    blue_noise: &[u32],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)]
    counters: &mut RayCounters,
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)]
    args: &mut DispatchArgs,
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    rays: &mut [Ray],
    #[spirv(descriptor_set = 0, binding = 5, storage_buffer)]
    radiance: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 6, storage_buffer)]
    normals: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 7, storage_buffer)]
    ids: &mut [UVec2],
    #[spirv(descriptor_set = 0, binding = 8, storage_buffer)]
    history: &mut [f32],
    #[spirv(descriptor_set = 0, binding = 9, storage_buffer)]
    moments: &mut [Vec2],
    #[spirv(descriptor_set = 0, binding = 10, storage_buffer)]
    illumination: &mut [Vec4],
) {
    generate(
        global_id.xy(),
        params,
        &cameras[CAMERA_CURR],
        &BlueNoise::new(blue_noise),
        counters,
        args,
        rays,
        radiance,
        &mut FrameBlanks {
            normals,
            ids,
            history,
            moments,
            illumination,
        },
    );
}
