use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &FinalizePassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    cameras: &[Camera],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    radiance: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)]
    albedos: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)]
    emissions: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    prev_illumination: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 5, storage_buffer)]
    illumination: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 6, storage_buffer)]
    history: &mut [f32],
    #[spirv(descriptor_set = 0, binding = 7, storage_buffer)]
    output: &mut [Vec4],
) {
    finalize(
        global_id.xy(),
        params,
        &cameras[CAMERA_CURR],
        &mut FinalizeBuffers {
            radiance,
            albedos,
            emissions,
            prev_illumination,
            illumination,
            history,
            output,
        },
    );
}
