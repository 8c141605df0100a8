use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &ReprojectPassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    cameras: &[Camera],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    normals: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)]
    depths: &[f32],
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)] ids: &[UVec2],
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    prev_normals: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 5, storage_buffer)]
    prev_depths: &[f32],
    #[spirv(descriptor_set = 0, binding = 6, storage_buffer)]
    prev_ids: &[UVec2],
    #[spirv(descriptor_set = 0, binding = 7, storage_buffer)]
    motions: &[Vec2],
    #[spirv(descriptor_set = 0, binding = 8, storage_buffer)]
    illumination: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 9, storage_buffer)]
    moments: &mut [Vec2],
    #[spirv(descriptor_set = 0, binding = 10, storage_buffer)]
    history: &mut [f32],
    #[spirv(descriptor_set = 0, binding = 11, storage_buffer)]
    prev_illumination: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 12, storage_buffer)]
    prev_moments: &[Vec2],
    #[spirv(descriptor_set = 0, binding = 13, storage_buffer)]
    prev_history: &[f32],
) {
    reproject(
        global_id.xy(),
        params,
        &cameras[CAMERA_CURR],
        &GeometryView {
            normals,
            depths,
            ids,
        },
        &GeometryView {
            normals: prev_normals,
            depths: prev_depths,
            ids: prev_ids,
        },
        &mut ReprojectBuffers {
            motions,
            illumination,
            moments,
            history,
            prev_illumination,
            prev_moments,
            prev_history,
        },
    );
}
