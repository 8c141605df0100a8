use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &WeightsPassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    cameras: &[Camera],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    normals: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)]
    depths: &[f32],
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)] ids: &[UVec2],
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    illumination: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 5, storage_buffer)]
    moments: &[Vec2],
    #[spirv(descriptor_set = 0, binding = 6, storage_buffer)]
    history: &[f32],
    #[spirv(descriptor_set = 0, binding = 7, storage_buffer)]
    weighted: &mut [Vec4],
) {
    calculate_weights(
        global_id.xy(),
        params,
        &cameras[CAMERA_CURR],
        &GeometryView {
            normals,
            depths,
            ids,
        },
        illumination,
        moments,
        history,
        weighted,
    );
}
