use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &ModulatePassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    cameras: &[Camera],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    filtered: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)]
    albedos: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)]
    emissions: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    output: &mut [Vec4],
) {
    modulate(
        global_id.xy(),
        params,
        &cameras[CAMERA_CURR],
        filtered,
        albedos,
        emissions,
        output,
    );
}
