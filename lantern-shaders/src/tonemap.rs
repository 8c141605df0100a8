use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &TonemapPassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    cameras: &[Camera],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    radiance: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)] bloom: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 3)] output: TexRgba8,
) {
    let camera = &cameras[CAMERA_CURR];
    let screen_pos = global_id.xy();

    if !camera.contains(screen_pos.as_ivec2()) {
        return;
    }

    let bloom_size = bloom_mip_size(camera.screen_size(), 0);
    let bloom_pos = (screen_pos / 2).min(bloom_size - 1);

    let color = compose(
        params,
        radiance[camera.screen_to_idx(screen_pos)],
        bloom[(bloom_pos.y * bloom_size.x + bloom_pos.x) as usize],
    );

    unsafe {
        output.write(screen_pos, color);
    }
}
