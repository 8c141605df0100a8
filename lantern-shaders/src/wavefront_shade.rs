use lantern_gpu::prelude::*;

#[spirv(compute(threads(256)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &BouncePassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    cameras: &[Camera],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)] tlas: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)] blas: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)]
    models: &[ModelData],
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    instances: &[InstanceData],
    #[spirv(descriptor_set = 0, binding = 5, storage_buffer)]
    transforms: &[InstanceTransform],
    #[spirv(descriptor_set = 0, binding = 6, storage_buffer)]
    triangles: &[Triangle],
    #[spirv(descriptor_set = 0, binding = 7, storage_buffer)]
    materials: &[Material],
    #[spirv(descriptor_set = 0, binding = 8, storage_buffer)] sky: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 9, storage_buffer)]
    counters: &mut RayCounters,
    #[spirv(descriptor_set = 0, binding = 10, storage_buffer)] rays: &[Ray],
    #[spirv(descriptor_set = 0, binding = 11, storage_buffer)]
    results: &[ExtendResult],
    #[spirv(descriptor_set = 0, binding = 12, storage_buffer)]
    next_rays: &mut [Ray],
    #[spirv(descriptor_set = 0, binding = 13, storage_buffer)]
    surfaces: &mut [SurfaceRecord],
    #[spirv(descriptor_set = 0, binding = 14, storage_buffer)]
    radiance: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 15, storage_buffer)]
    normals: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 16, storage_buffer)]
    depths: &mut [f32],
    #[spirv(descriptor_set = 0, binding = 17, storage_buffer)]
    ids: &mut [UVec2],
    #[spirv(descriptor_set = 0, binding = 18, storage_buffer)]
    positions: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 19, storage_buffer)]
    albedos: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 20, storage_buffer)]
    emissions: &mut [Vec4],
    #[spirv(descriptor_set = 0, binding = 21, storage_buffer)]
    motions: &mut [Vec2],
) {
    let scene = SceneView {
        tlas: BvhView::new(tlas),
        blas: BvhView::new(blas),
        models,
        instances,
        transforms,
        triangles,
        materials,
    };

    shade(
        global_id.x,
        params,
        &mut WhiteNoise::from_index(params.seed ^ params.bounce, global_id.x),
        &cameras[CAMERA_PREV],
        &cameras[CAMERA_CURR],
        &scene,
        &SkyView::new(sky, params.sky_size),
        counters,
        rays,
        results,
        next_rays,
        surfaces,
        radiance,
        &mut GBuffer {
            normals,
            depths,
            ids,
            positions,
            albedos,
            emissions,
            motions,
        },
    );
}
