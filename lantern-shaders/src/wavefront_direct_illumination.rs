use lantern_gpu::prelude::*;

#[spirv(compute(threads(256)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &BouncePassParams,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)] tlas: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)] blas: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)]
    models: &[ModelData],
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)]
    instances: &[InstanceData],
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    transforms: &[InstanceTransform],
    #[spirv(descriptor_set = 0, binding = 5, storage_buffer)]
    triangles: &[Triangle],
    #[spirv(descriptor_set = 0, binding = 6, storage_buffer)]
    materials: &[Material],
    #[spirv(descriptor_set = 0, binding = 7, storage_buffer)]
    lights: &[LightPickData],
    #[spirv(descriptor_set = 0, binding = 8, storage_buffer)]
    counters: &mut RayCounters,
    #[spirv(descriptor_set = 0, binding = 9, storage_buffer)]
    surfaces: &[SurfaceRecord],
    #[spirv(descriptor_set = 0, binding = 10, storage_buffer)]
    reservoirs: &mut [LightReservoirData],
    #[spirv(descriptor_set = 0, binding = 11, storage_buffer)]
    shadow_rays: &mut [ShadowRay],
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

    direct_illumination(
        global_id.x,
        params,
        &mut WhiteNoise::from_index(!params.seed ^ params.bounce, global_id.x),
        &scene,
        &LightsView::new(lights),
        counters,
        surfaces,
        reservoirs,
        shadow_rays,
    );
}
