use lantern_gpu::prelude::*;

#[spirv(compute(threads(16, 16)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(push_constant)] params: &RestirPassParams,
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
    #[spirv(descriptor_set = 0, binding = 8, storage_buffer)]
    lights: &[LightPickData],
    #[spirv(descriptor_set = 0, binding = 9, storage_buffer)]
    surfaces: &[SurfaceRecord],
    #[spirv(descriptor_set = 0, binding = 10, storage_buffer)]
    normals: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 11, storage_buffer)]
    depths: &[f32],
    #[spirv(descriptor_set = 0, binding = 12, storage_buffer)] ids: &[UVec2],
    #[spirv(descriptor_set = 0, binding = 13, storage_buffer)]
    input: &[LightReservoirData],
    #[spirv(descriptor_set = 0, binding = 14, storage_buffer)]
    output: &mut [LightReservoirData],
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

    restir_spatial(
        global_id.xy(),
        params,
        &mut WhiteNoise::new(!params.seed, global_id.xy()),
        &cameras[CAMERA_CURR],
        &scene,
        &LightsView::new(lights),
        surfaces,
        &GeometryView {
            normals,
            depths,
            ids,
        },
        input,
        output,
    );
}
