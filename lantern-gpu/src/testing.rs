//! Small scene and a CPU driver running the kernels one invocation at a time.

use glam::{uvec2, vec2, vec3, vec4, Affine3A, UVec2, Vec2, Vec3, Vec4};

use crate::*;

/// Camera hanging three units above the origin, looking straight down.
pub fn camera(size: UVec2) -> Camera {
    let position = vec3(0.0, 3.0, 0.0);
    let x_axis = vec3(2.0, 0.0, 0.0);
    let y_axis = vec3(0.0, 0.0, 2.0);
    let image_plane = position - Vec3::Y - x_axis * 0.5 - y_axis * 0.5;

    Camera {
        position: position.extend(0.0),
        image_plane: image_plane.extend(0.0),
        x_axis: x_axis.extend(0.0),
        y_axis: y_axis.extend(0.0),
        screen: vec4(size.x as f32, size.y as f32, 0.001, 0.0),
    }
}

/// A 10x10 floor lit by a 2x2 area light hanging four units above it.
pub struct TestScene {
    pub tlas: Vec<Vec4>,
    pub blas: Vec<Vec4>,
    pub models: Vec<ModelData>,
    pub instances: Vec<InstanceData>,
    pub transforms: Vec<InstanceTransform>,
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    pub lights: Vec<LightPickData>,
}

impl TestScene {
    pub fn new() -> Self {
        let quad = |y: f32, extent: f32, normal: Vec3, material_id| {
            let p = |x, z| vec3(x * extent, y, z * extent);
            let uvs = [Vec2::ZERO, Vec2::X, Vec2::ONE];

            [
                Triangle::new(
                    [p(-1.0, -1.0), p(1.0, -1.0), p(1.0, 1.0)],
                    [normal; 3],
                    uvs,
                    material_id,
                ),
                Triangle::new(
                    [p(-1.0, -1.0), p(1.0, 1.0), p(-1.0, 1.0)],
                    [normal; 3],
                    uvs,
                    material_id,
                ),
            ]
        };

        let triangles: Vec<_> = quad(0.0, 5.0, Vec3::Y, 0)
            .into_iter()
            .chain(quad(4.0, 1.0, -Vec3::Y, 1))
            .collect();

        let blas = [
            BvhNodeView::encode_leaf(
                vec3(-5.0, -0.01, -5.0),
                vec3(5.0, 0.01, 5.0),
                0,
                2,
            ),
            BvhNodeView::encode_leaf(
                vec3(-1.0, 3.99, -1.0),
                vec3(1.0, 4.01, 1.0),
                2,
                2,
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        let tlas = BvhNodeView::encode_leaf(
            vec3(-5.0, -0.01, -5.0),
            vec3(5.0, 4.01, 5.0),
            0,
            2,
        )
        .to_vec();

        Self {
            tlas,
            blas,
            models: vec![
                ModelData {
                    triangle_offset: 0,
                    triangle_count: 2,
                    blas_root: 0,
                    light_count: 0,
                },
                ModelData {
                    triangle_offset: 2,
                    triangle_count: 2,
                    blas_root: 1,
                    light_count: 2,
                },
            ],
            instances: vec![
                InstanceData {
                    model_id: 0,
                    blas_root: 0,
                    triangle_offset: 0,
                    _pad: 0,
                },
                InstanceData {
                    model_id: 1,
                    blas_root: 1,
                    triangle_offset: 2,
                    _pad: 0,
                },
            ],
            transforms: vec![
                InstanceTransform::new(
                    Affine3A::IDENTITY,
                    Affine3A::IDENTITY,
                );
                2
            ],
            triangles,
            materials: vec![
                Material {
                    albedo: vec4(0.8, 0.8, 0.8, 1.0),
                    emission: Vec4::ZERO,
                },
                Material {
                    albedo: Vec4::ONE,
                    emission: vec4(10.0, 10.0, 10.0, 1.0),
                },
            ],
            lights: (0..2)
                .map(|primitive_id| LightPickData {
                    model_id: 1,
                    instance_id: 1,
                    primitive_id,
                    lights_in_prim: 2,
                })
                .collect(),
        }
    }

    pub fn view(&self) -> SceneView {
        SceneView {
            tlas: BvhView::new(&self.tlas),
            blas: BvhView::new(&self.blas),
            models: &self.models,
            instances: &self.instances,
            transforms: &self.transforms,
            triangles: &self.triangles,
            materials: &self.materials,
        }
    }

    pub fn lights(&self) -> LightsView {
        LightsView::new(&self.lights)
    }
}

/// All per-frame buffers of a tiny render target.
pub struct TestFrame {
    pub size: UVec2,
    pub seed: u32,
    pub prev_camera: Camera,
    pub camera: Camera,
    pub counters: RayCounters,
    pub args: DispatchArgs,
    pub rays: [Vec<Ray>; 2],
    pub results: Vec<ExtendResult>,
    pub surfaces: Vec<SurfaceRecord>,
    pub shadow_rays: Vec<ShadowRay>,
    pub radiance: Vec<Vec4>,
    pub normals: Vec<Vec4>,
    pub depths: Vec<f32>,
    pub ids: Vec<UVec2>,
    pub positions: Vec<Vec4>,
    pub albedos: Vec<Vec4>,
    pub emissions: Vec<Vec4>,
    pub motions: Vec<Vec2>,
    pub history: Vec<f32>,
    pub moments: Vec<Vec2>,
    pub illumination: Vec<Vec4>,
    pub prev_illumination: Vec<Vec4>,
    pub output: Vec<Vec4>,
    pub reservoirs: Vec<LightReservoirData>,
    pub prev_reservoirs: Vec<LightReservoirData>,
    pub spatial_reservoirs: Vec<LightReservoirData>,
    pub blue_noise: Vec<u32>,
    pub sky: Vec<Vec4>,
}

impl TestFrame {
    pub fn new(width: u32, height: u32) -> Self {
        let size = uvec2(width, height);
        let len = (width * height) as usize;
        let camera = camera(size);

        Self {
            size,
            seed: 1,
            prev_camera: camera,
            camera,
            counters: Default::default(),
            args: Default::default(),
            rays: [vec![Ray::default(); len], vec![Ray::default(); len]],
            results: vec![Default::default(); len],
            surfaces: vec![Default::default(); len],
            shadow_rays: vec![Default::default(); len],
            radiance: vec![Vec4::ZERO; len],
            normals: vec![Vec4::ZERO; len],
            depths: vec![0.0; len],
            ids: vec![UVec2::ZERO; len],
            positions: vec![Vec4::ZERO; len],
            albedos: vec![Vec4::ZERO; len],
            emissions: vec![Vec4::ZERO; len],
            motions: vec![Vec2::ZERO; len],
            history: vec![0.0; len],
            moments: vec![Vec2::ZERO; len],
            illumination: vec![Vec4::ZERO; len],
            prev_illumination: vec![Vec4::ZERO; len],
            output: vec![Vec4::ZERO; len],
            reservoirs: vec![Default::default(); len],
            prev_reservoirs: vec![Default::default(); len],
            spatial_reservoirs: vec![Default::default(); len],
            blue_noise: vec![
                pack_unorm4(Vec4::splat(0.5));
                (BLUE_NOISE_SIZE * BLUE_NOISE_SIZE) as usize
            ],
            sky: vec![vec4(0.1, 0.1, 0.1, 1.0)],
        }
    }

    fn pixels(&self) -> impl Iterator<Item = UVec2> {
        let size = self.size;

        (0..size.y).flat_map(move |y| (0..size.x).map(move |x| uvec2(x, y)))
    }

    fn bounce_params(
        &self,
        bounce: u32,
        max_bounces: u32,
        reuse: bool,
    ) -> BouncePassParams {
        BouncePassParams {
            seed: self.seed,
            bounce,
            max_bounces,
            reuse: reuse as u32,
            ris_candidates: 4,
            max_t: 1000.0,
            hdri_lighting: 1.0,
            hdri_background: 1.0,
            sky_size: uvec2(1, 1),
            ..Default::default()
        }
    }

    pub fn restir_params(&self) -> RestirPassParams {
        RestirPassParams {
            seed: self.seed,
            ris_candidates: 4,
            current_light_clamp: 20.0,
            normal_threshold: 0.75,
            depth_threshold: 0.1,
            num_spatial_samples: 5,
            spatial_radius: 3.0,
            _pad: 0,
        }
    }

    pub fn generate(&mut self) {
        let params = GeneratePassParams {
            seed: self.seed,
            frame: 0,
            max_t: 1000.0,
            _pad: 0,
        };

        for pos in self.pixels().collect::<Vec<_>>() {
            generate(
                pos,
                &params,
                &self.camera,
                &BlueNoise::new(&self.blue_noise),
                &mut self.counters,
                &mut self.args,
                &mut self.rays[0],
                &mut self.radiance,
                &mut FrameBlanks {
                    normals: &mut self.normals,
                    ids: &mut self.ids,
                    history: &mut self.history,
                    moments: &mut self.moments,
                    illumination: &mut self.illumination,
                },
            );
        }
    }

    pub fn extend(&mut self, scene: &TestScene) {
        let batch = (self.counters.bounce % 2) as usize;

        for id in 0..self.rays[batch].len() as u32 {
            extend(
                id,
                &scene.view(),
                &mut self.counters,
                &self.rays[batch],
                &mut self.results,
            );
        }
    }

    pub fn shade(&mut self, scene: &TestScene, bounce: u32, max_bounces: u32) {
        let params = self.bounce_params(bounce, max_bounces, false);
        let [batch0, batch1] = &mut self.rays;

        let (rays, next_rays) = if bounce % 2 == 0 {
            (batch0, batch1)
        } else {
            (batch1, batch0)
        };

        for id in 0..rays.len() as u32 {
            shade(
                id,
                &params,
                &mut WhiteNoise::from_index(self.seed ^ bounce, id),
                &self.prev_camera,
                &self.camera,
                &scene.view(),
                &SkyView::new(&self.sky, uvec2(1, 1)),
                &mut self.counters,
                rays,
                &self.results,
                next_rays,
                &mut self.surfaces,
                &mut self.radiance,
                &mut GBuffer {
                    normals: &mut self.normals,
                    depths: &mut self.depths,
                    ids: &mut self.ids,
                    positions: &mut self.positions,
                    albedos: &mut self.albedos,
                    emissions: &mut self.emissions,
                    motions: &mut self.motions,
                },
            );
        }
    }

    pub fn direct_illumination(
        &mut self,
        scene: &TestScene,
        bounce: u32,
        reuse: bool,
    ) {
        let params = self.bounce_params(bounce, 0, reuse);

        for id in 0..self.surfaces.len() as u32 {
            direct_illumination(
                id,
                &params,
                &mut WhiteNoise::from_index(self.seed ^ bounce, id),
                &scene.view(),
                &scene.lights(),
                &mut self.counters,
                &self.surfaces,
                &mut self.reservoirs,
                &mut self.shadow_rays,
            );
        }
    }

    pub fn restir_temporal(&mut self, scene: &TestScene) {
        let params = self.restir_params();
        let prev_normals = self.normals.clone();
        let prev_depths = self.depths.clone();
        let prev_ids = self.ids.clone();

        for pos in self.pixels().collect::<Vec<_>>() {
            restir_temporal(
                pos,
                &params,
                &mut WhiteNoise::new(self.seed, pos),
                &self.camera,
                &scene.view(),
                &scene.lights(),
                &self.surfaces,
                &self.motions,
                &GeometryView {
                    normals: &self.normals,
                    depths: &self.depths,
                    ids: &self.ids,
                },
                &GeometryView {
                    normals: &prev_normals,
                    depths: &prev_depths,
                    ids: &prev_ids,
                },
                &self.prev_reservoirs,
                &mut self.reservoirs,
            );
        }
    }

    pub fn restir_spatial(&mut self, scene: &TestScene) {
        let params = self.restir_params();

        for pos in self.pixels().collect::<Vec<_>>() {
            restir_spatial(
                pos,
                &params,
                &mut WhiteNoise::new(self.seed ^ 0x5eed, pos),
                &self.camera,
                &scene.view(),
                &scene.lights(),
                &self.surfaces,
                &GeometryView {
                    normals: &self.normals,
                    depths: &self.depths,
                    ids: &self.ids,
                },
                &self.reservoirs,
                &mut self.spatial_reservoirs,
            );
        }
    }

    pub fn restir_shade(&mut self, scene: &TestScene, spatial: bool) {
        let pixels: Vec<_> = self.pixels().collect();

        let (source, target) = if spatial {
            (&self.spatial_reservoirs, &mut self.reservoirs)
        } else {
            (&self.reservoirs, &mut self.spatial_reservoirs)
        };

        for pos in pixels {
            restir_shade(
                pos,
                &self.camera,
                &scene.view(),
                &scene.lights(),
                &self.surfaces,
                source,
                target,
                &mut self.counters,
                &mut self.shadow_rays,
            );
        }
    }

    pub fn compact(&mut self) {
        compact(&mut self.counters, &mut self.args);
    }

    pub fn connect(&mut self, scene: &TestScene) {
        for id in 0..self.shadow_rays.len() as u32 {
            connect(
                id,
                &scene.view(),
                &self.counters,
                &self.shadow_rays,
                &mut self.radiance,
            );
        }
    }

    /// Runs the whole bounce loop.
    pub fn render(&mut self, scene: &TestScene, max_bounces: u32, reuse: bool) {
        self.generate();

        for bounce in 0..max_bounces {
            self.extend(scene);
            self.shade(scene, bounce, max_bounces);

            let reuse = reuse && bounce == 0;

            self.direct_illumination(scene, bounce, reuse);

            if reuse {
                self.restir_temporal(scene);
                self.restir_spatial(scene);
                self.restir_shade(scene, true);
            }

            self.compact();
            self.connect(scene);
        }
    }

    /// Swaps the ping-ponged buffers, as the renderer does between frames.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.reservoirs, &mut self.prev_reservoirs);
        std::mem::swap(&mut self.illumination, &mut self.prev_illumination);
        self.prev_camera = self.camera;
        self.seed = self.seed.wrapping_mul(31).wrapping_add(7);
    }
}

pub fn point_surface(position: Vec3) -> Surface {
    Surface {
        position,
        prev_position: position,
        normal: Vec3::Y,
        uv: vec2(0.0, 0.0),
        albedo: Vec3::splat(0.8),
        emission: Vec3::ZERO,
        instance_id: 0,
        triangle_id: 0,
    }
}
