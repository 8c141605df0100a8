use std::mem;

use bytemuck::Pod;
use glam::{UVec2, Vec2, Vec4};
use log::debug;

use crate::{
    gpu, slots, AccelStructures, Backend, BufferFlags, BufferHandle,
    DoubleBuffered, Resources, Sizing, TextureFormat, TextureHandle,
    TextureRole, TextureSpec,
};

/// Buffer together with the descriptor slot it occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bound {
    pub handle: BufferHandle,
    pub slot: u32,
}

impl Bound {
    fn new(handle: BufferHandle) -> Self {
        Self {
            handle,
            slot: u32::MAX,
        }
    }
}

/// Scene's buffers; their handles stay the same across reloads, only their
/// contents get reallocated.
#[derive(Clone, Debug)]
pub struct SceneBuffers {
    pub tlas: Bound,
    pub blas: Bound,
    pub models: Bound,
    pub instances: Bound,
    pub transforms: Bound,
    pub triangles: Bound,
    pub materials: Bound,
    pub lights: Bound,
}

impl SceneBuffers {
    /// Slots of the scene, in the order every tracing kernel binds them.
    pub fn slots(&self) -> [u32; 7] {
        [
            self.tlas.slot,
            self.blas.slot,
            self.models.slot,
            self.instances.slot,
            self.transforms.slot,
            self.triangles.slot,
            self.materials.slot,
        ]
    }
}

/// Every buffer the frame's passes touch.
#[derive(Clone, Debug)]
pub struct FrameBuffers {
    pub transfer: Bound,
    pub sky: Bound,
    pub sky_size: UVec2,
    pub output: TextureHandle,
    pub bloom: Vec<Bound>,
    pub blue_noise: Vec<BufferHandle>,

    pub scene: SceneBuffers,
    pub cameras: Bound,

    pub counters: Bound,
    pub args: Bound,
    pub rays: [Bound; 2],
    pub hits: Bound,
    pub shadow_rays: Bound,
    pub surfaces: Bound,
    pub radiance: Bound,

    pub normals: DoubleBuffered,
    pub depths: DoubleBuffered,
    pub ids: DoubleBuffered,
    pub positions: Bound,
    pub albedos: Bound,
    pub emissions: Bound,
    pub motions: Bound,

    pub reservoirs: DoubleBuffered,
    pub reservoir_scratch: Bound,

    pub illumination: DoubleBuffered,
    pub moments: DoubleBuffered,
    pub history: DoubleBuffered,
    pub weighted: Bound,
    pub atrous: Bound,

    /// Frame's HDR radiance, as fed into bloom and tonemapping.
    pub final_radiance: Bound,
}

impl FrameBuffers {
    pub fn new<B>(
        backend: &mut B,
        resources: &mut Resources<B>,
        sky: (&[Vec4], UVec2),
        blue_noise: &[Vec<u32>],
    ) -> Self
    where
        B: Backend,
    {
        debug!("Initializing frame buffers");

        let rw = BufferFlags::READ_WRITE;
        let screen = Sizing::Screen;
        let vec4 = mem::size_of::<Vec4>();
        let reservoir = mem::size_of::<gpu::LightReservoirData>();

        let mut create = |stride: usize, sizing, flags, name: &str| {
            Bound::new(resources.create_buffer(
                backend,
                None,
                stride as u32,
                sizing,
                flags,
                format!("lantern_{name}"),
            ))
        };

        let transfer = create(
            1,
            Sizing::Readback(TextureFormat::Rgba8Unorm),
            BufferFlags::TRANSFER | BufferFlags::READBACK,
            "transfer",
        );

        let bloom = (0..gpu::NUM_BLOOM_MIPS)
            .map(|mip| {
                create(vec4, Sizing::BloomMip(mip), rw, &format!("bloom_{mip}"))
            })
            .collect();

        let cameras = create(
            mem::size_of::<gpu::Camera>(),
            Sizing::Fixed(2),
            BufferFlags::CONSTANT | BufferFlags::UPLOAD,
            "cameras",
        );

        let counters = create(
            mem::size_of::<gpu::RayCounters>(),
            Sizing::Fixed(1),
            rw,
            "counters",
        );

        let args = create(
            mem::size_of::<gpu::DispatchArgs>(),
            Sizing::Fixed(1),
            rw | BufferFlags::INDIRECT,
            "dispatch_args",
        );

        let ray = mem::size_of::<gpu::Ray>();

        let rays = [
            create(ray, screen, rw, "rays_0"),
            create(ray, screen, rw, "rays_1"),
        ];

        let hits = create(mem::size_of::<gpu::ExtendResult>(), screen, rw, "hits");
        let shadow_rays =
            create(mem::size_of::<gpu::ShadowRay>(), screen, rw, "shadow_rays");
        let surfaces =
            create(mem::size_of::<gpu::SurfaceRecord>(), screen, rw, "surfaces");
        let radiance = create(vec4, screen, rw, "radiance");
        let positions = create(vec4, screen, rw, "positions");
        let albedos = create(vec4, screen, rw, "albedos");
        let emissions = create(vec4, screen, rw, "emissions");
        let motions = create(mem::size_of::<Vec2>(), screen, rw, "motions");
        let reservoir_scratch =
            create(reservoir, screen, rw, "reservoir_scratch");
        let weighted = create(vec4, screen, rw, "weighted");
        let atrous = create(vec4, screen, rw, "atrous");
        let final_radiance = create(vec4, screen, rw, "final");

        let mut pair = |stride: usize, name: &str| {
            DoubleBuffered::new(
                backend,
                resources,
                stride as u32,
                Sizing::Screen,
                BufferFlags::READ_WRITE,
                &format!("lantern_{name}"),
            )
        };

        let normals = pair(vec4, "normals");
        let depths = pair(mem::size_of::<f32>(), "depths");
        let ids = pair(mem::size_of::<UVec2>(), "ids");
        let reservoirs = pair(reservoir, "reservoirs");
        let illumination = pair(vec4, "illumination");
        let moments = pair(mem::size_of::<Vec2>(), "moments");
        let history = pair(mem::size_of::<f32>(), "history");

        let (sky_texels, sky_size) = sky;

        let sky = Bound::new(upload(
            backend,
            resources,
            sky_texels,
            BufferFlags::READ_ONLY,
            "lantern_sky",
        ));

        let blue_noise = blue_noise
            .iter()
            .enumerate()
            .map(|(idx, texels)| {
                upload(
                    backend,
                    resources,
                    texels,
                    BufferFlags::READ_ONLY,
                    &format!("lantern_blue_noise_{idx}"),
                )
            })
            .collect();

        let output = resources.create_texture(
            backend,
            TextureSpec {
                format: TextureFormat::Rgba8Unorm,
                mips: 1,
                role: TextureRole::ReadWrite,
                size: resources.screen(),
                tracks_window: true,
            },
            "lantern_output",
        );

        let scene = SceneBuffers {
            tlas: placeholder::<_, Vec4>(backend, resources, "tlas"),
            blas: placeholder::<_, Vec4>(backend, resources, "blas"),
            models: placeholder::<_, gpu::ModelData>(backend, resources, "models"),
            instances: placeholder::<_, gpu::InstanceData>(
                backend,
                resources,
                "instances",
            ),
            transforms: placeholder::<_, gpu::InstanceTransform>(
                backend,
                resources,
                "transforms",
            ),
            triangles: placeholder::<_, gpu::Triangle>(
                backend,
                resources,
                "triangles",
            ),
            materials: placeholder::<_, gpu::Material>(
                backend,
                resources,
                "materials",
            ),
            lights: placeholder::<_, gpu::LightPickData>(
                backend,
                resources,
                "lights",
            ),
        };

        let mut this = Self {
            transfer,
            sky,
            sky_size,
            output,
            bloom,
            blue_noise,
            scene,
            cameras,
            counters,
            args,
            rays,
            hits,
            shadow_rays,
            surfaces,
            radiance,
            normals,
            depths,
            ids,
            positions,
            albedos,
            emissions,
            motions,
            reservoirs,
            reservoir_scratch,
            illumination,
            moments,
            history,
            weighted,
            atrous,
            final_radiance,
        };

        this.register(resources, 0);
        this
    }

    /// Rebuilds the descriptor table from scratch: header first, then the
    /// rest of the buffers in a fixed order, so that every buffer lands in
    /// the same slot each time.
    pub fn register<B>(&mut self, resources: &mut Resources<B>, frame: u32)
    where
        B: Backend,
    {
        debug!("Registering frame buffers");

        resources.descriptors_mut().reserve_header();

        resources.switch(self.transfer.handle, slots::TRANSFER);
        resources.switch(self.sky.handle, slots::SKYBOX);
        resources.switch(self.scene.lights.handle, slots::LIGHTS);
        resources.switch(self.scene.transforms.handle, slots::TRANSFORMS);
        resources.switch(self.scene.models.handle, slots::MODELS);
        resources.switch(self.output, slots::OUTPUT);

        self.transfer.slot = slots::TRANSFER;
        self.sky.slot = slots::SKYBOX;
        self.scene.lights.slot = slots::LIGHTS;
        self.scene.transforms.slot = slots::TRANSFORMS;
        self.scene.models.slot = slots::MODELS;

        for (mip, bloom) in self.bloom.iter_mut().enumerate() {
            bloom.slot = slots::BLOOM + mip as u32;
            resources.switch(bloom.handle, bloom.slot);
        }

        self.switch_blue_noise(resources, frame);

        let [rays_0, rays_1] = &mut self.rays;

        for bound in [
            &mut self.scene.tlas,
            &mut self.scene.blas,
            &mut self.scene.instances,
            &mut self.scene.triangles,
            &mut self.scene.materials,
            &mut self.cameras,
            &mut self.counters,
            &mut self.args,
            rays_0,
            rays_1,
            &mut self.hits,
            &mut self.shadow_rays,
            &mut self.surfaces,
            &mut self.radiance,
            &mut self.positions,
            &mut self.albedos,
            &mut self.emissions,
            &mut self.motions,
            &mut self.reservoir_scratch,
            &mut self.weighted,
            &mut self.atrous,
            &mut self.final_radiance,
        ] {
            bound.slot = resources.add(bound.handle);
        }

        for pair in [
            &mut self.normals,
            &mut self.depths,
            &mut self.ids,
            &mut self.reservoirs,
            &mut self.illumination,
            &mut self.moments,
            &mut self.history,
        ] {
            pair.register(resources);
        }
    }

    /// Points the blue-noise slot at the texture used by given frame.
    pub fn switch_blue_noise<B>(&self, resources: &mut Resources<B>, frame: u32)
    where
        B: Backend,
    {
        let idx = frame as usize % self.blue_noise.len();

        resources.switch(self.blue_noise[idx], slots::BLUE_NOISE);
    }

    /// Uploads the scene.
    ///
    /// With `full` set every buffer gets reallocated; otherwise only the parts
    /// that change when instances move (TLAS, instances, transforms) are
    /// written into the existing allocations, plus BLASes and triangles when
    /// `refitted` is set.
    pub fn upload_scene<B>(
        &self,
        backend: &mut B,
        resources: &mut Resources<B>,
        accel: &AccelStructures,
        full: bool,
        refitted: bool,
    ) where
        B: Backend,
    {
        let data = accel.data();
        let scene = &self.scene;

        let mut write = |bound: Bound, bytes: &[u8], count: usize| {
            let count = count.max(1) as u32;

            if full || resources.buffer(bound.handle).count() != count {
                resources.recreate_buffer(
                    backend,
                    bound.handle,
                    Some(bytes),
                    Sizing::Fixed(count),
                );
            } else {
                resources.write_buffer(backend, bound.handle, 0, bytes);
            }
        };

        write(scene.tlas, bytemuck::cast_slice(&data.tlas), data.tlas.len());

        write(
            scene.instances,
            bytemuck::cast_slice(&data.instances),
            data.instances.len(),
        );

        write(
            scene.transforms,
            bytemuck::cast_slice(&data.transforms),
            data.transforms.len(),
        );

        if full || refitted {
            write(scene.blas, bytemuck::cast_slice(&data.blas), data.blas.len());

            write(
                scene.triangles,
                bytemuck::cast_slice(&data.triangles),
                data.triangles.len(),
            );
        }

        if full {
            write(
                scene.models,
                bytemuck::cast_slice(&data.models),
                data.models.len(),
            );

            write(
                scene.materials,
                bytemuck::cast_slice(&data.materials),
                data.materials.len(),
            );

            write(
                scene.lights,
                bytemuck::cast_slice(&data.lights),
                data.lights.len(),
            );
        }
    }

    /// Reallocates reservoirs, dropping whatever the previous scene left in
    /// them.
    pub fn recreate_reservoirs<B>(
        &self,
        backend: &mut B,
        resources: &mut Resources<B>,
    ) where
        B: Backend,
    {
        for handle in [
            self.reservoirs.curr(),
            self.reservoirs.prev(),
            self.reservoir_scratch.handle,
        ] {
            resources.recreate_buffer(backend, handle, None, Sizing::Screen);
        }
    }

    /// Swaps the roles of every current/previous pair.
    pub fn swap<B>(&mut self, resources: &mut Resources<B>)
    where
        B: Backend,
    {
        for pair in [
            &mut self.normals,
            &mut self.depths,
            &mut self.ids,
            &mut self.reservoirs,
            &mut self.illumination,
            &mut self.moments,
            &mut self.history,
        ] {
            pair.swap(resources);
        }
    }
}

fn upload<B, T>(
    backend: &mut B,
    resources: &mut Resources<B>,
    data: &[T],
    flags: BufferFlags,
    name: &str,
) -> BufferHandle
where
    B: Backend,
    T: Pod,
{
    resources.create_buffer(
        backend,
        Some(bytemuck::cast_slice(data)),
        mem::size_of::<T>() as u32,
        Sizing::Fixed(data.len().max(1) as u32),
        flags,
        name,
    )
}

/// Single, zeroed element standing in for scene data until the first load.
fn placeholder<B, T>(
    backend: &mut B,
    resources: &mut Resources<B>,
    name: &str,
) -> Bound
where
    B: Backend,
    T: Pod,
{
    Bound::new(upload(
        backend,
        resources,
        &[T::zeroed()],
        BufferFlags::READ_ONLY,
        &format!("lantern_{name}"),
    ))
}
