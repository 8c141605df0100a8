use derivative::Derivative;
use glam::UVec2;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{
    blue_noise, gpu, timings, AccelStructures, Backend, CameraInput,
    DenoiserPass, FrameBuffers, Instance, Mesh, MeshHandle, PassContext,
    PassTiming, PostPass, PreviewPass, RenderSettings, RendererConfig,
    Resources, Result, SamplerDesc, ScreenshotRequest, ShaderLibrary, Sky,
    StageSchedule, TextureHandle, WavefrontPass, WgpuBackend,
};

/// Everything the host provides each frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    pub camera: CameraInput,
    pub instances: &'a [Instance],

    /// Time elapsed since the previous frame, in seconds; drives mesh
    /// animations.
    pub delta_time: f32,

    /// Whether the set of meshes or instances has changed since the previous
    /// frame; the scene then gets rebuilt at the beginning of this frame.
    pub reload_models: bool,

    pub clear_accumulation: bool,
}

impl<'a> FrameInput<'a> {
    pub fn new(camera: CameraInput, instances: &'a [Instance]) -> Self {
        Self {
            camera,
            instances,
            delta_time: 0.0,
            reload_models: false,
            clear_accumulation: false,
        }
    }

    pub fn with_delta_time(mut self, delta_time: f32) -> Self {
        self.delta_time = delta_time;
        self
    }

    pub fn with_reload(mut self) -> Self {
        self.reload_models = true;
        self
    }

    pub fn with_cleared_accumulation(mut self) -> Self {
        self.clear_accumulation = true;
        self
    }
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Renderer<B>
where
    B: Backend,
{
    #[derivative(Debug = "ignore")]
    backend: B,
    resources: Resources<B>,
    shaders: ShaderLibrary<B>,
    buffers: FrameBuffers,
    accel: AccelStructures,
    meshes: Vec<Mesh>,
    config: RendererConfig,
    #[derivative(Debug = "ignore")]
    rng: StdRng,
    prev_camera: Option<gpu::Camera>,
    prev_settings: Option<RenderSettings>,
    scene_loaded: bool,
    total_frames: u32,
    accumulated_frames: u32,
    screenshot: Option<ScreenshotRequest>,
    timings: Vec<PassTiming>,
    schedule: StageSchedule,
}

impl Renderer<WgpuBackend> {
    /// Creates a renderer running on its own wgpu device.
    pub fn with_wgpu(config: RendererConfig) -> Result<Self> {
        let backend = WgpuBackend::new(config.timings)?;

        Self::new(backend, config)
    }
}

impl<B> Renderer<B>
where
    B: Backend,
{
    /// Creates a renderer, loading shaders from [`RendererConfig::shader_dir`].
    pub fn new(mut backend: B, config: RendererConfig) -> Result<Self> {
        let shaders = ShaderLibrary::new(&mut backend, &config.shader_dir)?;

        Ok(Self::with_shaders(backend, config, shaders))
    }

    pub fn with_shaders(
        mut backend: B,
        config: RendererConfig,
        shaders: ShaderLibrary<B>,
    ) -> Self {
        info!(
            "Initializing renderer; size={}x{}",
            config.size.x, config.size.y,
        );

        let mut resources = Resources::new(config.size);

        for desc in SamplerDesc::standard() {
            resources.samplers_mut().add(desc);
        }

        let sky = Sky::load(config.skybox.as_deref());
        let blue_noise = blue_noise::load(config.blue_noise_dir.as_deref());

        let buffers = FrameBuffers::new(
            &mut backend,
            &mut resources,
            (&sky.texels, sky.size),
            &blue_noise,
        );

        Self {
            backend,
            resources,
            shaders,
            buffers,
            accel: Default::default(),
            meshes: Default::default(),
            config,
            rng: StdRng::seed_from_u64(0),
            prev_camera: None,
            prev_settings: None,
            scene_loaded: false,
            total_frames: 0,
            accumulated_frames: 0,
            screenshot: None,
            timings: Default::default(),
            schedule: Default::default(),
        }
    }

    /// Registers a mesh; instances can refer to it starting from the next
    /// frame that requests a reload.
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshHandle {
        self.meshes.push(mesh);

        MeshHandle::new((self.meshes.len() - 1) as u32)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle.get())
    }

    pub fn mesh_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle.get())
    }

    /// Recompiles shaders, keeping the last known good pipelines of those
    /// that fail; returns the number of failures.
    pub fn reload_shaders(&mut self) -> Result<usize> {
        self.shaders.reload(&mut self.backend)
    }

    pub fn request_screenshot(&mut self, request: ScreenshotRequest) {
        self.screenshot = Some(request);
    }

    /// Drops the accumulated frames, starting the average over.
    pub fn clear_accumulation(&mut self) {
        if self.accumulated_frames > 0 {
            debug!(
                "Clearing accumulation ({} frames)",
                self.accumulated_frames
            );
        }

        self.accumulated_frames = 0;
    }

    /// Renders a single frame.
    ///
    /// Fails only when a requested screenshot couldn't be saved; broken
    /// invariants (e.g. a scene without any emissive triangles) panic.
    pub fn render(
        &mut self,
        input: &FrameInput,
        settings: &RenderSettings,
    ) -> Result<()> {
        self.backend.begin_frame();
        self.timings = self.backend.take_timings();
        timings::report(&self.timings);

        let refitted = self.animate(input.delta_time);
        let reloaded = self.update_scene(input, refitted);

        self.buffers
            .switch_blue_noise(&mut self.resources, self.total_frames);

        let screen = self.resources.screen();
        let camera = input.camera.serialize(screen);
        let mut cameras = [camera; 2];

        cameras[gpu::CAMERA_PREV] = self.prev_camera.unwrap_or(camera);

        self.resources.write_buffer(
            &mut self.backend,
            self.buffers.cameras.handle,
            0,
            bytemuck::cast_slice(&cameras),
        );

        // ---

        let camera_moved = self
            .prev_camera
            .map_or(true, |prev_camera| prev_camera.has_moved(&camera));

        let instances_moved = self
            .accel
            .instances()
            .iter()
            .any(|instance| instance.transform != instance.prev_transform);

        let settings_changed = self
            .prev_settings
            .as_ref()
            .map_or(true, |prev_settings| prev_settings != settings);

        self.total_frames = self.total_frames.wrapping_add(1);

        if !settings.accumulation
            || settings.render_mode.preview().is_some()
            || camera_moved
            || instances_moved
            || settings_changed
            || reloaded
            || refitted
            || input.clear_accumulation
        {
            self.clear_accumulation();
        }

        let capped = settings.accumulation
            && settings.max_accumulated_frames > 0
            && self.accumulated_frames >= settings.max_accumulated_frames;

        if settings.accumulation
            && settings.render_mode.preview().is_none()
            && !capped
        {
            self.accumulated_frames += 1;
        }

        // ---

        let mut list = self.backend.command_list();

        if capped {
            debug!(
                "Reached {} accumulated frames; skipping the frame",
                self.accumulated_frames,
            );
        } else {
            let max_t = input.camera.max_t(
                self.accel.scene_diagonal(),
                settings.tracing_distance_multiplier,
            );

            let ctx = PassContext {
                buffers: &self.buffers,
                settings,
                screen,
                seed: self.rng.gen(),
                frame: self.total_frames,
                max_t,
                accumulated_frames: self.accumulated_frames,
            };

            let schedule = Self::build_schedule(&ctx);

            schedule.validate();
            schedule.record(
                &mut list,
                self.resources.descriptors(),
                &mut self.shaders,
                self.config.timings,
            );

            self.schedule = schedule;
        }

        if self.screenshot.is_some() {
            list.copy_texture_to_buffer(
                self.buffers.output,
                self.buffers.transfer.handle,
            );
        }

        self.prev_camera = Some(camera);
        self.prev_settings = Some(settings.clone());

        // Slots have already been resolved by the recorded commands, so the
        // swap affects only the next frame
        if !capped {
            self.buffers.swap(&mut self.resources);
        }

        self.backend.submit(list, &self.resources, &self.shaders);

        if let Some(request) = self.screenshot.take() {
            self.backend.drain();

            let bytes = self
                .resources
                .read_buffer(&mut self.backend, self.buffers.transfer.handle);

            request.save(screen, &bytes)?;
        }

        Ok(())
    }

    fn build_schedule(ctx: &PassContext) -> StageSchedule {
        let mut schedule = StageSchedule::default();

        match ctx.settings.render_mode.preview() {
            Some(mode) => {
                PreviewPass::schedule(&mut schedule, ctx, mode);

                // Debug views show raw values, not radiance
                let passthrough = mode != gpu::PreviewMode::RayTrace;

                PostPass::schedule(&mut schedule, ctx, passthrough);
            }

            None => {
                WavefrontPass::schedule(&mut schedule, ctx);

                if DenoiserPass::is_active(ctx) {
                    DenoiserPass::schedule(&mut schedule, ctx);
                }

                PostPass::schedule(&mut schedule, ctx, false);
            }
        }

        schedule
    }

    /// Advances meshes' animations, refitting BLASes of those that moved;
    /// returns whether any did.
    fn animate(&mut self, dt: f32) -> bool {
        let mut refitted = false;

        for (idx, mesh) in self.meshes.iter_mut().enumerate() {
            if mesh.animate(dt) {
                self.accel.refit_mesh(MeshHandle::new(idx as u32), mesh);
                refitted = true;
            }
        }

        refitted
    }

    /// Updates the TLAS (or rebuilds the entire scene, if requested or
    /// necessary); returns whether the scene has been rebuilt.
    fn update_scene(&mut self, input: &FrameInput, refitted: bool) -> bool {
        if self.scene_loaded && !input.reload_models {
            if self.accel.update(&self.meshes, input.instances) {
                self.buffers.upload_scene(
                    &mut self.backend,
                    &mut self.resources,
                    &self.accel,
                    false,
                    refitted,
                );

                return false;
            }

            warn!(
                "Instances have changed without a reload being requested; \
                 reloading the scene"
            );
        }

        self.reload(input.instances);

        true
    }

    fn reload(&mut self, instances: &[Instance]) {
        info!(
            "Reloading scene; meshes={}, instances={}",
            self.meshes.len(),
            instances.len(),
        );

        self.accel.rebuild(&self.meshes, instances);

        self.buffers.upload_scene(
            &mut self.backend,
            &mut self.resources,
            &self.accel,
            true,
            true,
        );

        self.buffers.register(&mut self.resources, self.total_frames);

        self.buffers
            .recreate_reservoirs(&mut self.backend, &mut self.resources);

        self.scene_loaded = true;
        self.clear_accumulation();
    }

    /// Reallocates every screen-sized resource, keeping their slots.
    pub fn resize(&mut self, size: UVec2) {
        if size == self.resources.screen() {
            return;
        }

        info!("Resizing renderer to {}x{}", size.x, size.y);

        self.backend.drain();
        self.resources.resize(&mut self.backend, size);

        self.prev_camera = None;
        self.total_frames = 0;
        self.clear_accumulation();
    }

    pub fn size(&self) -> UVec2 {
        self.resources.screen()
    }

    /// Texture the frame gets tonemapped into; it also occupies
    /// [`crate::slots::OUTPUT`].
    pub fn output(&self) -> TextureHandle {
        self.buffers.output
    }

    /// GPU timings of the most recently completed frame; empty unless
    /// [`RendererConfig::timings`] is enabled.
    pub fn timings(&self) -> &[PassTiming] {
        &self.timings
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn accumulated_frames(&self) -> u32 {
        self.accumulated_frames
    }

    /// Stages of the most recently rendered frame.
    pub fn schedule(&self) -> &StageSchedule {
        &self.schedule
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn resources(&self) -> &Resources<B> {
        &self.resources
    }

    pub fn buffers(&self) -> &FrameBuffers {
        &self.buffers
    }

    pub fn accel(&self) -> &AccelStructures {
        &self.accel
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs, process};

    use approx::assert_relative_eq;
    use glam::{uvec2, vec2, vec3, Affine3A, Vec3};

    use super::*;
    use crate::{
        slots, Command, HeadlessBackend, HeadlessPipeline, Material,
        MeshAnimation, RenderMode, Resource, ShaderId, Sizing, Submesh,
        TextureFormat, Vertex,
    };

    fn quad(material: Material) -> Mesh {
        let vertices = [
            vec3(-0.5, -0.5, 0.0),
            vec3(0.5, -0.5, 0.0),
            vec3(0.5, 0.5, 0.0),
            vec3(-0.5, 0.5, 0.0),
        ]
        .map(|position| Vertex::new(position, Vec3::Z, vec2(0.0, 0.0)))
        .to_vec();

        Mesh::new(vertices, vec![0, 1, 2, 0, 2, 3])
            .with_submesh(Submesh::new(0..6, material))
    }

    fn lamp() -> Mesh {
        quad(Material::default().with_emission(Vec3::splat(10.0)))
    }

    fn wall() -> Mesh {
        quad(Material::default())
    }

    struct Scene {
        renderer: Renderer<HeadlessBackend>,
        instances: Vec<Instance>,
        camera: CameraInput,
    }

    impl Scene {
        fn new(size: UVec2) -> Self {
            Self::with_meshes(size, vec![lamp(), wall()])
        }

        fn with_meshes(size: UVec2, meshes: Vec<Mesh>) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();

            let mut shaders = ShaderLibrary::empty();

            for &id in ShaderId::ALL {
                shaders.insert(
                    id,
                    HeadlessPipeline {
                        entry_point: id.entry_point().into(),
                    },
                );
            }

            let config = RendererConfig {
                size,
                ..Default::default()
            };

            let mut renderer = Renderer::with_shaders(
                HeadlessBackend::default(),
                config,
                shaders,
            );

            let instances = meshes
                .into_iter()
                .enumerate()
                .map(|(idx, mesh)| {
                    Instance::new(
                        renderer.add_mesh(mesh),
                        Affine3A::from_translation(vec3(
                            0.0,
                            idx as f32,
                            -3.0,
                        )),
                    )
                })
                .collect();

            Self {
                renderer,
                instances,
                camera: CameraInput::default(),
            }
        }

        fn render(&mut self, settings: &RenderSettings) {
            let input = FrameInput::new(self.camera, &self.instances);

            self.renderer.render(&input, settings).unwrap();
        }

        fn render_with(
            &mut self,
            settings: &RenderSettings,
            f: impl FnOnce(FrameInput) -> FrameInput,
        ) {
            let input = f(FrameInput::new(self.camera, &self.instances));

            self.renderer.render(&input, settings).unwrap();
        }

        /// Returns shaders bound during the most recent frame, in order.
        fn dispatched(&self) -> Vec<ShaderId> {
            self.renderer
                .backend()
                .last_submission()
                .iter()
                .filter_map(|command| match command {
                    Command::Bind { shader, .. } => Some(*shader),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn full_frame() {
        let mut scene = Scene::new(uvec2(320, 200));

        scene.render(&Default::default());

        let dispatched = scene.dispatched();

        assert_eq!(Some(&ShaderId::WavefrontGenerate), dispatched.first());
        assert_eq!(Some(&ShaderId::Tonemap), dispatched.last());
        assert!(dispatched.contains(&ShaderId::WavefrontFinalize));
        assert!(dispatched.contains(&ShaderId::DenoiseReproject));
        assert!(dispatched.contains(&ShaderId::DenoiseAtrous));
        assert!(!dispatched.contains(&ShaderId::Preview));

        assert_eq!(1, scene.renderer.total_frames());
        assert_eq!(1, scene.renderer.accumulated_frames());
        assert_eq!(1, scene.renderer.backend().frames());
        assert_eq!(2, scene.renderer.accel().instances().len());
    }

    #[test]
    fn barrier_between_generate_and_extend() {
        let mut scene = Scene::new(uvec2(320, 200));

        scene.render(&Default::default());

        let commands = scene.renderer.backend().last_submission();

        let position = |id| {
            commands
                .iter()
                .position(|command| {
                    matches!(
                        command,
                        Command::Bind { shader, .. } if *shader == id
                    )
                })
                .unwrap()
        };

        let generate = position(ShaderId::WavefrontGenerate);
        let extend = position(ShaderId::WavefrontExtend);

        assert!(generate < extend);

        assert!(commands[generate..extend]
            .iter()
            .any(|command| matches!(command, Command::Barrier(_))));
    }

    #[test]
    fn resize() {
        let mut scene = Scene::new(uvec2(1920, 1080));

        scene.render(&Default::default());
        scene.render(&Default::default());

        let old_size = uvec2(1920, 1080);
        let new_size = uvec2(1280, 720);
        let resources = scene.renderer.resources();

        fn slots_of(
            resources: &Resources<HeadlessBackend>,
            resource: Resource,
        ) -> Vec<u32> {
            resources.descriptors().slots_of(resource).collect()
        }

        let screen_buffers: Vec<_> = resources
            .buffers()
            .filter(|(_, buffer)| buffer.count() == old_size.x * old_size.y)
            .map(|(handle, _)| (handle, slots_of(resources, handle.into())))
            .collect();

        let screen_textures: Vec<_> = resources
            .textures()
            .filter(|(_, texture)| texture.size() == old_size)
            .map(|(handle, _)| (handle, slots_of(resources, handle.into())))
            .collect();

        assert!(screen_buffers.len() >= 10);
        assert!(!screen_textures.is_empty());

        scene.renderer.resize(new_size);

        let resources = scene.renderer.resources();

        assert_eq!(new_size, scene.renderer.size());
        assert_eq!(0, scene.renderer.total_frames());
        assert_eq!(0, scene.renderer.accumulated_frames());

        for (handle, old_slots) in screen_buffers {
            assert_eq!(
                new_size.x * new_size.y,
                resources.buffer(handle).count()
            );

            assert_eq!(old_slots, slots_of(resources, handle.into()));
        }

        for (handle, old_slots) in screen_textures {
            assert_eq!(new_size, resources.texture(handle).size());
            assert_eq!(old_slots, slots_of(resources, handle.into()));
        }

        let transfer = scene.renderer.buffers().transfer;

        assert_eq!(
            Sizing::Readback(TextureFormat::Rgba8Unorm).count(new_size),
            resources.buffer(transfer.handle).count()
        );

        assert_eq!(
            Some(Resource::from(scene.renderer.output())),
            resources.descriptors().get(slots::OUTPUT)
        );

        scene.render(&Default::default());

        assert_eq!(1, scene.renderer.accumulated_frames());
    }

    #[test]
    fn normal_thresholds_are_deviations() {
        let mut scene = Scene::new(uvec2(64, 32));
        let mut settings = RenderSettings::default();

        settings.restir.normal_threshold = 0.25;
        settings.denoiser.normal_threshold = 0.4;

        scene.render(&settings);

        let commands = scene.renderer.backend().last_submission();

        let params_of = |id: ShaderId| -> Vec<u8> {
            let bind = commands
                .iter()
                .position(|command| {
                    matches!(
                        command,
                        Command::Bind { shader, .. } if *shader == id
                    )
                })
                .unwrap();

            match &commands[bind + 1] {
                Command::PushConstants(bytes) => bytes.clone(),
                command => panic!("expected push constants, got {command:?}"),
            }
        };

        let reproject = params_of(ShaderId::DenoiseReproject);
        let reproject: gpu::ReprojectPassParams =
            bytemuck::pod_read_unaligned(&reproject);

        let temporal = params_of(ShaderId::RestirTemporal);
        let temporal: gpu::RestirPassParams =
            bytemuck::pod_read_unaligned(&temporal);

        assert_relative_eq!(reproject.normal_threshold, 0.6);
        assert_relative_eq!(temporal.normal_threshold, 0.75);
    }

    #[test]
    fn accumulation() {
        let mut scene = Scene::new(uvec2(64, 32));
        let settings = RenderSettings::default();

        for _ in 0..50 {
            scene.render(&settings);
        }

        assert_eq!(50, scene.renderer.accumulated_frames());

        // Denoiser only runs before any history has been accumulated
        assert!(!scene.dispatched().contains(&ShaderId::DenoiseReproject));

        scene.camera.position.x += 0.1;
        scene.render(&settings);

        assert_eq!(1, scene.renderer.accumulated_frames());
        assert!(scene.dispatched().contains(&ShaderId::DenoiseReproject));
    }

    #[test]
    fn accumulation_cap() {
        let mut scene = Scene::new(uvec2(64, 32));

        let settings = RenderSettings {
            max_accumulated_frames: 3,
            ..Default::default()
        };

        for _ in 0..3 {
            scene.render(&settings);
        }

        assert_eq!(3, scene.renderer.accumulated_frames());
        assert!(!scene.dispatched().is_empty());

        scene.render(&settings);

        assert_eq!(3, scene.renderer.accumulated_frames());
        assert_eq!(4, scene.renderer.total_frames());
        assert!(scene.dispatched().is_empty());
    }

    #[test]
    fn accumulation_disabled() {
        let mut scene = Scene::new(uvec2(64, 32));

        let settings = RenderSettings {
            accumulation: false,
            ..Default::default()
        };

        for _ in 0..3 {
            scene.render(&settings);

            assert_eq!(0, scene.renderer.accumulated_frames());
            assert!(scene.dispatched().contains(&ShaderId::DenoiseReproject));
        }
    }

    #[test]
    fn clearing_accumulation() {
        let mut scene = Scene::new(uvec2(64, 32));
        let settings = RenderSettings::default();

        for _ in 0..5 {
            scene.render(&settings);
        }

        scene.render_with(&settings, |input| input.with_cleared_accumulation());

        assert_eq!(1, scene.renderer.accumulated_frames());
    }

    #[test]
    fn changing_settings_clears_accumulation() {
        let mut scene = Scene::new(uvec2(64, 32));
        let mut settings = RenderSettings::default();

        for _ in 0..5 {
            scene.render(&settings);
        }

        settings.max_bounces = 2;
        scene.render(&settings);

        assert_eq!(1, scene.renderer.accumulated_frames());
    }

    #[test]
    fn reload() {
        let mut scene = Scene::new(uvec2(64, 32));
        let settings = RenderSettings::default();

        for _ in 0..5 {
            scene.render(&settings);
        }

        scene.instances.pop();
        scene.render_with(&settings, |input| input.with_reload());

        assert_eq!(1, scene.renderer.accumulated_frames());
        assert_eq!(1, scene.renderer.accel().instances().len());
    }

    #[test]
    fn moving_instances_clears_accumulation() {
        let mut scene = Scene::new(uvec2(64, 32));
        let settings = RenderSettings::default();

        for _ in 0..5 {
            scene.render(&settings);
        }

        scene.instances[1].transform =
            Affine3A::from_translation(vec3(1.0, 1.0, -3.0));

        scene.render(&settings);

        assert_eq!(1, scene.renderer.accumulated_frames());

        scene.render(&settings);

        assert_eq!(2, scene.renderer.accumulated_frames());
    }

    #[test]
    fn animated_meshes_clear_accumulation() {
        let animation = MeshAnimation::new(true)
            .with_keyframe(0.0, vec![Affine3A::IDENTITY])
            .with_keyframe(
                1.0,
                vec![Affine3A::from_translation(vec3(0.0, 0.0, 1.0))],
            );

        let mut scene = Scene::with_meshes(
            uvec2(64, 32),
            vec![lamp(), wall().with_animation(animation)],
        );

        let settings = RenderSettings::default();

        for _ in 0..5 {
            scene.render_with(&settings, |input| input.with_delta_time(0.1));

            assert_eq!(1, scene.renderer.accumulated_frames());
        }

        scene.render(&settings);

        assert_eq!(2, scene.renderer.accumulated_frames());
    }

    #[test]
    fn previews() {
        let mut scene = Scene::new(uvec2(64, 32));

        for mode in [
            RenderMode::RayTrace,
            RenderMode::Albedo,
            RenderMode::Normal,
            RenderMode::Uv,
        ] {
            let settings = RenderSettings {
                render_mode: mode,
                ..Default::default()
            };

            scene.render(&settings);

            let dispatched = scene.dispatched();

            assert_eq!(Some(&ShaderId::Preview), dispatched.first());
            assert_eq!(Some(&ShaderId::Tonemap), dispatched.last());
            assert!(!dispatched.contains(&ShaderId::WavefrontGenerate));
            assert_eq!(0, scene.renderer.accumulated_frames());
        }
    }

    #[test]
    fn screenshot() {
        let mut scene = Scene::new(uvec2(64, 32));

        let path = env::temp_dir()
            .join(format!("lantern-screenshot-{}.png", process::id()));

        scene.renderer.request_screenshot(
            ScreenshotRequest::new(&path).with_crop(uvec2(16, 8)),
        );

        scene.render(&Default::default());

        assert!(scene.renderer.backend().last_submission().iter().any(
            |command| matches!(command, Command::CopyTextureToBuffer { .. })
        ));

        let image = image::open(&path).unwrap();

        assert_eq!((16, 8), (image.width(), image.height()));

        fs::remove_file(path).unwrap();

        // Requests are one-shot
        scene.render(&Default::default());

        assert!(!scene.renderer.backend().last_submission().iter().any(
            |command| matches!(command, Command::CopyTextureToBuffer { .. })
        ));
    }

    #[test]
    fn invalid_screenshot() {
        let mut scene = Scene::new(uvec2(64, 32));

        let path = env::temp_dir().join(format!(
            "lantern-invalid-screenshot-{}.png",
            process::id()
        ));

        scene.renderer.request_screenshot(
            ScreenshotRequest::new(&path).with_crop(uvec2(128, 8)),
        );

        let input = FrameInput::new(scene.camera, &scene.instances);

        assert!(scene.renderer.render(&input, &Default::default()).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn skips_unknown_meshes() {
        let mut scene = Scene::new(uvec2(64, 32));

        scene.instances.push(Instance::new(
            MeshHandle::new(7),
            Affine3A::IDENTITY,
        ));

        scene.render(&Default::default());

        assert_eq!(2, scene.renderer.accel().instances().len());
    }

    #[test]
    fn skips_stages_without_pipelines() {
        let mut scene = Scene::new(uvec2(64, 32));

        scene.renderer.shaders = ShaderLibrary::empty();

        scene.render(&Default::default());

        assert!(scene.dispatched().is_empty());
        assert_eq!(1, scene.renderer.backend().submissions().len());
    }

    #[test]
    #[should_panic(expected = "scene has no emissive primitives")]
    fn rejects_scenes_without_lights() {
        let mut scene = Scene::with_meshes(uvec2(64, 32), vec![wall()]);

        scene.render(&Default::default());
    }
}
