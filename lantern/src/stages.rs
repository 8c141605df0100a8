//! Per-frame list of compute dispatches, with their data dependencies made
//! explicit so that ordering mistakes are caught before anything reaches the
//! GPU.

use bitflags::bitflags;
use bytemuck::Pod;
use glam::{uvec3, UVec2, UVec3};
use log::debug;

use crate::{
    gpu, Backend, BufferHandle, CommandList, DescriptorTable, ShaderId,
    ShaderLibrary,
};

bitflags! {
    /// Roles buffers play within a frame; stages declare which of them they
    /// read and write.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BufferRoles: u64 {
        const CAMERAS = 1 << 0;
        const SCENE = 1 << 1;
        const LIGHTS = 1 << 2;
        const SKY = 1 << 3;
        const BLUE_NOISE = 1 << 4;

        const COUNTERS = 1 << 5;
        const DISPATCH_ARGS = 1 << 6;
        const RAYS = 1 << 7;
        const HITS = 1 << 8;
        const SHADOW_RAYS = 1 << 9;
        const SURFACES = 1 << 10;
        const RADIANCE = 1 << 11;

        /// Normals, depths, ids, motion vectors etc. of primary hits.
        const GBUFFER = 1 << 12;

        const PREV_GBUFFER = 1 << 13;
        const RESERVOIRS = 1 << 14;
        const PREV_RESERVOIRS = 1 << 15;
        const RESERVOIR_SCRATCH = 1 << 16;

        /// Demodulated illumination, together with its moments and history
        /// length.
        const ILLUMINATION = 1 << 17;

        const PREV_ILLUMINATION = 1 << 18;
        const WEIGHTED = 1 << 19;
        const ATROUS = 1 << 20;

        /// Frame's final, HDR radiance.
        const FINAL = 1 << 21;

        const BLOOM = 1 << 22;
        const OUTPUT = 1 << 23;

        /// Inputs provided from outside of the frame's schedule: uploaded by
        /// the CPU or left over from the previous frame.
        const EXTERNAL = Self::CAMERAS.bits()
            | Self::SCENE.bits()
            | Self::LIGHTS.bits()
            | Self::SKY.bits()
            | Self::BLUE_NOISE.bits()
            | Self::PREV_GBUFFER.bits()
            | Self::PREV_RESERVOIRS.bits()
            | Self::PREV_ILLUMINATION.bits();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Fixed number of workgroups.
    Grid(UVec3),

    /// Number of workgroups read from a buffer at given offset.
    Indirect { args: BufferHandle, offset: u64 },
}

/// Single compute dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    name: String,
    shader: ShaderId,
    reads: BufferRoles,
    writes: BufferRoles,
    slots: Vec<u32>,
    params: Vec<u8>,
    dispatch: Dispatch,
}

impl Stage {
    pub fn new(name: impl Into<String>, shader: ShaderId) -> Self {
        Self {
            name: name.into(),
            shader,
            reads: BufferRoles::empty(),
            writes: BufferRoles::empty(),
            slots: Vec::new(),
            params: Vec::new(),
            dispatch: Dispatch::Grid(UVec3::ONE),
        }
    }

    pub fn reads(mut self, roles: BufferRoles) -> Self {
        self.reads |= roles;
        self
    }

    pub fn writes(mut self, roles: BufferRoles) -> Self {
        self.writes |= roles;
        self
    }

    /// Binds given descriptor slots, in order, to the shader's bindings.
    pub fn bind(mut self, slots: impl IntoIterator<Item = u32>) -> Self {
        self.slots.extend(slots);
        self
    }

    pub fn params<P>(mut self, params: &P) -> Self
    where
        P: Pod,
    {
        self.params = bytemuck::bytes_of(params).to_vec();
        self
    }

    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Dispatches one thread per pixel of a surface of given size.
    pub fn per_pixel(self, size: UVec2) -> Self {
        let groups = gpu::WORKGROUP_SIZE_2D;

        self.dispatch(Dispatch::Grid(uvec3(
            gpu::div_ceil(size.x, groups),
            gpu::div_ceil(size.y, groups),
            1,
        )))
    }

    pub fn indirect(self, args: BufferHandle, offset: u64) -> Self {
        self.dispatch(Dispatch::Indirect { args, offset })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    pub fn read_roles(&self) -> BufferRoles {
        self.reads
    }

    pub fn write_roles(&self) -> BufferRoles {
        self.writes
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn get_dispatch(&self) -> Dispatch {
        self.dispatch
    }
}

/// Ordered list of stages making up a frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageSchedule {
    stages: Vec<Stage>,
}

impl StageSchedule {
    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Panics if any stage reads something that hasn't been produced yet or
    /// if the passes are ordered in a way the kernels don't expect.
    pub fn validate(&self) {
        let mut written = BufferRoles::EXTERNAL;

        for stage in &self.stages {
            assert_eq!(
                stage.slots.len(),
                stage.shader.binding_count(),
                "stage `{}` binds {} slots, but its shader expects {}",
                stage.name,
                stage.slots.len(),
                stage.shader.binding_count(),
            );

            let (_, push_constants) = stage.shader.layout();

            assert_eq!(
                stage.params.len() as u32,
                push_constants,
                "stage `{}` pushes {} bytes of constants, but its shader \
                 expects {push_constants}",
                stage.name,
                stage.params.len(),
            );

            let missing = stage.reads - written;

            assert!(
                missing.is_empty(),
                "stage `{}` reads {missing:?}, which no earlier stage writes",
                stage.name,
            );

            written |= stage.writes;
        }

        self.validate_wavefront();
        self.validate_denoiser();
        self.validate_post();
    }

    fn positions(&self, shader: ShaderId) -> Vec<usize> {
        self.stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| stage.shader == shader)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn assert_before(&self, a: ShaderId, b: ShaderId) {
        let a_pos = self.positions(a);
        let b_pos = self.positions(b);

        if let (Some(a_last), Some(b_first)) = (a_pos.last(), b_pos.first()) {
            assert!(
                a_last < b_first,
                "`{a}` must run before `{b}` (found `{}` at #{b_first})",
                self.stages[*b_first].name,
            );
        }
    }

    fn validate_wavefront(&self) {
        use ShaderId::*;

        let wavefront: Vec<_> = self
            .stages
            .iter()
            .filter(|stage| stage.shader.name().starts_with("wavefront_"))
            .map(|stage| stage.shader)
            .collect();

        if wavefront.is_empty() {
            return;
        }

        assert_eq!(
            Some(&WavefrontGenerate),
            wavefront.first(),
            "wavefront must start with `{WavefrontGenerate}`",
        );

        for pair in wavefront.windows(2) {
            let expected: &[ShaderId] = match pair[0] {
                WavefrontGenerate | WavefrontConnect => {
                    &[WavefrontExtend, WavefrontFinalize]
                }
                WavefrontExtend => &[WavefrontShade],
                WavefrontShade => &[WavefrontDirectIllumination],
                WavefrontDirectIllumination => &[WavefrontCompact],
                WavefrontCompact => &[WavefrontConnect],
                _ => &[],
            };

            assert!(
                expected.contains(&pair[1]),
                "`{}` cannot follow `{}` in the wavefront",
                pair[1],
                pair[0],
            );
        }

        assert_eq!(
            Some(&WavefrontFinalize),
            wavefront.last(),
            "wavefront must end with `{WavefrontFinalize}`",
        );

        // Resampling happens on the primary bounce only, right after its
        // candidates have been generated
        let first_di =
            self.positions(WavefrontDirectIllumination).first().copied();

        let first_compact =
            self.positions(WavefrontCompact).first().copied();

        for shader in [RestirTemporal, RestirSpatial, RestirShade] {
            for pos in self.positions(shader) {
                assert!(
                    first_di.is_some_and(|di| di < pos)
                        && first_compact.is_some_and(|compact| pos < compact),
                    "`{shader}` must run between the primary bounce's \
                     direct illumination and compaction",
                );
            }
        }

        self.assert_before(RestirTemporal, RestirSpatial);
        self.assert_before(RestirSpatial, RestirShade);
        self.assert_before(RestirTemporal, RestirShade);
    }

    fn validate_denoiser(&self) {
        use ShaderId::*;

        let has_weights = !self.positions(DenoiseWeights).is_empty();
        let has_atrous = !self.positions(DenoiseAtrous).is_empty();
        let has_modulate = !self.positions(DenoiseModulate).is_empty();
        let has_reproject = !self.positions(DenoiseReproject).is_empty();

        if (has_weights || has_atrous || has_modulate) && !has_reproject {
            panic!("denoiser's passes require `{DenoiseReproject}` first");
        }

        if has_atrous {
            assert!(
                has_weights,
                "`{DenoiseAtrous}` requires `{DenoiseWeights}`",
            );
        }

        self.assert_before(WavefrontFinalize, DenoiseReproject);
        self.assert_before(DenoiseReproject, DenoiseWeights);
        self.assert_before(DenoiseWeights, DenoiseAtrous);
        self.assert_before(DenoiseAtrous, DenoiseModulate);
        self.assert_before(DenoiseReproject, DenoiseModulate);
        self.assert_before(DenoiseWeights, DenoiseModulate);

        let atrous = self.positions(DenoiseAtrous);

        assert!(
            atrous.windows(2).all(|pair| pair[0] + 1 == pair[1]),
            "`{DenoiseAtrous}` iterations must run back-to-back",
        );
    }

    fn validate_post(&self) {
        use ShaderId::*;

        self.assert_before(BloomDownsample, BloomUpsample);
        self.assert_before(DenoiseModulate, BloomDownsample);
        self.assert_before(BloomUpsample, Tonemap);
        self.assert_before(WavefrontFinalize, Tonemap);
        self.assert_before(Preview, Tonemap);

        assert!(
            self.positions(Tonemap).len() <= 1,
            "`{Tonemap}` must run at most once",
        );
    }

    /// Records every stage into given command list, inserting barriers
    /// between stages that depend on each other.
    ///
    /// Stages whose shaders have no valid pipeline are skipped.
    pub fn record<B>(
        &self,
        list: &mut CommandList,
        descriptors: &DescriptorTable,
        shaders: &mut ShaderLibrary<B>,
        timings: bool,
    ) where
        B: Backend,
    {
        // Writes not yet made visible by any barrier
        let mut pending = BufferRoles::empty();

        for stage in &self.stages {
            if !shaders.is_available(stage.shader) {
                continue;
            }

            let hazard = (stage.reads | stage.writes) & pending;

            if !hazard.is_empty() {
                list.barrier(hazard);
                pending = BufferRoles::empty();
            }

            if timings {
                list.begin_timing(stage.name.clone());
            }

            list.bind(stage.shader, descriptors, &stage.slots);

            if !stage.params.is_empty() {
                list.push_constants(&stage.params);
            }

            match stage.dispatch {
                Dispatch::Grid(size) => {
                    list.dispatch(size.x, size.y, size.z);
                }
                Dispatch::Indirect { args, offset } => {
                    list.dispatch_indirect(args, offset);
                }
            }

            if timings {
                list.end_timing();
            }

            pending |= stage.writes;
        }

        debug!("Recorded {} stages", self.stages.len());
    }
}
