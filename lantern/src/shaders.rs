//! Compiled kernels, loaded from the directory `lantern-shader-builder`
//! writes them into.
//!
//! Pipelines are kept around as "last known good": a reload that fails to
//! compile a shader keeps using the previous pipeline, and a pass whose
//! shader never compiled is skipped.

use std::mem;
use std::path::{Path, PathBuf};
use std::{fmt, fs};

use fxhash::{FxHashMap, FxHashSet};
use log::{debug, error, info, warn};

use crate::{
    gpu, Backend, BindingKind, Error, PipelineDesc, Result, TextureFormat,
};

/// Name of the file listing compiled shaders, one per line:
/// `<shader-id> <entry-point> <file-name>`.
pub const MANIFEST: &str = "manifest.txt";

macro_rules! shaders {
    ([ $( $id:ident => $name:literal, )* ]) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ShaderId {
            $( $id, )*
        }

        impl ShaderId {
            pub const ALL: &'static [ShaderId] = &[ $( ShaderId::$id, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( ShaderId::$id => $name, )*
                }
            }

            /// Entry point of this shader within `lantern-shaders`.
            pub fn entry_point(self) -> &'static str {
                match self {
                    $( ShaderId::$id => concat!($name, "::main"), )*
                }
            }
        }
    };
}

shaders!([
    WavefrontGenerate => "wavefront_generate",
    WavefrontExtend => "wavefront_extend",
    WavefrontShade => "wavefront_shade",
    WavefrontDirectIllumination => "wavefront_direct_illumination",
    WavefrontCompact => "wavefront_compact",
    WavefrontConnect => "wavefront_connect",
    WavefrontFinalize => "wavefront_finalize",
    RestirTemporal => "restir_temporal",
    RestirSpatial => "restir_spatial",
    RestirShade => "restir_shade",
    DenoiseReproject => "denoise_reproject",
    DenoiseWeights => "denoise_weights",
    DenoiseAtrous => "denoise_atrous",
    DenoiseModulate => "denoise_modulate",
    BloomDownsample => "bloom_downsample",
    BloomUpsample => "bloom_upsample",
    Tonemap => "tonemap",
    Preview => "preview",
]);

impl ShaderId {
    /// Returns kinds of shader's bindings (all in descriptor set 0) and size
    /// of its push constants.
    pub fn layout(self) -> (Vec<BindingKind>, u32) {
        fn params<P>() -> u32 {
            mem::size_of::<P>() as u32
        }

        let (buffers, push_constants) = match self {
            ShaderId::WavefrontGenerate => {
                (11, params::<gpu::GeneratePassParams>())
            }
            ShaderId::WavefrontExtend => (10, 0),
            ShaderId::WavefrontShade => (22, params::<gpu::BouncePassParams>()),
            ShaderId::WavefrontDirectIllumination => {
                (12, params::<gpu::BouncePassParams>())
            }
            ShaderId::WavefrontCompact => (2, 0),
            ShaderId::WavefrontConnect => (10, 0),
            ShaderId::WavefrontFinalize => {
                (8, params::<gpu::FinalizePassParams>())
            }
            ShaderId::RestirTemporal => (19, params::<gpu::RestirPassParams>()),
            ShaderId::RestirSpatial => (15, params::<gpu::RestirPassParams>()),
            ShaderId::RestirShade => (14, 0),
            ShaderId::DenoiseReproject => {
                (14, params::<gpu::ReprojectPassParams>())
            }
            ShaderId::DenoiseWeights => (8, params::<gpu::WeightsPassParams>()),
            ShaderId::DenoiseAtrous => (7, params::<gpu::AtrousPassParams>()),
            ShaderId::DenoiseModulate => {
                (5, params::<gpu::ModulatePassParams>())
            }
            ShaderId::BloomDownsample | ShaderId::BloomUpsample => {
                (2, params::<gpu::BloomPassParams>())
            }
            ShaderId::Tonemap => (3, params::<gpu::TonemapPassParams>()),
            ShaderId::Preview => (10, params::<gpu::PreviewPassParams>()),
        };

        let mut bindings = vec![BindingKind::StorageBuffer; buffers];

        if self == ShaderId::Tonemap {
            bindings
                .push(BindingKind::StorageTexture(TextureFormat::Rgba8Unorm));
        }

        (bindings, push_constants)
    }

    /// Number of bindings this shader expects.
    pub fn binding_count(self) -> usize {
        self.layout().0.len()
    }
}

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ManifestEntry {
    entry_point: String,
    file: PathBuf,
}

fn parse_manifest(
    dir: &Path,
    manifest: &str,
) -> FxHashMap<String, ManifestEntry> {
    manifest
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let (Some(id), Some(entry_point), Some(file)) =
                (parts.next(), parts.next(), parts.next())
            else {
                warn!("Ignoring malformed manifest line: `{line}`");
                return None;
            };

            Some((
                id.to_owned(),
                ManifestEntry {
                    entry_point: entry_point.to_owned(),
                    file: dir.join(file),
                },
            ))
        })
        .collect()
}

pub struct ShaderLibrary<B>
where
    B: Backend,
{
    dir: Option<PathBuf>,
    pipelines: FxHashMap<ShaderId, B::Pipeline>,
    warned: FxHashSet<ShaderId>,
}

impl<B> ShaderLibrary<B>
where
    B: Backend,
{
    /// Creates a library without any pipelines; every pass gets skipped.
    pub fn empty() -> Self {
        Self {
            dir: None,
            pipelines: Default::default(),
            warned: Default::default(),
        }
    }

    /// Loads shaders from given directory.
    ///
    /// Fails only when the manifest itself cannot be read; shaders that are
    /// missing or don't compile get logged and their passes skipped.
    pub fn new(backend: &mut B, dir: impl Into<PathBuf>) -> Result<Self> {
        let mut this = Self {
            dir: Some(dir.into()),
            ..Self::empty()
        };

        this.reload(backend)?;

        Ok(this)
    }

    /// Recompiles every shader, keeping previous pipelines of shaders that
    /// fail to compile.
    ///
    /// Returns the number of shaders that failed.
    pub fn reload(&mut self, backend: &mut B) -> Result<usize> {
        let Some(dir) = self.dir.clone() else {
            return Ok(0);
        };

        info!("Loading shaders from `{}`", dir.display());

        let manifest = fs::read_to_string(dir.join(MANIFEST))?;
        let manifest = parse_manifest(&dir, &manifest);
        let mut failed = 0;

        for &id in ShaderId::ALL {
            match Self::compile(backend, &manifest, id) {
                Ok(pipeline) => {
                    debug!("Shader `{id}` compiled");

                    self.pipelines.insert(id, pipeline);
                    self.warned.remove(&id);
                }

                Err(err) => {
                    failed += 1;

                    if self.pipelines.contains_key(&id) {
                        error!("{err}; keeping the previous pipeline");
                    } else {
                        error!("{err}");
                    }
                }
            }
        }

        Ok(failed)
    }

    fn compile(
        backend: &mut B,
        manifest: &FxHashMap<String, ManifestEntry>,
        id: ShaderId,
    ) -> Result<B::Pipeline> {
        let entry = manifest
            .get(id.name())
            .ok_or_else(|| Error::ShaderNotFound(id.name().into()))?;

        let spirv = fs::read(&entry.file)?;
        let (bindings, push_constants) = id.layout();

        backend.create_pipeline(&PipelineDesc {
            label: id.name(),
            spirv: &spirv,
            entry_point: &entry.entry_point,
            bindings: &bindings,
            push_constants,
        })
    }

    /// Installs a pipeline directly, bypassing the manifest.
    pub fn insert(&mut self, id: ShaderId, pipeline: B::Pipeline) {
        self.pipelines.insert(id, pipeline);
        self.warned.remove(&id);
    }

    pub fn get(&self, id: ShaderId) -> Option<&B::Pipeline> {
        self.pipelines.get(&id)
    }

    /// Returns whether given shader can be dispatched, warning (once) if it
    /// cannot.
    pub fn is_available(&mut self, id: ShaderId) -> bool {
        if self.pipelines.contains_key(&id) {
            return true;
        }

        if self.warned.insert(id) {
            warn!("Shader `{id}` has no valid pipeline; skipping its pass");
        }

        false
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl<B> fmt::Debug for ShaderLibrary<B>
where
    B: Backend,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderLibrary")
            .field("dir", &self.dir)
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}
