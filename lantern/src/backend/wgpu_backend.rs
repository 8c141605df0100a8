use std::ops::Range;
use std::sync::mpsc;
use std::time::Duration;

use fxhash::FxHashMap;
use log::{debug, info, warn};

use crate::{
    padded_bytes_per_row, Backend, BindingKind, BufferDesc, BufferFlags,
    Command, CommandList, Error, PassTiming, PipelineDesc, Resource,
    Resources, Result, ShaderId, ShaderLibrary, TextureDesc, TextureFormat,
    TextureRole,
};

/// Maximum number of timed passes per frame.
const MAX_TIMINGS: u32 = 256;

#[derive(Debug)]
pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
}

impl WgpuBuffer {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[derive(Debug)]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TextureDesc,
}

impl WgpuTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[derive(Debug)]
pub struct WgpuPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

#[derive(Debug)]
struct Timestamps {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    period: f32,
}

/// Backend running on an actual GPU, through wgpu.
///
/// Every dispatch gets its own compute pass, which provides barriers between
/// dependent dispatches for free.
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_groups: FxHashMap<(ShaderId, Vec<Resource>), wgpu::BindGroup>,
    bind_groups_generation: u64,
    in_flight: Option<wgpu::SubmissionIndex>,
    timestamps: Option<Timestamps>,
    in_flight_timings: Vec<String>,
    timings: Vec<PassTiming>,
}

impl WgpuBackend {
    /// Requests a headless adapter and device able to run Lantern's shaders.
    pub fn new(timings: bool) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            },
        ))
        .ok_or(Error::AdapterNotFound)?;

        info!("Using adapter: {:?}", adapter.get_info());

        let mut required_features = Self::required_features();

        if timings {
            if adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
                required_features |= wgpu::Features::TIMESTAMP_QUERY;
            } else {
                warn!("Adapter doesn't support timestamp queries");
            }
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lantern"),
                required_features,
                required_limits: Self::required_limits(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(Error::RequestDevice)?;

        Ok(Self::from_device(device, queue))
    }

    /// Wraps a device created by the host; it must have been requested with
    /// at least [`Self::required_features()`] and
    /// [`Self::required_limits()`].
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let timestamps = device
            .features()
            .contains(wgpu::Features::TIMESTAMP_QUERY)
            .then(|| Self::create_timestamps(&device, &queue));

        Self {
            device,
            queue,
            bind_groups: Default::default(),
            bind_groups_generation: u64::MAX,
            in_flight: None,
            timestamps,
            in_flight_timings: Default::default(),
            timings: Default::default(),
        }
    }

    pub fn required_features() -> wgpu::Features {
        wgpu::Features::PUSH_CONSTANTS
    }

    pub fn required_limits() -> wgpu::Limits {
        wgpu::Limits {
            max_push_constant_size: 128,
            max_storage_buffers_per_shader_stage: 24,
            max_storage_textures_per_shader_stage: 4,
            ..wgpu::Limits::default()
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn create_timestamps(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Timestamps {
        let size = 2 * MAX_TIMINGS as u64 * wgpu::QUERY_SIZE as u64;

        Timestamps {
            query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("lantern_timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: 2 * MAX_TIMINGS,
            }),
            resolve: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lantern_timestamps_resolve"),
                size,
                usage: wgpu::BufferUsages::QUERY_RESOLVE
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lantern_timestamps_readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            period: queue.get_timestamp_period(),
        }
    }

    fn buffer_usages(flags: BufferFlags) -> wgpu::BufferUsages {
        let mut usages =
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;

        if !flags.contains(BufferFlags::READBACK) {
            usages |= wgpu::BufferUsages::STORAGE;
        }

        if flags.contains(BufferFlags::INDIRECT) {
            usages |= wgpu::BufferUsages::INDIRECT;
        }

        usages
    }

    fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }

    fn texture_usages(role: TextureRole) -> wgpu::TextureUsages {
        match role {
            TextureRole::RenderTarget => {
                wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
            }
            TextureRole::Readable => {
                wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
            }
            TextureRole::ReadWrite => {
                wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST
            }
        }
    }

    fn binding_type(kind: BindingKind) -> wgpu::BindingType {
        match kind {
            BindingKind::StorageBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::StorageTexture(format) => {
                wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: Self::texture_format(format),
                    view_dimension: wgpu::TextureViewDimension::D2,
                }
            }
        }
    }

    fn invalidate_bind_groups(&mut self, resources: &Resources<Self>) {
        // Bind groups are keyed by resources, so switching slots around
        // doesn't invalidate them - only reallocations do
        let generation = resources.generation();

        if generation != self.bind_groups_generation {
            if !self.bind_groups.is_empty() {
                debug!("Resources changed; dropping cached bind groups");
            }

            self.bind_groups.clear();
            self.bind_groups_generation = generation;
        }
    }

    fn bind_group(
        &mut self,
        shader: ShaderId,
        bindings: &[(u32, Resource)],
        pipeline: &WgpuPipeline,
        resources: &Resources<Self>,
    ) -> &wgpu::BindGroup {
        let key = (
            shader,
            bindings.iter().map(|(_, resource)| *resource).collect(),
        );

        self.bind_groups.entry(key).or_insert_with(|| {
            let entries: Vec<_> = bindings
                .iter()
                .enumerate()
                .map(|(binding, (_, resource))| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: match *resource {
                        Resource::Buffer(handle) => resources
                            .buffer(handle)
                            .raw()
                            .buffer
                            .as_entire_binding(),
                        Resource::Texture(handle) => {
                            wgpu::BindingResource::TextureView(
                                &resources.texture(handle).raw().view,
                            )
                        }
                    },
                })
                .collect();

            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("lantern_{shader}_bind_group")),
                layout: &pipeline.bind_group_layout,
                entries: &entries,
            })
        })
    }

    fn wait(&mut self) {
        if let Some(idx) = self.in_flight.take() {
            self.device
                .poll(wgpu::Maintain::WaitForSubmissionIndex(idx));
        }
    }

    fn read_raw(&self, buffer: &wgpu::Buffer, range: Range<u64>) -> Vec<u8> {
        let slice = buffer.slice(range);
        let (tx, rx) = mpsc::channel();

        slice.map_async(wgpu::MapMode::Read, move |result| {
            _ = tx.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => (),
            Ok(Err(err)) => panic!("couldn't map buffer: {err}"),
            Err(_) => panic!("couldn't map buffer: callback was dropped"),
        }

        let bytes = slice.get_mapped_range().to_vec();

        buffer.unmap();
        bytes
    }

    fn collect_timings(&mut self) {
        let labels = std::mem::take(&mut self.in_flight_timings);

        let Some(timestamps) = &self.timestamps else {
            return;
        };

        if labels.is_empty() {
            return;
        }

        let size = 2 * labels.len() as u64 * wgpu::QUERY_SIZE as u64;
        let bytes = self.read_raw(&timestamps.readback, 0..size);
        let ticks: &[u64] = bytemuck::cast_slice(&bytes);

        self.timings = labels
            .into_iter()
            .zip(ticks.chunks_exact(2))
            .map(|(name, ticks)| {
                let nanos = ticks[1].saturating_sub(ticks[0]) as f64
                    * timestamps.period as f64;

                PassTiming {
                    name,
                    duration: Duration::from_nanos(nanos as u64),
                }
            })
            .collect();
    }
}

impl Backend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Pipeline = WgpuPipeline;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        data: Option<&[u8]>,
    ) -> Self::Buffer {
        // Writes must be multiples of four bytes
        let size = desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.name),
            size,
            usage: Self::buffer_usages(desc.flags),
            mapped_at_creation: false,
        });

        if let Some(data) = data {
            self.queue.write_buffer(&buffer, 0, &aligned(data));
        }

        WgpuBuffer { buffer }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Self::Texture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.name),
            size: wgpu::Extent3d {
                width: desc.size.x,
                height: desc.size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mips,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::texture_format(desc.format),
            usage: Self::texture_usages(desc.role),
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.name),
            mip_level_count: Some(1),
            ..Default::default()
        });

        WgpuTexture {
            texture,
            view,
            desc: desc.clone(),
        }
    }

    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(&buffer.buffer, offset, &aligned(data));
    }

    fn read_buffer(&mut self, buffer: &Self::Buffer) -> Vec<u8> {
        let size = buffer.buffer.size();

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lantern_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lantern_readback"),
            });

        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, size);
        self.queue.submit([encoder.finish()]);

        self.read_raw(&staging, 0..size)
    }

    fn begin_frame(&mut self) {
        self.wait();
        self.collect_timings();
    }

    fn submit(
        &mut self,
        list: CommandList,
        resources: &Resources<Self>,
        shaders: &ShaderLibrary<Self>,
    ) {
        self.invalidate_bind_groups(resources);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lantern_frame"),
            });

        let mut bound = None;
        let mut push_constants = Vec::new();
        let mut timing: Option<String> = None;
        let mut timing_labels = Vec::new();

        for command in list.into_commands() {
            match command {
                Command::Bind { shader, bindings } => {
                    bound = Some((shader, bindings));
                    push_constants.clear();
                }

                Command::PushConstants(bytes) => {
                    push_constants = bytes;
                }

                Command::Dispatch(_) | Command::DispatchIndirect { .. } => {
                    let Some((shader, bindings)) = &bound else {
                        panic!("dispatch recorded without a bound shader");
                    };

                    let Some(pipeline) = shaders.get(*shader) else {
                        continue;
                    };

                    let bind_group = self
                        .bind_group(*shader, bindings, pipeline, resources)
                        .clone();

                    let timestamp_writes = match (&self.timestamps, &timing)
                    {
                        (Some(timestamps), Some(label))
                            if (timing_labels.len() as u32) < MAX_TIMINGS =>
                        {
                            let idx = 2 * timing_labels.len() as u32;

                            timing_labels.push(label.clone());

                            Some(wgpu::ComputePassTimestampWrites {
                                query_set: &timestamps.query_set,
                                beginning_of_pass_write_index: Some(idx),
                                end_of_pass_write_index: Some(idx + 1),
                            })
                        }
                        _ => None,
                    };

                    timing = None;

                    let mut pass =
                        encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                            label: Some(shader.name()),
                            timestamp_writes,
                        });

                    pass.set_pipeline(&pipeline.pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);

                    if !push_constants.is_empty() {
                        pass.set_push_constants(0, &push_constants);
                    }

                    match command {
                        Command::Dispatch(size) => {
                            pass.dispatch_workgroups(size.x, size.y, size.z);
                        }
                        Command::DispatchIndirect { args, offset } => {
                            pass.dispatch_workgroups_indirect(
                                &resources.buffer(args).raw().buffer,
                                offset,
                            );
                        }
                        _ => unreachable!(),
                    }
                }

                // Compute passes are already ordered one after another
                Command::Barrier(_) => (),

                Command::CopyBuffer { src, dst } => {
                    resources.assert_copy(src, dst);

                    let src = resources.buffer(src);
                    let dst = resources.buffer(dst);

                    encoder.copy_buffer_to_buffer(
                        &src.raw().buffer,
                        0,
                        &dst.raw().buffer,
                        0,
                        src.size(),
                    );
                }

                Command::CopyTextureToBuffer { src, dst } => {
                    resources.assert_texture_copy(src, dst);

                    let texture = resources.texture(src).raw();
                    let size = texture.desc.size;

                    encoder.copy_texture_to_buffer(
                        wgpu::TexelCopyTextureInfo {
                            texture: &texture.texture,
                            mip_level: 0,
                            origin: wgpu::Origin3d::ZERO,
                            aspect: wgpu::TextureAspect::All,
                        },
                        wgpu::TexelCopyBufferInfo {
                            buffer: &resources.buffer(dst).raw().buffer,
                            layout: wgpu::TexelCopyBufferLayout {
                                offset: 0,
                                bytes_per_row: Some(padded_bytes_per_row(
                                    size.x,
                                    texture.desc.format,
                                )),
                                rows_per_image: Some(size.y),
                            },
                        },
                        wgpu::Extent3d {
                            width: size.x,
                            height: size.y,
                            depth_or_array_layers: 1,
                        },
                    );
                }

                Command::ClearBuffer(buffer) => {
                    encoder.clear_buffer(
                        &resources.buffer(buffer).raw().buffer,
                        0,
                        None,
                    );
                }

                Command::BeginTiming(label) => {
                    timing = Some(label);
                }

                Command::EndTiming => {
                    timing = None;
                }
            }
        }

        if let Some(timestamps) = &self.timestamps {
            if !timing_labels.is_empty() {
                let count = 2 * timing_labels.len() as u32;
                let size = count as u64 * wgpu::QUERY_SIZE as u64;

                encoder.resolve_query_set(
                    &timestamps.query_set,
                    0..count,
                    &timestamps.resolve,
                    0,
                );

                encoder.copy_buffer_to_buffer(
                    &timestamps.resolve,
                    0,
                    &timestamps.readback,
                    0,
                    size,
                );
            }
        }

        self.in_flight = Some(self.queue.submit([encoder.finish()]));
        self.in_flight_timings = timing_labels;
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<Self::Pipeline> {
        debug!("Initializing pipeline: {}:{}", desc.label, desc.entry_point);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module =
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(desc.label),
                    source: wgpu::util::make_spirv(desc.spirv),
                });

        let entries: Vec<_> = desc
            .bindings
            .iter()
            .enumerate()
            .map(|(binding, kind)| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: Self::binding_type(*kind),
                count: None,
            })
            .collect();

        let bind_group_layout = self.device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("lantern_{}_layout", desc.label)),
                entries: &entries,
            },
        );

        let push_constant_ranges = if desc.push_constants > 0 {
            vec![wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::COMPUTE,
                range: 0..desc.push_constants,
            }]
        } else {
            vec![]
        };

        let layout = self.device.create_pipeline_layout(
            &wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("lantern_{}_pipeline_layout", desc.label)),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &push_constant_ranges,
            },
        );

        let pipeline = self.device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some(&format!("lantern_{}_pipeline", desc.label)),
                layout: Some(&layout),
                module: &module,
                entry_point: Some(desc.entry_point),
                compilation_options: wgpu::PipelineCompilationOptions {
                    zero_initialize_workgroup_memory: false,
                    ..Default::default()
                },
                cache: None,
            },
        );

        if let Some(err) =
            pollster::block_on(self.device.pop_error_scope())
        {
            return Err(Error::ShaderCompile {
                entry: desc.entry_point.into(),
                message: err.to_string(),
            });
        }

        Ok(WgpuPipeline {
            pipeline,
            bind_group_layout,
        })
    }

    fn drain(&mut self) {
        self.device.poll(wgpu::Maintain::Wait);
        self.in_flight = None;
    }

    fn take_timings(&mut self) -> Vec<PassTiming> {
        std::mem::take(&mut self.timings)
    }
}

/// Pads data to a multiple of four bytes, as required by buffer writes.
fn aligned(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;

    if data.len() % align == 0 {
        data.into()
    } else {
        let mut data = data.to_vec();

        data.resize(data.len().next_multiple_of(align), 0);
        data.into()
    }
}
