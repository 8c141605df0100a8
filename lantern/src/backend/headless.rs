use std::collections::HashSet;
use std::time::Duration;

use crate::{
    padded_bytes_per_row, Backend, BufferDesc, Command, CommandList, Error,
    PassTiming, PipelineDesc, Resources, Result, ShaderLibrary, TextureDesc,
};

/// Backend that doesn't execute any shaders, but keeps buffers in memory and
/// records everything submitted to it.
///
/// Buffers are allocated lazily (on the first write), so even screen-sized
/// resources of large windows stay cheap.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    buffers: Vec<Storage>,
    textures: Vec<Storage>,
    submissions: Vec<Vec<Command>>,
    timings: Vec<PassTiming>,
    failing_entry_points: HashSet<String>,
    frames: u32,
    drains: u32,
}

#[derive(Debug)]
struct Storage {
    size: usize,
    data: Option<Vec<u8>>,
}

impl Storage {
    fn new(size: usize) -> Self {
        Self { size, data: None }
    }

    fn bytes(&self) -> Vec<u8> {
        self.data.clone().unwrap_or_else(|| vec![0; self.size])
    }

    fn bytes_mut(&mut self) -> &mut Vec<u8> {
        let size = self.size;

        self.data.get_or_insert_with(|| vec![0; size])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessBuffer {
    id: usize,
    size: u64,
}

impl HeadlessBuffer {
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadlessTexture {
    id: usize,
    desc: TextureDesc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadlessPipeline {
    pub entry_point: String,
}

impl HeadlessBackend {
    /// Makes `create_pipeline()` fail for given entry point.
    pub fn fail_pipeline(&mut self, entry_point: impl Into<String>) {
        self.failing_entry_points.insert(entry_point.into());
    }

    /// Makes `create_pipeline()` succeed again for all entry points.
    pub fn heal_pipelines(&mut self) {
        self.failing_entry_points.clear();
    }

    pub fn submissions(&self) -> &[Vec<Command>] {
        &self.submissions
    }

    pub fn last_submission(&self) -> &[Command] {
        self.submissions.last().map(|cmds| cmds.as_slice()).unwrap_or(&[])
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn drains(&self) -> u32 {
        self.drains
    }

    /// Returns bytes of a buffer, bypassing [`Backend::read_buffer()`].
    pub fn buffer_data(&self, buffer: &HeadlessBuffer) -> Vec<u8> {
        self.buffers[buffer.id].bytes()
    }
}

impl Backend for HeadlessBackend {
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;
    type Pipeline = HeadlessPipeline;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        data: Option<&[u8]>,
    ) -> Self::Buffer {
        let mut storage = Storage::new(desc.size as usize);

        if let Some(data) = data {
            storage.bytes_mut()[..data.len()].copy_from_slice(data);
        }

        self.buffers.push(storage);

        HeadlessBuffer {
            id: self.buffers.len() - 1,
            size: desc.size,
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Self::Texture {
        let size = (desc.size.x * desc.size.y * desc.format.bytes_per_texel())
            as usize;

        self.textures.push(Storage::new(size));

        HeadlessTexture {
            id: self.textures.len() - 1,
            desc: desc.clone(),
        }
    }

    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]) {
        let offset = offset as usize;

        self.buffers[buffer.id].bytes_mut()[offset..offset + data.len()]
            .copy_from_slice(data);
    }

    fn read_buffer(&mut self, buffer: &Self::Buffer) -> Vec<u8> {
        self.buffers[buffer.id].bytes()
    }

    fn begin_frame(&mut self) {
        self.frames += 1;
    }

    fn submit(
        &mut self,
        list: CommandList,
        resources: &Resources<Self>,
        _: &ShaderLibrary<Self>,
    ) {
        let commands = list.into_commands();
        let mut timing_labels = Vec::new();

        for command in &commands {
            match command {
                Command::CopyBuffer { src, dst } => {
                    resources.assert_copy(*src, *dst);

                    let src = self.buffers[resources.buffer(*src).raw().id]
                        .bytes();

                    *self.buffers[resources.buffer(*dst).raw().id]
                        .bytes_mut() = src;
                }

                Command::CopyTextureToBuffer { src, dst } => {
                    resources.assert_texture_copy(*src, *dst);

                    let texture = resources.texture(*src).raw();
                    let texels = self.textures[texture.id].bytes();
                    let size = texture.desc.size;
                    let row = (size.x * texture.desc.format.bytes_per_texel())
                        as usize;
                    let padded_row =
                        padded_bytes_per_row(size.x, texture.desc.format)
                            as usize;

                    let dst =
                        self.buffers[resources.buffer(*dst).raw().id]
                            .bytes_mut();

                    for y in 0..(size.y as usize) {
                        dst[y * padded_row..y * padded_row + row]
                            .copy_from_slice(&texels[y * row..(y + 1) * row]);
                    }
                }

                Command::ClearBuffer(buffer) => {
                    self.buffers[resources.buffer(*buffer).raw().id].data =
                        None;
                }

                Command::BeginTiming(label) => {
                    timing_labels.push(label.clone());
                }

                Command::EndTiming => {
                    if let Some(name) = timing_labels.pop() {
                        self.timings.push(PassTiming {
                            name,
                            duration: Duration::ZERO,
                        });
                    }
                }

                _ => (),
            }
        }

        self.submissions.push(commands);
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<Self::Pipeline> {
        if self.failing_entry_points.contains(desc.entry_point) {
            return Err(Error::ShaderCompile {
                entry: desc.entry_point.into(),
                message: "rejected by headless backend".into(),
            });
        }

        Ok(HeadlessPipeline {
            entry_point: desc.entry_point.into(),
        })
    }

    fn drain(&mut self) {
        self.drains += 1;
    }

    fn take_timings(&mut self) -> Vec<PassTiming> {
        std::mem::take(&mut self.timings)
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;
    use crate::{BufferFlags, Sizing};

    #[test]
    fn buffers() {
        let mut backend = HeadlessBackend::default();
        let mut resources = Resources::new(uvec2(4, 4));

        let a = resources.create_buffer(
            &mut backend,
            Some(&[1, 2, 3, 4]),
            4,
            Sizing::Fixed(2),
            BufferFlags::TRANSFER,
            "a",
        );

        let b = resources.create_buffer(
            &mut backend,
            None,
            4,
            Sizing::Fixed(2),
            BufferFlags::TRANSFER,
            "b",
        );

        assert_eq!(
            vec![1, 2, 3, 4, 0, 0, 0, 0],
            resources.read_buffer(&mut backend, a)
        );

        resources.write_buffer(&mut backend, a, 6, &[9, 9]);

        let mut list = backend.command_list();

        list.copy_buffer(a, b);
        list.clear_buffer(a);

        let shaders = ShaderLibrary::empty();

        backend.submit(list, &resources, &shaders);

        assert_eq!(
            vec![1, 2, 3, 4, 0, 0, 9, 9],
            resources.read_buffer(&mut backend, b)
        );

        assert_eq!(vec![0; 8], resources.read_buffer(&mut backend, a));
        assert_eq!(1, backend.submissions().len());
    }
}
