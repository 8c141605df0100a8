//! Seam between the renderer and the actual GPU.
//!
//! Passes never talk to the device directly - they record [`Command`]s into a
//! [`CommandList`], which the backend then replays during
//! [`Backend::submit()`]; this way the very same frame can be executed on a
//! GPU (see [`WgpuBackend`]) or inspected by tests (see [`HeadlessBackend`]).

mod headless;
mod wgpu_backend;

use std::time::Duration;

use glam::{UVec2, UVec3};

pub use self::headless::*;
pub use self::wgpu_backend::*;
use crate::{
    BufferFlags, BufferHandle, BufferRoles, DescriptorTable, Resource,
    Resources, Result, ShaderId, ShaderLibrary, TextureHandle,
};

pub trait Backend: Sized {
    type Buffer;
    type Texture;
    type Pipeline;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        data: Option<&[u8]>,
    ) -> Self::Buffer;

    fn create_texture(&mut self, desc: &TextureDesc) -> Self::Texture;

    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    /// Reads buffer's contents back, blocking until they are available.
    fn read_buffer(&mut self, buffer: &Self::Buffer) -> Vec<u8>;

    /// Waits for the previous frame's work to complete.
    fn begin_frame(&mut self);

    fn command_list(&mut self) -> CommandList {
        CommandList::default()
    }

    fn submit(
        &mut self,
        list: CommandList,
        resources: &Resources<Self>,
        shaders: &ShaderLibrary<Self>,
    );

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<Self::Pipeline>;

    /// Waits for all of the submitted work to complete.
    fn drain(&mut self);

    /// Returns timings collected during the most recently completed frame.
    fn take_timings(&mut self) -> Vec<PassTiming>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDesc {
    pub name: String,
    pub size: u64,
    pub flags: BufferFlags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub name: String,
    pub size: UVec2,
    pub format: TextureFormat,
    pub mips: u32,
    pub role: TextureRole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba32Float,
}

impl TextureFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureRole {
    RenderTarget,
    Readable,
    ReadWrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    StorageBuffer,
    StorageTexture(TextureFormat),
}

#[derive(Clone, Copy, Debug)]
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    pub spirv: &'a [u8],
    pub entry_point: &'a str,
    pub bindings: &'a [BindingKind],
    pub push_constants: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassTiming {
    pub name: String,
    pub duration: Duration,
}

/// Alignment of rows when copying textures into buffers.
pub const COPY_ROW_ALIGNMENT: u32 = 256;

/// Returns the size of a single row when copying a texture of given width
/// into a buffer.
pub fn padded_bytes_per_row(width: u32, format: TextureFormat) -> u32 {
    let unpadded = width * format.bytes_per_texel();

    unpadded.div_ceil(COPY_ROW_ALIGNMENT) * COPY_ROW_ALIGNMENT
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Bind {
        shader: ShaderId,
        bindings: Vec<(u32, Resource)>,
    },
    PushConstants(Vec<u8>),
    Dispatch(UVec3),
    DispatchIndirect {
        args: BufferHandle,
        offset: u64,
    },
    Barrier(BufferRoles),
    CopyBuffer {
        src: BufferHandle,
        dst: BufferHandle,
    },
    CopyTextureToBuffer {
        src: TextureHandle,
        dst: BufferHandle,
    },
    ClearBuffer(BufferHandle),
    BeginTiming(String),
    EndTiming,
}

/// Recorded sequence of commands; see the module's docs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    /// Binds given shader together with resources currently occupying given
    /// slots; slots are resolved right away, so switching them afterwards
    /// doesn't affect this command.
    pub fn bind(
        &mut self,
        shader: ShaderId,
        table: &DescriptorTable,
        slots: &[u32],
    ) {
        let bindings = slots
            .iter()
            .map(|&slot| {
                let resource = table.get(slot).unwrap_or_else(|| {
                    panic!(
                        "shader `{}` binds slot {slot} (`{}`), which is empty",
                        shader.name(),
                        table.name(slot),
                    )
                });

                (slot, resource)
            })
            .collect();

        self.commands.push(Command::Bind { shader, bindings });
    }

    pub fn push_constants(&mut self, bytes: &[u8]) {
        self.commands.push(Command::PushConstants(bytes.to_vec()));
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(Command::Dispatch(UVec3::new(x, y, z)));
    }

    pub fn dispatch_indirect(&mut self, args: BufferHandle, offset: u64) {
        self.commands.push(Command::DispatchIndirect { args, offset });
    }

    pub fn barrier(&mut self, roles: BufferRoles) {
        self.commands.push(Command::Barrier(roles));
    }

    pub fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle) {
        self.commands.push(Command::CopyBuffer { src, dst });
    }

    pub fn copy_texture_to_buffer(
        &mut self,
        src: TextureHandle,
        dst: BufferHandle,
    ) {
        self.commands.push(Command::CopyTextureToBuffer { src, dst });
    }

    pub fn clear_buffer(&mut self, buffer: BufferHandle) {
        self.commands.push(Command::ClearBuffer(buffer));
    }

    pub fn begin_timing(&mut self, label: impl Into<String>) {
        self.commands.push(Command::BeginTiming(label.into()));
    }

    pub fn end_timing(&mut self) {
        self.commands.push(Command::EndTiming);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows() {
        assert_eq!(256, padded_bytes_per_row(1, TextureFormat::Rgba8Unorm));
        assert_eq!(256, padded_bytes_per_row(64, TextureFormat::Rgba8Unorm));
        assert_eq!(512, padded_bytes_per_row(65, TextureFormat::Rgba8Unorm));
        assert_eq!(
            1280 * 4,
            padded_bytes_per_row(1280, TextureFormat::Rgba8Unorm)
        );
    }
}
