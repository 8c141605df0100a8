//! Arena owning every GPU buffer and texture.
//!
//! Passes refer to resources through handles (stable indices into this
//! arena) and, on the GPU side, through slots of the [`DescriptorTable`].

mod descriptor_table;
mod double_buffered;

use std::fmt;

use bitflags::bitflags;
use derivative::Derivative;
use glam::UVec2;
use log::{debug, info};

pub use self::descriptor_table::*;
pub use self::double_buffered::*;
use crate::gpu;
use crate::{
    padded_bytes_per_row, Backend, BufferDesc, TextureDesc, TextureFormat,
    TextureRole,
};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        const CONSTANT = 1 << 0;
        const READ_ONLY = 1 << 1;
        const READ_WRITE = 1 << 2;

        /// Buffer can be a source or a destination of copies.
        const TRANSFER = 1 << 3;

        /// Buffer holds arguments of indirect dispatches.
        const INDIRECT = 1 << 4;

        /// Buffer lives in memory optimized for frequent CPU writes.
        const UPLOAD = 1 << 5;

        /// Buffer can be mapped and read back by the CPU.
        const READBACK = 1 << 6;

        /// Buffer gets reallocated whenever the window is resized.
        const TRACK_WINDOW_SIZE = 1 << 7;
    }
}

/// Describes how many elements a buffer holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sizing {
    Fixed(u32),

    /// One element per pixel.
    Screen,

    /// One element per texel of given bloom mip.
    BloomMip(u32),

    /// Enough bytes to hold a screen-sized texture of given format copied
    /// with padded rows.
    Readback(TextureFormat),
}

impl Sizing {
    pub fn count(self, screen: UVec2) -> u32 {
        match self {
            Sizing::Fixed(count) => count,
            Sizing::Screen => screen.x * screen.y,
            Sizing::BloomMip(mip) => {
                let size = gpu::bloom_mip_size(screen, mip);

                size.x * size.y
            }
            Sizing::Readback(format) => {
                padded_bytes_per_row(screen.x, format) * screen.y
            }
        }
    }

    pub fn tracks_window(self) -> bool {
        !matches!(self, Sizing::Fixed(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(u32);

impl BufferHandle {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(u32);

impl TextureHandle {
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    Buffer(BufferHandle),
    Texture(TextureHandle),
}

impl From<BufferHandle> for Resource {
    fn from(handle: BufferHandle) -> Self {
        Resource::Buffer(handle)
    }
}

impl From<TextureHandle> for Resource {
    fn from(handle: TextureHandle) -> Self {
        Resource::Texture(handle)
    }
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Buffer<B>
where
    B: Backend,
{
    #[derivative(Debug = "ignore")]
    raw: B::Buffer,
    name: String,
    stride: u32,
    count: u32,
    sizing: Sizing,
    flags: BufferFlags,
}

impl<B> Buffer<B>
where
    B: Backend,
{
    pub fn raw(&self) -> &B::Buffer {
        &self.raw
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn size(&self) -> u64 {
        (self.stride as u64) * (self.count as u64)
    }

    pub fn flags(&self) -> BufferFlags {
        self.flags
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureSpec {
    pub format: TextureFormat,
    pub mips: u32,
    pub role: TextureRole,

    /// Texture's size; ignored for textures that track the window's size.
    pub size: UVec2,

    pub tracks_window: bool,
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Texture<B>
where
    B: Backend,
{
    #[derivative(Debug = "ignore")]
    raw: B::Texture,
    desc: TextureDesc,
    tracks_window: bool,
}

impl<B> Texture<B>
where
    B: Backend,
{
    pub fn raw(&self) -> &B::Texture {
        &self.raw
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn size(&self) -> UVec2 {
        self.desc.size
    }
}

pub struct Resources<B>
where
    B: Backend,
{
    buffers: Vec<Buffer<B>>,
    textures: Vec<Texture<B>>,
    descriptors: DescriptorTable,
    samplers: SamplerTable,
    screen: UVec2,
    generation: u64,
}

impl<B> Resources<B>
where
    B: Backend,
{
    pub fn new(screen: UVec2) -> Self {
        Self {
            buffers: Default::default(),
            textures: Default::default(),
            descriptors: DescriptorTable::new(),
            samplers: SamplerTable::new(),
            screen,
            generation: 0,
        }
    }

    pub fn create_buffer(
        &mut self,
        backend: &mut B,
        data: Option<&[u8]>,
        stride: u32,
        sizing: Sizing,
        flags: BufferFlags,
        name: impl Into<String>,
    ) -> BufferHandle {
        let name = name.into();
        let count = sizing.count(self.screen);
        let (raw, flags) =
            Self::allocate(backend, data, &name, stride, count, sizing, flags);

        self.buffers.push(Buffer {
            raw,
            name,
            stride,
            count,
            sizing,
            flags,
        });

        self.generation += 1;

        BufferHandle((self.buffers.len() - 1) as u32)
    }

    /// Reallocates given buffer (e.g. because the scene it holds has
    /// changed), keeping its handle.
    pub fn recreate_buffer(
        &mut self,
        backend: &mut B,
        handle: BufferHandle,
        data: Option<&[u8]>,
        sizing: Sizing,
    ) {
        let screen = self.screen;
        let buffer = &mut self.buffers[handle.get()];
        let count = sizing.count(screen);

        let (raw, flags) = Self::allocate(
            backend,
            data,
            &buffer.name,
            buffer.stride,
            count,
            sizing,
            buffer.flags,
        );

        buffer.raw = raw;
        buffer.count = count;
        buffer.sizing = sizing;
        buffer.flags = flags;

        self.generation += 1;
    }

    fn allocate(
        backend: &mut B,
        data: Option<&[u8]>,
        name: &str,
        stride: u32,
        count: u32,
        sizing: Sizing,
        mut flags: BufferFlags,
    ) -> (B::Buffer, BufferFlags) {
        assert!(
            stride > 0 && count > 0,
            "buffer `{name}` must have at least one element",
        );

        let size = (stride as u64) * (count as u64);

        if let Some(data) = data {
            assert!(
                data.len() as u64 <= size,
                "buffer `{name}` is too small for its initial data ({} > {size})",
                data.len(),
            );
        }

        flags.set(BufferFlags::TRACK_WINDOW_SIZE, sizing.tracks_window());

        info!("Allocating buffer `{name}`; stride={stride}, count={count}");

        let desc = BufferDesc {
            name: name.to_owned(),
            size,
            flags,
        };

        (backend.create_buffer(&desc, data), flags)
    }

    pub fn create_texture(
        &mut self,
        backend: &mut B,
        spec: TextureSpec,
        name: impl Into<String>,
    ) -> TextureHandle {
        let desc = TextureDesc {
            name: name.into(),
            size: if spec.tracks_window {
                self.screen
            } else {
                spec.size
            },
            format: spec.format,
            mips: spec.mips.max(1),
            role: spec.role,
        };

        let raw = Self::allocate_texture(backend, &desc);

        self.textures.push(Texture {
            raw,
            desc,
            tracks_window: spec.tracks_window,
        });

        self.generation += 1;

        TextureHandle((self.textures.len() - 1) as u32)
    }

    fn allocate_texture(backend: &mut B, desc: &TextureDesc) -> B::Texture {
        assert!(
            desc.size.x > 0 && desc.size.y > 0,
            "texture `{}` must have non-zero size",
            desc.name,
        );

        info!(
            "Allocating texture `{}`; size={}x{}, format={:?}",
            desc.name, desc.size.x, desc.size.y, desc.format,
        );

        backend.create_texture(desc)
    }

    pub fn write_buffer(
        &self,
        backend: &mut B,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) {
        let buffer = self.buffer(handle);

        assert!(
            offset + data.len() as u64 <= buffer.size(),
            "write of {} bytes at {offset} overflows buffer `{}` ({} bytes)",
            data.len(),
            buffer.name,
            buffer.size(),
        );

        backend.write_buffer(&buffer.raw, offset, data);
    }

    pub fn read_buffer(
        &self,
        backend: &mut B,
        handle: BufferHandle,
    ) -> Vec<u8> {
        backend.read_buffer(&self.buffer(handle).raw)
    }

    pub fn buffer(&self, handle: BufferHandle) -> &Buffer<B> {
        &self.buffers[handle.get()]
    }

    pub fn texture(&self, handle: TextureHandle) -> &Texture<B> {
        &self.textures[handle.get()]
    }

    pub fn buffers(&self) -> impl Iterator<Item = (BufferHandle, &Buffer<B>)> {
        self.buffers
            .iter()
            .enumerate()
            .map(|(idx, buffer)| (BufferHandle(idx as u32), buffer))
    }

    pub fn textures(
        &self,
    ) -> impl Iterator<Item = (TextureHandle, &Texture<B>)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(idx, texture)| (TextureHandle(idx as u32), texture))
    }

    pub fn name(&self, resource: Resource) -> &str {
        match resource {
            Resource::Buffer(handle) => &self.buffer(handle).name,
            Resource::Texture(handle) => &self.texture(handle).desc.name,
        }
    }

    /// Appends given resource into the descriptor table, returning its slot.
    pub fn add(&mut self, resource: impl Into<Resource>) -> u32 {
        let resource = resource.into();
        let name = self.name(resource).to_owned();

        self.descriptors.add(resource, name)
    }

    /// Points given (already reserved or added) slot at another resource.
    pub fn switch(&mut self, resource: impl Into<Resource>, slot: u32) {
        let resource = resource.into();
        let name = self.name(resource).to_owned();

        self.descriptors.switch(resource, slot, name);
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn descriptors_mut(&mut self) -> &mut DescriptorTable {
        &mut self.descriptors
    }

    pub fn samplers(&self) -> &SamplerTable {
        &self.samplers
    }

    pub fn samplers_mut(&mut self) -> &mut SamplerTable {
        &mut self.samplers
    }

    pub fn screen(&self) -> UVec2 {
        self.screen
    }

    /// Counter bumped whenever any resource gets (re)allocated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reallocates every window-tracked resource for the new screen size and
    /// switches each of them back into the slots they occupied.
    ///
    /// Must be called only when the backend is idle.
    pub fn resize(&mut self, backend: &mut B, screen: UVec2) {
        assert!(screen.x > 0 && screen.y > 0, "screen must be non-empty");

        info!("Resizing resources: {}x{}", screen.x, screen.y);

        self.screen = screen;

        let mut resized = Vec::new();

        for (idx, buffer) in self.buffers.iter_mut().enumerate() {
            if !buffer.sizing.tracks_window() {
                continue;
            }

            let count = buffer.sizing.count(screen);

            let (raw, _) = Self::allocate(
                backend,
                None,
                &buffer.name,
                buffer.stride,
                count,
                buffer.sizing,
                buffer.flags,
            );

            buffer.raw = raw;
            buffer.count = count;
            resized.push(Resource::Buffer(BufferHandle(idx as u32)));
        }

        for (idx, texture) in self.textures.iter_mut().enumerate() {
            if !texture.tracks_window {
                continue;
            }

            texture.desc.size = screen;
            texture.raw = Self::allocate_texture(backend, &texture.desc);
            resized.push(Resource::Texture(TextureHandle(idx as u32)));
        }

        for resource in resized {
            let slots: Vec<_> = self.descriptors.slots_of(resource).collect();

            for slot in slots {
                debug!("Re-switching `{}` into slot {slot}", self.name(resource));

                self.switch(resource, slot);
            }
        }

        self.generation += 1;
    }

    /// Panics if `src` cannot be copied into `dst`.
    pub fn assert_copy(&self, src: BufferHandle, dst: BufferHandle) {
        let src = self.buffer(src);
        let dst = self.buffer(dst);

        assert_eq!(
            src.size(),
            dst.size(),
            "cannot copy buffer `{}` into `{}`: sizes differ",
            src.name,
            dst.name,
        );
    }

    /// Panics if `src` cannot be copied into `dst`.
    pub fn assert_texture_copy(&self, src: TextureHandle, dst: BufferHandle) {
        let src = self.texture(src);
        let dst = self.buffer(dst);
        let size = padded_bytes_per_row(src.desc.size.x, src.desc.format)
            as u64
            * src.desc.size.y as u64;

        assert!(
            dst.size() >= size,
            "cannot copy texture `{}` into `{}`: buffer is too small",
            src.desc.name,
            dst.name,
        );
    }
}

impl<B> fmt::Debug for Resources<B>
where
    B: Backend,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("buffers", &self.buffers.len())
            .field("textures", &self.textures.len())
            .field("descriptors", &self.descriptors.len())
            .field("screen", &self.screen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;
    use crate::HeadlessBackend;

    fn resources() -> (HeadlessBackend, Resources<HeadlessBackend>) {
        (HeadlessBackend::default(), Resources::new(uvec2(64, 32)))
    }

    #[test]
    fn sizing() {
        let screen = uvec2(64, 32);

        assert_eq!(10, Sizing::Fixed(10).count(screen));
        assert_eq!(64 * 32, Sizing::Screen.count(screen));
        assert_eq!(32 * 16, Sizing::BloomMip(0).count(screen));
        assert_eq!(16 * 8, Sizing::BloomMip(1).count(screen));
        assert_eq!(1, Sizing::BloomMip(11).count(screen));

        assert_eq!(
            256 * 32,
            Sizing::Readback(TextureFormat::Rgba8Unorm).count(screen),
        );

        assert!(!Sizing::Fixed(1).tracks_window());
        assert!(Sizing::Screen.tracks_window());
    }

    #[test]
    fn create_and_resize() {
        let (mut backend, mut resources) = resources();

        let fixed = resources.create_buffer(
            &mut backend,
            None,
            4,
            Sizing::Fixed(3),
            BufferFlags::READ_WRITE,
            "fixed",
        );

        let screen = resources.create_buffer(
            &mut backend,
            None,
            16,
            Sizing::Screen,
            BufferFlags::READ_WRITE,
            "screen",
        );

        resources.descriptors_mut().reserve_header();

        let fixed_slot = resources.add(fixed);
        let screen_slot = resources.add(screen);

        assert!(resources
            .buffer(screen)
            .flags()
            .contains(BufferFlags::TRACK_WINDOW_SIZE));

        assert!(!resources
            .buffer(fixed)
            .flags()
            .contains(BufferFlags::TRACK_WINDOW_SIZE));

        resources.resize(&mut backend, uvec2(8, 8));

        assert_eq!(3, resources.buffer(fixed).count());
        assert_eq!(64, resources.buffer(screen).count());
        assert_eq!(
            Some(Resource::from(fixed)),
            resources.descriptors().get(fixed_slot)
        );
        assert_eq!(
            Some(Resource::from(screen)),
            resources.descriptors().get(screen_slot)
        );
    }

    #[test]
    #[should_panic(expected = "must have at least one element")]
    fn zero_sized_buffer() {
        let (mut backend, mut resources) = resources();

        resources.create_buffer(
            &mut backend,
            None,
            4,
            Sizing::Fixed(0),
            BufferFlags::READ_WRITE,
            "empty",
        );
    }

    #[test]
    #[should_panic(expected = "sizes differ")]
    fn mismatched_copy() {
        let (mut backend, mut resources) = resources();

        let a = resources.create_buffer(
            &mut backend,
            None,
            4,
            Sizing::Fixed(4),
            BufferFlags::TRANSFER,
            "a",
        );

        let b = resources.create_buffer(
            &mut backend,
            None,
            4,
            Sizing::Fixed(5),
            BufferFlags::TRANSFER,
            "b",
        );

        resources.assert_copy(a, b);
    }
}
