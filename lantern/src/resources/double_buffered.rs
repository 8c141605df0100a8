use log::debug;

use crate::{Backend, BufferFlags, BufferHandle, Resources, Sizing};

/// Pair of buffers playing the roles of "current" and "previous" frame's data.
///
/// Roles are swapped by switching descriptor slots - the data is never copied
/// and the slots, which passes bind, stay the same.
#[derive(Clone, Debug)]
pub struct DoubleBuffered {
    a: BufferHandle,
    b: BufferHandle,
    alternate: bool,
    curr_slot: Option<u32>,
    prev_slot: Option<u32>,
}

impl DoubleBuffered {
    pub fn new<B>(
        backend: &mut B,
        resources: &mut Resources<B>,
        stride: u32,
        sizing: Sizing,
        flags: BufferFlags,
        name: &str,
    ) -> Self
    where
        B: Backend,
    {
        let mut create = |suffix| {
            resources.create_buffer(
                backend,
                None,
                stride,
                sizing,
                flags,
                format!("{name}_{suffix}"),
            )
        };

        Self {
            a: create("a"),
            b: create("b"),
            alternate: false,
            curr_slot: None,
            prev_slot: None,
        }
    }

    /// Adds both buffers into the descriptor table.
    pub fn register<B>(&mut self, resources: &mut Resources<B>)
    where
        B: Backend,
    {
        self.curr_slot = Some(resources.add(self.curr()));
        self.prev_slot = Some(resources.add(self.prev()));
    }

    pub fn curr(&self) -> BufferHandle {
        if self.alternate {
            self.b
        } else {
            self.a
        }
    }

    pub fn prev(&self) -> BufferHandle {
        if self.alternate {
            self.a
        } else {
            self.b
        }
    }

    pub fn curr_slot(&self) -> u32 {
        self.curr_slot.unwrap_or_else(|| {
            panic!("double-buffered pair hasn't been registered yet")
        })
    }

    pub fn prev_slot(&self) -> u32 {
        self.prev_slot.unwrap_or_else(|| {
            panic!("double-buffered pair hasn't been registered yet")
        })
    }

    pub fn swap<B>(&mut self, resources: &mut Resources<B>)
    where
        B: Backend,
    {
        self.alternate = !self.alternate;

        let (curr_slot, prev_slot) = (self.curr_slot(), self.prev_slot());

        debug!(
            "Swapping `{}` <-> `{}`",
            resources.name(self.curr().into()),
            resources.name(self.prev().into()),
        );

        resources.switch(self.curr(), curr_slot);
        resources.switch(self.prev(), prev_slot);
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;
    use crate::{HeadlessBackend, Resource};

    #[test]
    fn swap() {
        let mut backend = HeadlessBackend::default();
        let mut resources = Resources::new(uvec2(4, 4));

        let mut buffer = DoubleBuffered::new(
            &mut backend,
            &mut resources,
            16,
            Sizing::Screen,
            BufferFlags::READ_WRITE,
            "illumination",
        );

        buffer.register(&mut resources);

        let (curr_slot, prev_slot) = (buffer.curr_slot(), buffer.prev_slot());
        let (a, b) = (buffer.curr(), buffer.prev());

        buffer.swap(&mut resources);

        assert_eq!(curr_slot, buffer.curr_slot());
        assert_eq!(prev_slot, buffer.prev_slot());
        assert_eq!((b, a), (buffer.curr(), buffer.prev()));
        assert_eq!(Some(Resource::from(b)), resources.descriptors().get(curr_slot));
        assert_eq!(Some(Resource::from(a)), resources.descriptors().get(prev_slot));
        assert_eq!("illumination_b", resources.descriptors().name(curr_slot));

        buffer.swap(&mut resources);

        assert_eq!(Some(Resource::from(a)), resources.descriptors().get(curr_slot));
    }
}
