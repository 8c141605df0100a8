use std::ops::Range;

use log::{debug, warn};

use crate::Resource;

/// Slots reserved at the beginning of the descriptor table.
pub mod slots {
    pub const TRANSFER: u32 = 0;
    pub const SKYBOX: u32 = 1;
    pub const LIGHTS: u32 = 2;
    pub const TRANSFORMS: u32 = 3;
    pub const MODELS: u32 = 4;
    pub const OUTPUT: u32 = 5;
    pub const BLOOM: u32 = 6;
    pub const BLUE_NOISE: u32 = BLOOM + crate::gpu::NUM_BLOOM_MIPS;
    pub const HEADER_LEN: u32 = BLUE_NOISE + 1;
}

pub const EMPTY_SLOT_NAME: &str = "reserved slot, currently empty";

#[derive(Clone, Debug, PartialEq, Eq)]
struct Descriptor {
    resource: Option<Resource>,
    name: String,
}

impl Descriptor {
    fn empty() -> Self {
        Self {
            resource: None,
            name: EMPTY_SLOT_NAME.into(),
        }
    }
}

/// Append-only, bindless table of resources; once given out, a slot never
/// changes its number, but it can be switched to point at another resource.
#[derive(Clone, Debug)]
pub struct DescriptorTable {
    descriptors: Vec<Descriptor>,
    capacity: usize,
    generation: u64,
}

impl DescriptorTable {
    pub const CAPACITY: usize = 65_536;

    pub fn new() -> Self {
        Self::with_capacity(Self::CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::new(),
            capacity,
            generation: 0,
        }
    }

    /// Appends a resource, returning its slot.
    pub fn add(&mut self, resource: Resource, name: impl Into<String>) -> u32 {
        self.grow(1);

        let name = name.into();
        let slot = (self.descriptors.len() - 1) as u32;

        debug!("Adding `{name}` at slot {slot}");

        self.descriptors[slot as usize] = Descriptor {
            resource: Some(resource),
            name,
        };

        slot
    }

    /// Points an already existing slot at another resource.
    pub fn switch(
        &mut self,
        resource: Resource,
        slot: u32,
        name: impl Into<String>,
    ) {
        assert!(
            (slot as usize) < self.descriptors.len(),
            "cannot switch slot {slot}: it has been neither reserved nor added \
             (table has {} slots)",
            self.descriptors.len(),
        );

        let descriptor = &mut self.descriptors[slot as usize];

        descriptor.resource = Some(resource);
        descriptor.name = name.into();
        self.generation += 1;
    }

    /// Appends `n` empty slots, returning their range.
    pub fn reserve(&mut self, n: u32) -> Range<u32> {
        if !self.descriptors.is_empty() {
            warn!(
                "Reserving {n} slots in a table that's already used ({} slots)",
                self.descriptors.len(),
            );
        }

        let start = self.descriptors.len() as u32;

        self.grow(n as usize);

        start..(start + n)
    }

    /// Clears the table and reserves its header (see [`slots`]).
    pub fn reserve_header(&mut self) {
        self.clear();
        self.reserve(slots::HEADER_LEN);
    }

    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.generation += 1;
    }

    fn grow(&mut self, n: usize) {
        let len = self.descriptors.len() + n;

        assert!(
            len <= self.capacity,
            "descriptor table overflow: {len} slots requested, capacity is {}",
            self.capacity,
        );

        self.descriptors.resize(len, Descriptor::empty());
        self.generation += 1;
    }

    pub fn get(&self, slot: u32) -> Option<Resource> {
        self.descriptors.get(slot as usize)?.resource
    }

    pub fn name(&self, slot: u32) -> &str {
        self.descriptors
            .get(slot as usize)
            .map(|descriptor| descriptor.name.as_str())
            .unwrap_or(EMPTY_SLOT_NAME)
    }

    /// Returns all slots that currently point at given resource.
    pub fn slots_of(
        &self,
        resource: Resource,
    ) -> impl Iterator<Item = u32> + '_ {
        self.descriptors
            .iter()
            .enumerate()
            .filter(move |(_, descriptor)| {
                descriptor.resource == Some(resource)
            })
            .map(|(slot, _)| slot as u32)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter bumped on every mutation, so that backends know when to
    /// rebuild whatever they've derived from the table.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerAddressMode {
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: SamplerFilter,
    pub address_mode: SamplerAddressMode,
}

impl SamplerDesc {
    /// Every combination of filter and address mode, in the order they're
    /// registered at startup.
    pub fn standard() -> impl Iterator<Item = Self> {
        [SamplerFilter::Nearest, SamplerFilter::Linear]
            .into_iter()
            .flat_map(|filter| {
                [
                    SamplerAddressMode::Clamp,
                    SamplerAddressMode::Repeat,
                    SamplerAddressMode::Mirror,
                ]
                .into_iter()
                .map(move |address_mode| Self {
                    filter,
                    address_mode,
                })
            })
    }
}

#[derive(Clone, Debug)]
pub struct SamplerTable {
    samplers: Vec<SamplerDesc>,
}

impl SamplerTable {
    pub const CAPACITY: usize = 36;

    pub fn new() -> Self {
        Self {
            samplers: Vec::new(),
        }
    }

    pub fn add(&mut self, desc: SamplerDesc) -> u32 {
        assert!(
            self.samplers.len() < Self::CAPACITY,
            "sampler table overflow: capacity is {}",
            Self::CAPACITY,
        );

        self.samplers.push(desc);

        (self.samplers.len() - 1) as u32
    }

    /// Returns slot of given sampler, if it's been added.
    pub fn find(&self, desc: SamplerDesc) -> Option<u32> {
        self.samplers
            .iter()
            .position(|sampler| *sampler == desc)
            .map(|slot| slot as u32)
    }

    pub fn get(&self, slot: u32) -> Option<SamplerDesc> {
        self.samplers.get(slot as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

impl Default for SamplerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferHandle, Resource};

    fn buffer(id: u32) -> Resource {
        Resource::Buffer(BufferHandle::new(id))
    }

    #[test]
    fn header() {
        let mut table = DescriptorTable::new();

        table.reserve_header();

        assert_eq!(19, table.len());
        assert_eq!(18, slots::BLUE_NOISE);

        for slot in 0..slots::HEADER_LEN {
            assert_eq!(None, table.get(slot));
            assert_eq!(EMPTY_SLOT_NAME, table.name(slot));
        }

        table.switch(buffer(7), slots::OUTPUT, "output");

        assert_eq!(Some(buffer(7)), table.get(slots::OUTPUT));
        assert_eq!("output", table.name(slots::OUTPUT));
    }

    #[test]
    fn slots_are_stable() {
        let mut table = DescriptorTable::new();

        table.reserve_header();

        let a = table.add(buffer(1), "a");
        let b = table.add(buffer(2), "b");
        let c = table.add(buffer(3), "c");

        assert_eq!((19, 20, 21), (a, b, c));

        table.switch(buffer(4), b, "d");

        assert_eq!(Some(buffer(1)), table.get(a));
        assert_eq!(Some(buffer(4)), table.get(b));
        assert_eq!(Some(buffer(3)), table.get(c));

        let e = table.add(buffer(5), "e");

        assert_eq!(22, e);
        assert_eq!(Some(buffer(4)), table.get(b));
        assert_eq!(vec![b], table.slots_of(buffer(4)).collect::<Vec<_>>());
    }

    #[test]
    fn ping_pong() {
        let mut table = DescriptorTable::new();
        let curr = table.add(buffer(1), "curr");
        let prev = table.add(buffer(2), "prev");
        let generation = table.generation();

        table.switch(buffer(2), curr, "curr");
        table.switch(buffer(1), prev, "prev");

        assert_eq!(Some(buffer(2)), table.get(curr));
        assert_eq!(Some(buffer(1)), table.get(prev));
        assert!(table.generation() > generation);
    }

    #[test]
    #[should_panic(expected = "has been neither reserved nor added")]
    fn switching_unknown_slot() {
        let mut table = DescriptorTable::new();

        table.reserve_header();
        table.switch(buffer(1), 19, "oops");
    }

    #[test]
    #[should_panic(expected = "descriptor table overflow")]
    fn overflow() {
        let mut table = DescriptorTable::with_capacity(2);

        table.add(buffer(1), "a");
        table.add(buffer(2), "b");
        table.add(buffer(3), "c");
    }

    #[test]
    fn samplers() {
        let mut table = SamplerTable::new();

        for desc in SamplerDesc::standard() {
            table.add(desc);
        }

        assert_eq!(6, table.len());

        let linear_repeat = SamplerDesc {
            filter: SamplerFilter::Linear,
            address_mode: SamplerAddressMode::Repeat,
        };

        assert_eq!(Some(4), table.find(linear_repeat));
        assert_eq!(Some(linear_repeat), table.get(4));
    }

    #[test]
    #[should_panic(expected = "sampler table overflow")]
    fn sampler_overflow() {
        let mut table = SamplerTable::new();

        for _ in 0..=SamplerTable::CAPACITY {
            table.add(SamplerDesc {
                filter: SamplerFilter::Linear,
                address_mode: SamplerAddressMode::Clamp,
            });
        }
    }
}
