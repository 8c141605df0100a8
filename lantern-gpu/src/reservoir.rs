use glam::{vec2, Vec2};

use crate::{WhiteNoise, INVALID_ID};

/// Streaming, weighted single-sample selector.
///
/// Candidates are streamed through [`Self::update()`] and whole reservoirs
/// are combined through [`Self::merge()`]; both operations follow the same
/// rule, so that merging reservoirs yields the same distribution as if all of
/// their candidates had been streamed through a single reservoir.
#[derive(Clone, Copy, Default, PartialEq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct Reservoir<T> {
    pub sample: T,

    /// Target function's value for the current sample.
    pub p_hat: f32,

    /// Sum of weights of all candidates seen so far.
    pub w_sum: f32,

    /// Number of candidates seen so far.
    pub m: f32,

    /// Unbiased contribution weight of the current sample; valid after
    /// [`Self::finalize()`].
    pub w: f32,
}

impl<T> Reservoir<T>
where
    T: Clone + Copy,
{
    /// Streams a single candidate through this reservoir; returns whether it
    /// got picked.
    pub fn update(
        &mut self,
        noise: &mut WhiteNoise,
        sample: T,
        p_hat: f32,
        weight: f32,
    ) -> bool {
        self.m += 1.0;
        self.add(noise, sample, p_hat, weight)
    }

    /// Merges another, finalized reservoir into this one; `p_hat` is the
    /// target function of `rhs.sample` evaluated at *this* reservoir's
    /// location.
    ///
    /// Merging a reservoir that hasn't seen any candidates, or whose
    /// candidates all had zero weight, is a no-op.
    pub fn merge(
        &mut self,
        noise: &mut WhiteNoise,
        rhs: &Self,
        p_hat: f32,
    ) -> bool {
        if rhs.m <= 0.0 || rhs.w_sum <= 0.0 {
            return false;
        }

        self.m += rhs.m;
        self.add(noise, rhs.sample, p_hat, p_hat * rhs.w * rhs.m)
    }

    fn add(
        &mut self,
        noise: &mut WhiteNoise,
        sample: T,
        p_hat: f32,
        weight: f32,
    ) -> bool {
        if weight <= 0.0 {
            return false;
        }

        self.w_sum += weight;

        if noise.sample() * self.w_sum <= weight {
            self.sample = sample;
            self.p_hat = p_hat;
            true
        } else {
            false
        }
    }

    /// Computes the contribution weight of the current sample.
    pub fn finalize(&mut self) {
        let t = self.m * self.p_hat;

        self.w = if t > 0.0 { self.w_sum / t } else { 0.0 };
    }

    pub fn clamp_m(&mut self, max: f32) {
        self.m = self.m.min(max);
    }

    pub fn is_empty(&self) -> bool {
        self.w_sum <= 0.0
    }
}

/// Sample stored in a [`LightReservoir`]: a light and a point on it.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct LightPick {
    pub light_idx: u32,
    pub uv: Vec2,
}

impl Default for LightPick {
    fn default() -> Self {
        Self {
            light_idx: INVALID_ID,
            uv: Vec2::ZERO,
        }
    }
}

pub type LightReservoir = Reservoir<LightPick>;

/// GPU representation of a [`LightReservoir`].
#[repr(C)]
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct LightReservoirData {
    pub picked_light_idx: u32,
    pub weight: f32,
    pub w_sum: f32,
    pub eval_lights: f32,
    pub p_hat: f32,
    pub sample_u: f32,
    pub sample_v: f32,
    pub _pad: f32,
}

impl LightReservoir {
    pub fn read(buffer: &[LightReservoirData], idx: usize) -> Self {
        let data = buffer[idx];

        Self {
            sample: LightPick {
                light_idx: data.picked_light_idx,
                uv: vec2(data.sample_u, data.sample_v),
            },
            p_hat: data.p_hat,
            w_sum: data.w_sum,
            m: data.eval_lights,
            w: data.weight,
        }
    }

    pub fn write(&self, buffer: &mut [LightReservoirData], idx: usize) {
        buffer[idx] = LightReservoirData {
            picked_light_idx: self.sample.light_idx,
            weight: self.w,
            w_sum: self.w_sum,
            eval_lights: self.m,
            p_hat: self.p_hat,
            sample_u: self.sample.uv.x,
            sample_v: self.sample.uv.y,
            _pad: 0.0,
        };
    }
}
