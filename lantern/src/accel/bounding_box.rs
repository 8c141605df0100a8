use std::ops::{Add, AddAssign};

use glam::{vec3, Affine3A, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max() - self.min()
    }

    pub fn diagonal(&self) -> f32 {
        if self.is_set() {
            self.extent().length()
        } else {
            0.0
        }
    }

    pub fn half_area(&self) -> f32 {
        if !self.is_set() {
            return f32::MAX;
        }

        let extent = self.extent();

        extent.x * extent.y + extent.y * extent.z + extent.z * extent.x
    }

    pub fn with_transform(&self, transform: Affine3A) -> Self {
        if !self.is_set() {
            return *self;
        }

        (0..8)
            .map(|i| {
                let point = vec3(
                    if i & 1 > 0 { self.max.x } else { self.min.x },
                    if i & 2 > 0 { self.max.y } else { self.min.y },
                    if i & 4 > 0 { self.max.z } else { self.min.z },
                );

                transform.transform_point3(point)
            })
            .collect()
    }

    pub fn is_set(&self) -> bool {
        self.min.x != Self::default().min.x
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::MAX, Vec3::MIN)
    }
}

impl Add<Vec3> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Vec3) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Vec3> for BoundingBox {
    fn add_assign(&mut self, rhs: Vec3) {
        self.min = self.min.min(rhs);
        self.max = self.max.max(rhs);
    }
}

impl FromIterator<Vec3> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Vec3>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}

impl Add<Self> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Self> for BoundingBox {
    fn add_assign(&mut self, rhs: Self) {
        if rhs.is_set() {
            *self += rhs.min;
            *self += rhs.max;
        }
    }
}

impl FromIterator<Self> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Self>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::Quat;

    use super::*;

    #[test]
    fn grow() {
        let bb: BoundingBox = [vec3(1.0, 2.0, 3.0), vec3(-1.0, 4.0, 0.0)]
            .into_iter()
            .collect();

        assert_eq!(vec3(-1.0, 2.0, 0.0), bb.min());
        assert_eq!(vec3(1.0, 4.0, 3.0), bb.max());
        assert_relative_eq!(2.0 * 2.0 + 2.0 * 3.0 + 3.0 * 2.0, bb.half_area());

        let unset = BoundingBox::default();

        assert!(!unset.is_set());
        assert_eq!(bb, bb + unset);
        assert_eq!(0.0, unset.diagonal());
    }

    #[test]
    fn with_transform() {
        let bb = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));

        let bb = bb.with_transform(Affine3A::from_rotation_translation(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            vec3(10.0, 0.0, 0.0),
        ));

        let half = std::f32::consts::SQRT_2;

        assert_relative_eq!(10.0 - half, bb.min().x, epsilon = 1e-5);
        assert_relative_eq!(10.0 + half, bb.max().x, epsilon = 1e-5);
        assert_relative_eq!(-1.0, bb.min().y, epsilon = 1e-5);
        assert_relative_eq!(1.0, bb.max().y, epsilon = 1e-5);
    }
}
