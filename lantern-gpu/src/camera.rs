use bytemuck::{Pod, Zeroable};
use glam::{vec2, IVec2, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::Ray;

/// Camera as seen by the kernels; the renderer keeps two of them, one for the
/// previous frame and one for the current frame.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct Camera {
    /// xyz - position
    pub position: Vec4,

    /// xyz - world-space position of the image plane's top-left corner
    pub image_plane: Vec4,

    /// xyz - vector spanning the image plane from left to right
    pub x_axis: Vec4,

    /// xyz - vector spanning the image plane from top to bottom
    pub y_axis: Vec4,

    /// x - width, y - height, z - cone spread angle, w - unused
    pub screen: Vec4,
}

impl Camera {
    pub fn position(&self) -> Vec3 {
        self.position.xyz()
    }

    pub fn screen_size(&self) -> UVec2 {
        self.screen.xy().as_uvec2()
    }

    pub fn width(&self) -> u32 {
        self.screen.x as u32
    }

    pub fn height(&self) -> u32 {
        self.screen.y as u32
    }

    pub fn cone_spread(&self) -> f32 {
        self.screen.z
    }

    /// Given a point in screen-coordinates, returns a unique index for it; used
    /// to index screen-space structures.
    pub fn screen_to_idx(&self, pos: UVec2) -> usize {
        (pos.y * self.width() + pos.x) as usize
    }

    /// Returns whether given point lays inside the screen.
    pub fn contains(&self, pos: IVec2) -> bool {
        let screen_size = self.screen_size().as_ivec2();

        pos.x >= 0
            && pos.y >= 0
            && pos.x < screen_size.x
            && pos.y < screen_size.y
    }

    /// Casts a ray from camera's position through given pixel; `jitter` picks
    /// the point within the pixel, with `0.5` being its center.
    pub fn ray(&self, screen_pos: UVec2, jitter: Vec2, max_t: f32) -> Ray {
        let uv = (screen_pos.as_vec2() + jitter) / self.screen.xy();

        let target = self.image_plane.xyz()
            + self.x_axis.xyz() * uv.x
            + self.y_axis.xyz() * uv.y;

        let direction = (target - self.position()).normalize();

        Ray::new(self.position(), direction, max_t)
    }

    /// Given a point in world-coordinates, returns it in screen-coordinates.
    ///
    /// Points behind the camera are mapped into `(-1.0, -1.0)`, i.e. outside
    /// of the screen.
    pub fn world_to_screen(&self, point: Vec3) -> Vec2 {
        let x_axis = self.x_axis.xyz();
        let y_axis = self.y_axis.xyz();
        let normal = x_axis.cross(y_axis);
        let dir = point - self.position();
        let den = dir.dot(normal);

        if den.abs() < 1e-8 {
            return vec2(-1.0, -1.0);
        }

        let t = (self.image_plane.xyz() - self.position()).dot(normal) / den;

        if t <= 0.0 {
            return vec2(-1.0, -1.0);
        }

        let local = self.position() + dir * t - self.image_plane.xyz();

        let uv = vec2(
            local.dot(x_axis) / x_axis.length_squared(),
            local.dot(y_axis) / y_axis.length_squared(),
        );

        uv * self.screen.xy()
    }

    /// Returns whether this camera differs from the other one in a way that
    /// invalidates accumulated frames.
    pub fn has_moved(&self, rhs: &Self) -> bool {
        self.position != rhs.position
            || self.image_plane != rhs.image_plane
            || self.x_axis != rhs.x_axis
            || self.y_axis != rhs.y_axis
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec3, vec4};

    use super::*;

    fn camera() -> Camera {
        Camera {
            position: vec4(0.0, 0.0, 0.0, 0.0),
            image_plane: vec4(-1.0, 1.0, -1.0, 0.0),
            x_axis: vec4(2.0, 0.0, 0.0, 0.0),
            y_axis: vec4(0.0, -2.0, 0.0, 0.0),
            screen: vec4(100.0, 100.0, 0.01, 0.0),
        }
    }

    #[test]
    fn ray_and_world_to_screen_agree() {
        let camera = camera();
        let ray = camera.ray(uvec2(25, 75), vec2(0.5, 0.5), 100.0);
        let point = ray.at(10.0);
        let screen = camera.world_to_screen(point);

        assert_relative_eq!(screen.x, 25.5, epsilon = 0.001);
        assert_relative_eq!(screen.y, 75.5, epsilon = 0.001);
    }

    #[test]
    fn points_behind_are_off_screen() {
        let camera = camera();
        let screen = camera.world_to_screen(vec3(0.0, 0.0, 5.0));

        assert!(!camera.contains(screen.as_ivec2()));
    }

    #[test]
    fn movement() {
        let a = camera();
        let mut b = a;

        assert!(!a.has_moved(&b));

        b.position.x += 0.001;

        assert!(a.has_moved(&b));
    }
}
