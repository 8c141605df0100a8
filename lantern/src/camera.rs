use glam::{Mat4, UVec2, Vec3};

use crate::gpu;

/// Camera as provided by the host, each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraInput {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,

    /// Vertical field of view, in radians.
    pub fov: f32,

    pub near: f32,

    /// Rays never travel further than this; zero means no limit.
    pub far: f32,
}

impl Default for CameraInput {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: 45.0_f32.to_radians(),
            near: 0.1,
            far: 0.0,
        }
    }
}

impl CameraInput {
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            forward: (target - position).normalize(),
            ..Default::default()
        }
    }

    /// Builds the camera the kernels see: an image plane one unit in front
    /// of the camera, spanned by two axes going right and down.
    pub fn serialize(&self, screen: UVec2) -> gpu::Camera {
        let forward = self.forward.normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward);

        let aspect = screen.x as f32 / screen.y as f32;
        let height = 2.0 * (self.fov * 0.5).tan();
        let width = height * aspect;

        let x_axis = right * width;
        let y_axis = -up * height;
        let image_plane = self.position + forward - x_axis * 0.5 - y_axis * 0.5;

        gpu::Camera {
            position: self.position.extend(1.0),
            image_plane: image_plane.extend(1.0),
            x_axis: x_axis.extend(0.0),
            y_axis: y_axis.extend(0.0),
            screen: screen
                .as_vec2()
                .extend(self.fov / screen.y as f32)
                .extend(0.0),
        }
    }

    /// Projection matrix matching this camera, for hosts drawing overlays on
    /// top of the output.
    pub fn view_projection(&self, screen: UVec2) -> Mat4 {
        let aspect = screen.x as f32 / screen.y as f32;
        let projection = if self.far > 0.0 {
            Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
        } else {
            Mat4::perspective_infinite_rh(self.fov, aspect, self.near)
        };

        let view = Mat4::look_to_rh(self.position, self.forward, self.up);

        projection * view
    }

    /// Returns the maximum distance traced by rays, given scene's diagonal.
    pub fn max_t(&self, scene_diagonal: f32, multiplier: f32) -> f32 {
        let max_t = (scene_diagonal * multiplier).max(1.0);

        if self.far > 0.0 {
            max_t.min(self.far)
        } else {
            max_t
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec2, vec3};

    use super::*;

    #[test]
    fn serialize() {
        let camera = CameraInput {
            fov: 90.0_f32.to_radians(),
            ..Default::default()
        }
        .serialize(uvec2(200, 100));

        assert_relative_eq!(
            vec3(-2.0, 1.0, -1.0),
            camera.image_plane.truncate(),
            epsilon = 1e-5
        );

        assert_relative_eq!(
            vec3(4.0, 0.0, 0.0),
            camera.x_axis.truncate(),
            epsilon = 1e-5
        );

        assert_relative_eq!(
            vec3(0.0, -2.0, 0.0),
            camera.y_axis.truncate(),
            epsilon = 1e-5
        );
        assert_eq!(uvec2(200, 100), camera.screen_size());
    }

    #[test]
    fn world_to_screen() {
        let camera = CameraInput::default().serialize(uvec2(64, 32));

        // Point straight ahead lands in the middle of the screen
        assert_relative_eq!(
            vec2(32.0, 16.0),
            camera.world_to_screen(vec3(0.0, 0.0, -10.0)),
            epsilon = 1e-3
        );
    }

    #[test]
    fn movement() {
        let a = CameraInput::default().serialize(uvec2(64, 32));
        let b = CameraInput::default().serialize(uvec2(64, 32));

        let c = CameraInput {
            position: vec3(0.0, 0.0, 0.1),
            ..Default::default()
        }
        .serialize(uvec2(64, 32));

        assert!(!a.has_moved(&b));
        assert!(a.has_moved(&c));
    }

    #[test]
    fn max_t() {
        let camera = CameraInput::default();

        assert_eq!(300.0, camera.max_t(1.0, 300.0));

        let camera = CameraInput {
            far: 50.0,
            ..Default::default()
        };

        assert_eq!(50.0, camera.max_t(1.0, 300.0));
    }
}
