use std::hash::{Hash, Hasher};
use std::ops::Range;

use glam::{Affine3A, Quat, Vec2, Vec3};

use crate::gpu;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshHandle(u32);

impl MeshHandle {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    albedo: Vec3,
    emission: Vec3,
}

impl Material {
    pub fn with_albedo(mut self, albedo: Vec3) -> Self {
        self.albedo = albedo;
        self
    }

    /// Sets emitted radiance; it's expected to be already multiplied by the
    /// light's strength.
    pub fn with_emission(mut self, emission: Vec3) -> Self {
        self.emission = emission;
        self
    }

    pub fn albedo(&self) -> Vec3 {
        self.albedo
    }

    pub fn emission(&self) -> Vec3 {
        self.emission
    }

    pub fn is_emissive(&self) -> bool {
        self.emission.max_element() > 0.0
    }

    pub(crate) fn serialize(&self) -> gpu::Material {
        gpu::Material {
            albedo: self.albedo.extend(1.0),
            emission: self.emission.extend(0.0),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            emission: Vec3::ZERO,
        }
    }
}

/// Part of a mesh drawn with a single material.
#[derive(Clone, Debug, PartialEq)]
pub struct Submesh {
    /// Range into [`Mesh::indices()`]; its length must be divisible by three.
    pub indices: Range<u32>,

    /// Transform from submesh's space into mesh's space.
    pub transform: Affine3A,

    pub material: Material,
}

impl Submesh {
    pub fn new(indices: Range<u32>, material: Material) -> Self {
        Self {
            indices,
            transform: Affine3A::IDENTITY,
            material,
        }
    }

    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.transform = transform;
        self
    }
}

/// Keyframed animation of submeshes' transforms.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshAnimation {
    keyframes: Vec<Keyframe>,
    time: f32,
    looping: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct Keyframe {
    time: f32,
    transforms: Vec<Affine3A>,
}

impl MeshAnimation {
    pub fn new(looping: bool) -> Self {
        Self {
            looping,
            ..Default::default()
        }
    }

    /// Adds a keyframe holding one transform per submesh; keyframes must be
    /// added in chronological order.
    pub fn with_keyframe(mut self, time: f32, transforms: Vec<Affine3A>) -> Self {
        if let Some(last) = self.keyframes.last() {
            assert!(
                time > last.time,
                "keyframes must be added in chronological order",
            );
        }

        self.keyframes.push(Keyframe { time, transforms });
        self
    }

    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |keyframe| keyframe.time)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Moves the animation forward, returning whether it's still running.
    fn advance(&mut self, dt: f32) -> bool {
        if self.keyframes.len() < 2 || dt <= 0.0 {
            return false;
        }

        let duration = self.duration();

        if !self.looping && self.time >= duration {
            return false;
        }

        self.time += dt;

        if self.looping {
            self.time %= duration;
        } else {
            self.time = self.time.min(duration);
        }

        true
    }

    fn sample(&self, submesh: usize) -> Option<Affine3A> {
        let next = self
            .keyframes
            .iter()
            .position(|keyframe| keyframe.time >= self.time)
            .unwrap_or(self.keyframes.len() - 1);

        let prev = next.saturating_sub(1);
        let prev_keyframe = &self.keyframes[prev];
        let next_keyframe = &self.keyframes[next];
        let a = *prev_keyframe.transforms.get(submesh)?;
        let b = *next_keyframe.transforms.get(submesh)?;

        let span = next_keyframe.time - prev_keyframe.time;

        let t = if span > 0.0 {
            ((self.time - prev_keyframe.time) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };

        Some(lerp_affine(a, b, t))
    }
}

fn lerp_affine(a: Affine3A, b: Affine3A, t: f32) -> Affine3A {
    let (a_scale, a_rot, a_pos) = a.to_scale_rotation_translation();
    let (b_scale, b_rot, b_pos) = b.to_scale_rotation_translation();

    Affine3A::from_scale_rotation_translation(
        a_scale.lerp(b_scale, t),
        Quat::slerp(a_rot, b_rot, t),
        a_pos.lerp(b_pos, t),
    )
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    submeshes: Vec<Submesh>,
    animation: Option<MeshAnimation>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            ..Default::default()
        }
    }

    pub fn with_submesh(mut self, submesh: Submesh) -> Self {
        assert!(
            submesh.indices.len() % 3 == 0
                && submesh.indices.end as usize <= self.indices.len(),
            "submesh's index range must cover whole triangles of the mesh",
        );

        self.submeshes.push(submesh);
        self
    }

    pub fn with_animation(mut self, animation: MeshAnimation) -> Self {
        self.animation = Some(animation);
        self
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    pub fn animation(&self) -> Option<&MeshAnimation> {
        self.animation.as_ref()
    }

    /// Advances mesh's animation, returning whether any of its submeshes has
    /// moved (in which case the mesh's BLAS has to be refit).
    pub fn animate(&mut self, dt: f32) -> bool {
        let Some(animation) = &mut self.animation else {
            return false;
        };

        if !animation.advance(dt) {
            return false;
        }

        let mut changed = false;

        for (idx, submesh) in self.submeshes.iter_mut().enumerate() {
            if let Some(transform) = animation.sample(idx) {
                if transform != submesh.transform {
                    submesh.transform = transform;
                    changed = true;
                }
            }
        }

        changed
    }

    /// Returns mesh's triangles, in mesh-space, together with their
    /// submesh's index.
    pub fn triangles(&self) -> impl Iterator<Item = MeshTriangle> + '_ {
        self.submeshes
            .iter()
            .enumerate()
            .flat_map(move |(submesh_idx, submesh)| {
                let indices = &self.indices[(submesh.indices.start as usize)
                    ..(submesh.indices.end as usize)];

                let normal_xform =
                    submesh.transform.matrix3.inverse().transpose();

                indices.chunks_exact(3).map(move |ids| {
                    let vertices = [ids[0], ids[1], ids[2]]
                        .map(|id| self.vertices[id as usize]);

                    MeshTriangle {
                        positions: vertices.map(|vertex| {
                            submesh.transform.transform_point3(vertex.position)
                        }),
                        normals: vertices.map(|vertex| {
                            (normal_xform * vertex.normal).normalize_or_zero()
                        }),
                        uvs: vertices.map(|vertex| vertex.uv),
                        submesh: submesh_idx as u32,
                    }
                })
            })
    }

    /// Hashes mesh's geometry and materials, so that identical meshes share
    /// a single BLAS.
    pub(crate) fn content_hash(&self) -> u64 {
        let mut hasher = fxhash::FxHasher::default();

        for vertex in &self.vertices {
            for val in [
                vertex.position.to_array().as_slice(),
                vertex.normal.to_array().as_slice(),
                vertex.uv.to_array().as_slice(),
            ]
            .concat()
            {
                val.to_bits().hash(&mut hasher);
            }
        }

        self.indices.hash(&mut hasher);

        for submesh in &self.submeshes {
            submesh.indices.hash(&mut hasher);

            for val in submesh.transform.to_cols_array() {
                val.to_bits().hash(&mut hasher);
            }

            let material = submesh.material.serialize();

            for val in material.albedo.to_array() {
                val.to_bits().hash(&mut hasher);
            }

            for val in material.emission.to_array() {
                val.to_bits().hash(&mut hasher);
            }
        }

        self.animation.is_some().hash(&mut hasher);

        hasher.finish()
    }
}

/// Triangle of a mesh, in mesh-space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshTriangle {
    pub positions: [Vec3; 3],
    pub normals: [Vec3; 3],
    pub uvs: [Vec2; 3],
    pub submesh: u32,
}

impl MeshTriangle {
    pub(crate) fn serialize(&self, material_id: u32) -> gpu::Triangle {
        gpu::Triangle::new(self.positions, self.normals, self.uvs, material_id)
    }
}
