use bytemuck::{Pod, Zeroable};
use glam::{
    vec2, vec3, vec3a, vec4, Affine3A, Mat3A, Vec2, Vec3, Vec4, Vec4Swizzles,
};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{
    BvhView, Hit, Material, Surface, BVH_STACK_SIZE, INVALID_ID,
    LANTERN_EPSILON,
};

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct Triangle {
    /// xyz - object-space position of the first vertex
    pub p0: Vec4,
    pub p1: Vec4,
    pub p2: Vec4,

    /// xyz - object-space normal of the first vertex
    pub n0: Vec4,
    pub n1: Vec4,
    pub n2: Vec4,

    /// xy - first vertex's uv, zw - second vertex's uv
    pub uv01: Vec4,

    /// xy - third vertex's uv, z - material id (bits), w - unused
    pub uv2_material: Vec4,
}

impl Triangle {
    pub fn new(
        positions: [Vec3; 3],
        normals: [Vec3; 3],
        uvs: [Vec2; 3],
        material_id: u32,
    ) -> Self {
        Self {
            p0: positions[0].extend(0.0),
            p1: positions[1].extend(0.0),
            p2: positions[2].extend(0.0),
            n0: normals[0].extend(0.0),
            n1: normals[1].extend(0.0),
            n2: normals[2].extend(0.0),
            uv01: vec4(uvs[0].x, uvs[0].y, uvs[1].x, uvs[1].y),
            uv2_material: vec4(
                uvs[2].x,
                uvs[2].y,
                f32::from_bits(material_id),
                0.0,
            ),
        }
    }

    pub fn positions(&self) -> [Vec3; 3] {
        [self.p0.xyz(), self.p1.xyz(), self.p2.xyz()]
    }

    pub fn material_id(&self) -> u32 {
        self.uv2_material.z.to_bits()
    }

    pub fn center(&self) -> Vec3 {
        (self.p0.xyz() + self.p1.xyz() + self.p2.xyz()) / 3.0
    }

    /// Returns point at given barycentric coordinates.
    pub fn point(&self, uv: Vec2) -> Vec3 {
        self.p0.xyz() * (1.0 - uv.x - uv.y)
            + self.p1.xyz() * uv.x
            + self.p2.xyz() * uv.y
    }

    /// Returns interpolated normal at given barycentric coordinates.
    pub fn normal(&self, uv: Vec2) -> Vec3 {
        let normal = self.n0.xyz() * (1.0 - uv.x - uv.y)
            + self.n1.xyz() * uv.x
            + self.n2.xyz() * uv.y;

        if normal.length_squared() > 0.0 {
            normal.normalize()
        } else {
            self.geometric_normal()
        }
    }

    pub fn geometric_normal(&self) -> Vec3 {
        (self.p1.xyz() - self.p0.xyz())
            .cross(self.p2.xyz() - self.p0.xyz())
            .normalize_or_zero()
    }

    /// Returns interpolated texture coordinates at given barycentric
    /// coordinates.
    pub fn uv(&self, uv: Vec2) -> Vec2 {
        self.uv01.xy() * (1.0 - uv.x - uv.y)
            + self.uv01.zw() * uv.x
            + self.uv2_material.xy() * uv.y
    }

    /// Intersects this triangle with given ray, returning `(t, u, v)` or
    /// `(f32::MAX, _, _)` if the ray misses.
    ///
    /// Thanks to:
    /// - https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Vec3 {
        let miss = vec3(f32::MAX, 0.0, 0.0);
        let e1 = self.p1.xyz() - self.p0.xyz();
        let e2 = self.p2.xyz() - self.p0.xyz();
        let p = dir.cross(e2);
        let det = e1.dot(p);

        if det.abs() < 1e-12 {
            return miss;
        }

        let inv_det = 1.0 / det;
        let s = origin - self.p0.xyz();
        let u = s.dot(p) * inv_det;

        if u < 0.0 || u > 1.0 {
            return miss;
        }

        let q = s.cross(e1);
        let v = dir.dot(q) * inv_det;

        if v < 0.0 || u + v > 1.0 {
            return miss;
        }

        let t = e2.dot(q) * inv_det;

        if t > LANTERN_EPSILON {
            vec3(t, u, v)
        } else {
            miss
        }
    }
}

/// Per-model data, indexed by model id.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct ModelData {
    pub triangle_offset: u32,
    pub triangle_count: u32,
    pub blas_root: u32,
    pub light_count: u32,
}

/// Record of a single top-level instance; the instance's id is its index in
/// the TLAS instance list.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct InstanceData {
    pub model_id: u32,
    pub blas_root: u32,
    pub triangle_offset: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct InstanceTransform {
    pub world_from_object: [Vec4; 3],
    pub object_from_world: [Vec4; 3],
    pub prev_world_from_object: [Vec4; 3],
}

impl InstanceTransform {
    pub fn new(curr: Affine3A, prev: Affine3A) -> Self {
        Self {
            world_from_object: Self::encode_affine(curr),
            object_from_world: Self::encode_affine(curr.inverse()),
            prev_world_from_object: Self::encode_affine(prev),
        }
    }

    pub fn world_from_object(&self) -> Affine3A {
        Self::decode_affine(self.world_from_object)
    }

    pub fn object_from_world(&self) -> Affine3A {
        Self::decode_affine(self.object_from_world)
    }

    pub fn prev_world_from_object(&self) -> Affine3A {
        Self::decode_affine(self.prev_world_from_object)
    }

    /// Transforms an object-space normal into world-space.
    pub fn normal_to_world(&self, normal: Vec3) -> Vec3 {
        (self.object_from_world().matrix3.transpose() * normal)
            .normalize_or_zero()
    }

    /// Encodes a 3D affine transformation as three Vec4s; we use this to
    /// overcome padding issues when copying data from CPU into GPU.
    pub fn encode_affine(xform: Affine3A) -> [Vec4; 3] {
        let d0 = vec4(
            xform.matrix3.x_axis.x,
            xform.matrix3.x_axis.y,
            xform.matrix3.x_axis.z,
            xform.translation.x,
        );

        let d1 = vec4(
            xform.matrix3.y_axis.x,
            xform.matrix3.y_axis.y,
            xform.matrix3.y_axis.z,
            xform.translation.y,
        );

        let d2 = vec4(
            xform.matrix3.z_axis.x,
            xform.matrix3.z_axis.y,
            xform.matrix3.z_axis.z,
            xform.translation.z,
        );

        [d0, d1, d2]
    }

    /// See: [`Self::encode_affine()`].
    pub fn decode_affine([d0, d1, d2]: [Vec4; 3]) -> Affine3A {
        Affine3A {
            matrix3: Mat3A {
                x_axis: vec3a(d0.x, d0.y, d0.z),
                y_axis: vec3a(d1.x, d1.y, d1.z),
                z_axis: vec3a(d2.x, d2.y, d2.z),
            },
            translation: vec3a(d0.w, d1.w, d2.w),
        }
    }
}

/// Everything needed to trace rays against the scene.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub tlas: BvhView<'a>,
    pub blas: BvhView<'a>,
    pub models: &'a [ModelData],
    pub instances: &'a [InstanceData],
    pub transforms: &'a [InstanceTransform],
    pub triangles: &'a [Triangle],
    pub materials: &'a [Material],
}

impl<'a> SceneView<'a> {
    /// Finds the closest hit along given ray.
    pub fn trace(&self, origin: Vec3, dir: Vec3, max_t: f32) -> Hit {
        self.traverse(origin, dir, max_t, false)
    }

    /// Returns whether anything lays between `origin` and `origin + dir *
    /// max_t`.
    pub fn is_occluded(&self, origin: Vec3, dir: Vec3, max_t: f32) -> bool {
        self.traverse(origin, dir, max_t, true).is_some()
    }

    fn traverse(&self, origin: Vec3, dir: Vec3, max_t: f32, any: bool) -> Hit {
        let mut hit = Hit::none(max_t);
        let inv_dir = dir.recip();
        let mut stack = [0u32; BVH_STACK_SIZE];
        let mut stack_len = 1;

        while stack_len > 0 {
            stack_len -= 1;

            let node = self.tlas.node(stack[stack_len]);

            if node.distance(origin, inv_dir, hit.t) == f32::MAX {
                continue;
            }

            if node.is_leaf() {
                let mut i = 0;

                while i < node.count() {
                    self.traverse_instance(
                        node.first() + i,
                        origin,
                        dir,
                        any,
                        &mut hit,
                    );

                    if any && hit.is_some() {
                        return hit;
                    }

                    i += 1;
                }
            } else if stack_len + 2 <= BVH_STACK_SIZE {
                stack[stack_len] = node.right();
                stack[stack_len + 1] = node.left();
                stack_len += 2;
            }
        }

        hit
    }

    fn traverse_instance(
        &self,
        instance_id: u32,
        origin: Vec3,
        dir: Vec3,
        any: bool,
        hit: &mut Hit,
    ) {
        let instance = self.instances[instance_id as usize];
        let xform = self.transforms[instance_id as usize].object_from_world();

        // Not normalizing the direction keeps distances in world-space units
        let origin = xform.transform_point3(origin);
        let dir = xform.transform_vector3(dir);
        let inv_dir = dir.recip();

        let mut stack = [0u32; BVH_STACK_SIZE];
        let mut stack_len = 1;

        stack[0] = instance.blas_root;

        while stack_len > 0 {
            stack_len -= 1;

            let node = self.blas.node(stack[stack_len]);

            if node.distance(origin, inv_dir, hit.t) == f32::MAX {
                continue;
            }

            if node.is_leaf() {
                let mut i = 0;

                while i < node.count() {
                    let triangle_id = node.first() + i;
                    let tuv = self.triangles[triangle_id as usize]
                        .intersect(origin, dir);

                    if tuv.x < hit.t {
                        *hit = Hit {
                            t: tuv.x,
                            uv: vec2(tuv.y, tuv.z),
                            instance_id,
                            primitive_id: triangle_id
                                - instance.triangle_offset,
                            triangle_id,
                        };

                        if any {
                            return;
                        }
                    }

                    i += 1;
                }
            } else if stack_len + 2 <= BVH_STACK_SIZE {
                stack[stack_len] = node.right();
                stack[stack_len + 1] = node.left();
                stack_len += 2;
            }
        }
    }

    /// Resolves hit into a surface, as seen from a ray going in `dir`.
    pub fn surface(&self, hit: Hit, dir: Vec3) -> Surface {
        if hit.is_none() {
            return Surface {
                instance_id: INVALID_ID,
                triangle_id: INVALID_ID,
                ..Default::default()
            };
        }

        let triangle = self.triangles[hit.triangle_id as usize];
        let xform = self.transforms[hit.instance_id as usize];
        let material = self.materials[triangle.material_id() as usize];
        let local = triangle.point(hit.uv);
        let mut normal = xform.normal_to_world(triangle.normal(hit.uv));

        if normal.dot(dir) > 0.0 {
            normal = -normal;
        }

        Surface {
            position: xform.world_from_object().transform_point3(local),
            prev_position: xform
                .prev_world_from_object()
                .transform_point3(local),
            normal,
            uv: triangle.uv(hit.uv),
            albedo: material.albedo(),
            emission: material.emission(),
            instance_id: hit.instance_id,
            triangle_id: hit.triangle_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::Vec3Swizzles;

    use super::*;

    fn triangle() -> Triangle {
        Triangle::new(
            [
                vec3(-1.0, -1.0, 0.0),
                vec3(1.0, -1.0, 0.0),
                vec3(0.0, 1.0, 0.0),
            ],
            [Vec3::Z; 3],
            [Vec2::ZERO, Vec2::X, Vec2::Y],
            7,
        )
    }

    #[test]
    fn intersect() {
        let triangle = triangle();
        let tuv = triangle.intersect(vec3(0.0, 0.0, 5.0), -Vec3::Z);

        assert_relative_eq!(tuv.x, 5.0);
        assert_relative_eq!(triangle.point(tuv.yz()).z, 0.0);

        let tuv = triangle.intersect(vec3(5.0, 0.0, 5.0), -Vec3::Z);

        assert_eq!(f32::MAX, tuv.x);

        let tuv = triangle.intersect(vec3(0.0, 0.0, 5.0), Vec3::Z);

        assert_eq!(f32::MAX, tuv.x);
    }

    #[test]
    fn material_id() {
        assert_eq!(7, triangle().material_id());
    }

    #[test]
    fn affine_round_trip() {
        let xform = Affine3A::from_scale_rotation_translation(
            vec3(1.0, 2.0, 3.0),
            glam::Quat::from_rotation_y(0.7),
            vec3(4.0, 5.0, 6.0),
        );

        let decoded = InstanceTransform::decode_affine(
            InstanceTransform::encode_affine(xform),
        );

        assert!(decoded.abs_diff_eq(xform, 1e-6));
    }
}
