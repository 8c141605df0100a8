//! Bottom- and top-level acceleration structures, plus everything else the
//! kernels need to trace rays against the scene (models, instances,
//! triangles, materials and the light table), serialized into flat arrays.

mod blas;
mod bounding_box;
mod bvh;
mod lights;
mod tlas;

use fxhash::FxHashMap;
use glam::{Affine3A, Vec4};
use log::{debug, info, warn};

pub use self::blas::*;
pub use self::bounding_box::*;
pub use self::bvh::*;
pub use self::lights::*;
pub use self::tlas::*;
use crate::{gpu, Material, Mesh, MeshHandle};

/// Mesh placed in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub mesh: MeshHandle,
    pub transform: Affine3A,
}

impl Instance {
    pub fn new(mesh: MeshHandle, transform: Affine3A) -> Self {
        Self { mesh, transform }
    }
}

/// Identifies a BLAS; identical meshes share one, unless they are animated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ModelKey {
    hash: u64,
    animated: Option<MeshHandle>,
}

impl ModelKey {
    fn new(handle: MeshHandle, mesh: &Mesh) -> Self {
        Self {
            hash: mesh.content_hash(),
            animated: mesh.animation().map(|_| handle),
        }
    }
}

#[derive(Clone, Debug)]
struct Model {
    key: ModelKey,
    meshes: Vec<MeshHandle>,
    blas: Blas,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceRecord {
    pub mesh: MeshHandle,
    pub model_id: u32,
    pub transform: Affine3A,
    pub prev_transform: Affine3A,
}

/// Scene, serialized the way the kernels read it.
#[derive(Clone, Debug, Default)]
pub struct SceneData {
    pub tlas: Vec<Vec4>,
    pub blas: Vec<Vec4>,
    pub models: Vec<gpu::ModelData>,
    pub instances: Vec<gpu::InstanceData>,
    pub transforms: Vec<gpu::InstanceTransform>,
    pub triangles: Vec<gpu::Triangle>,
    pub materials: Vec<gpu::Material>,
    pub lights: Vec<gpu::LightPickData>,
}

#[derive(Debug, Default)]
pub struct AccelStructures {
    models: Vec<Model>,
    instances: Vec<InstanceRecord>,
    tlas: Tlas,
    lights: LightTable,
    data: SceneData,
}

impl AccelStructures {
    /// Rebuilds everything from scratch: models (reusing BLASes of meshes
    /// that haven't changed), instance list, TLAS and the light table.
    ///
    /// Instances referring to unknown meshes are skipped.
    pub fn rebuild(&mut self, meshes: &[Mesh], instances: &[Instance]) {
        info!("Rebuilding acceleration structures");

        let mut prev_models: FxHashMap<_, _> = self
            .models
            .drain(..)
            .map(|model| (model.key, model.blas))
            .collect();

        let mut model_ids = FxHashMap::default();

        self.instances.clear();

        for instance in Self::known(meshes, instances) {
            let mesh = &meshes[instance.mesh.get()];
            let key = ModelKey::new(instance.mesh, mesh);

            let model_id = *model_ids.entry(key).or_insert_with(|| {
                let blas = prev_models
                    .remove(&key)
                    .unwrap_or_else(|| Blas::build(mesh));

                self.models.push(Model {
                    key,
                    meshes: Vec::new(),
                    blas,
                });

                (self.models.len() - 1) as u32
            });

            let model = &mut self.models[model_id as usize];

            if !model.meshes.contains(&instance.mesh) {
                model.meshes.push(instance.mesh);
            }

            self.instances.push(InstanceRecord {
                mesh: instance.mesh,
                model_id,
                transform: instance.transform,
                prev_transform: instance.transform,
            });
        }

        debug!(
            "Scene has {} instances of {} models",
            self.instances.len(),
            self.models.len(),
        );

        self.tlas = Tlas::build(&self.instance_bounds());

        self.lights = LightTable::build(self.instances.iter().map(|instance| {
            (
                instance.model_id,
                &self.models[instance.model_id as usize].blas,
            )
        }));

        self.serialize_models();
        self.serialize_instances();
        self.data.lights = self.lights.entries().to_vec();
    }

    /// Updates instances' transforms and refits the TLAS.
    ///
    /// Returns `false` if the instance list doesn't match the one the TLAS
    /// was built for, in which case [`Self::rebuild()`] has to be called
    /// instead.
    pub fn update(&mut self, meshes: &[Mesh], instances: &[Instance]) -> bool {
        let mut known = Self::known(meshes, instances);
        let mut records = self.instances.iter_mut();

        loop {
            match (known.next(), records.next()) {
                (Some(instance), Some(record)) => {
                    if instance.mesh != record.mesh {
                        return false;
                    }

                    record.prev_transform = record.transform;
                    record.transform = instance.transform;
                }

                (None, None) => break,
                _ => return false,
            }
        }

        self.tlas.refit(&self.instance_bounds());
        self.serialize_instances();

        true
    }

    /// Refits BLAS of given (animated) mesh; TLAS has to be refit afterwards,
    /// see [`Self::update()`].
    pub fn refit_mesh(&mut self, handle: MeshHandle, mesh: &Mesh) {
        let mut refitted = false;

        for model in &mut self.models {
            if model.meshes.contains(&handle) {
                debug!("Refitting BLAS of mesh {handle:?}");

                model.blas.refit(mesh);
                refitted = true;
            }
        }

        if refitted {
            self.serialize_models();
        }
    }

    fn known<'a>(
        meshes: &'a [Mesh],
        instances: &'a [Instance],
    ) -> impl Iterator<Item = &'a Instance> {
        instances.iter().filter(move |instance| {
            if instance.mesh.get() < meshes.len() {
                true
            } else {
                warn!(
                    "Instance refers to unknown mesh {:?}; skipping it",
                    instance.mesh,
                );

                false
            }
        })
    }

    fn instance_bounds(&self) -> Vec<BoundingBox> {
        self.instances
            .iter()
            .map(|instance| {
                self.models[instance.model_id as usize]
                    .blas
                    .bounds()
                    .with_transform(instance.transform)
            })
            .collect()
    }

    fn serialize_models(&mut self) {
        let data = &mut self.data;

        data.blas.clear();
        data.models.clear();
        data.triangles.clear();
        data.materials.clear();

        for model in &self.models {
            let blas_root = (data.blas.len() / 2) as u32;
            let triangle_offset = data.triangles.len() as u32;
            let material_offset = data.materials.len() as u32;

            model
                .blas
                .serialize_nodes(&mut data.blas, blas_root, triangle_offset);

            model
                .blas
                .serialize_triangles(&mut data.triangles, material_offset);

            data.materials.extend(
                model.blas.materials().iter().map(Material::serialize),
            );

            data.models.push(gpu::ModelData {
                triangle_offset,
                triangle_count: model.blas.triangles().len() as u32,
                blas_root,
                light_count: model.blas.emissive().len() as u32,
            });
        }

        if data.materials.is_empty() {
            data.materials.push(Default::default());
        }

        if data.triangles.is_empty() {
            data.triangles.push(Default::default());
        }

        for (record, instance) in
            self.instances.iter().zip(data.instances.iter_mut())
        {
            let model = data.models[record.model_id as usize];

            instance.blas_root = model.blas_root;
            instance.triangle_offset = model.triangle_offset;
        }
    }

    fn serialize_instances(&mut self) {
        let data = &mut self.data;

        data.tlas.clear();
        self.tlas.serialize(&mut data.tlas);

        data.instances = self
            .instances
            .iter()
            .map(|record| {
                let model = data.models[record.model_id as usize];

                gpu::InstanceData {
                    model_id: record.model_id,
                    blas_root: model.blas_root,
                    triangle_offset: model.triangle_offset,
                    _pad: 0,
                }
            })
            .collect();

        data.transforms = self
            .instances
            .iter()
            .map(|record| {
                gpu::InstanceTransform::new(
                    record.transform,
                    record.prev_transform,
                )
            })
            .collect();

        if data.instances.is_empty() {
            data.instances.push(Default::default());
            data.transforms.push(gpu::InstanceTransform::new(
                Affine3A::IDENTITY,
                Affine3A::IDENTITY,
            ));
        }
    }

    pub fn data(&self) -> &SceneData {
        &self.data
    }

    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn lights(&self) -> &LightTable {
        &self.lights
    }

    pub fn tlas(&self) -> &Tlas {
        &self.tlas
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Length of the scene's diagonal, used to scale rays' maximum distance.
    pub fn scene_diagonal(&self) -> f32 {
        self.tlas.bounds().diagonal()
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec2, vec3, Vec3};

    use super::*;
    use crate::{Submesh, Vertex};

    fn quad(material: Material) -> Mesh {
        let vertices = [
            vec3(-0.5, -0.5, 0.0),
            vec3(0.5, -0.5, 0.0),
            vec3(0.5, 0.5, 0.0),
            vec3(-0.5, 0.5, 0.0),
        ]
        .map(|position| Vertex::new(position, Vec3::Z, vec2(0.0, 0.0)))
        .to_vec();

        Mesh::new(vertices, vec![0, 1, 2, 0, 2, 3])
            .with_submesh(Submesh::new(0..6, material))
    }

    fn lamp() -> Mesh {
        quad(Material::default().with_emission(Vec3::splat(10.0)))
    }

    fn wall() -> Mesh {
        quad(Material::default())
    }

    fn at(mesh: u32, x: f32) -> Instance {
        Instance::new(
            MeshHandle::new(mesh),
            Affine3A::from_translation(vec3(x, 0.0, 0.0)),
        )
    }

    #[test]
    fn index_alignment() {
        let meshes = vec![wall(), lamp(), lamp()];

        let instances = vec![
            at(0, 0.0),
            at(1, 10.0),
            at(0, 20.0),
            at(2, 30.0),
            at(1, 40.0),
        ];

        let mut accel = AccelStructures::default();

        accel.rebuild(&meshes, &instances);

        let data = accel.data();

        // Both lamps have the same content, so they share a model
        assert_eq!(2, accel.model_count());
        assert_eq!(5, data.instances.len());
        assert_eq!(5, data.transforms.len());
        assert_eq!(3 * 2, data.lights.len());

        let mut prev_instance_id = 0;

        for light in &data.lights {
            let instance = data.instances[light.instance_id as usize];
            let model = data.models[light.model_id as usize];

            assert_eq!(instance.model_id, light.model_id);
            assert!(light.instance_id >= prev_instance_id);
            assert!(light.primitive_id < model.triangle_count);
            assert_eq!(model.light_count, light.lights_in_prim);

            let triangle = data.triangles
                [(model.triangle_offset + light.primitive_id) as usize];

            assert!(data.materials[triangle.material_id() as usize]
                .is_emissive());

            prev_instance_id = light.instance_id;
        }

        for (id, record) in accel.instances().iter().enumerate() {
            assert_eq!(instances[id].mesh, record.mesh);
            assert_eq!(record.model_id, data.instances[id].model_id);
        }

        // Every TLAS leaf refers to a single instance, whose bounds it holds
        let tlas = gpu::BvhView::new(&data.tlas);
        let mut seen = vec![false; instances.len()];

        for node_id in 0..(data.tlas.len() / 2) {
            let node = tlas.node(node_id as u32);

            if node.is_leaf() {
                assert_eq!(1, node.count());
                assert!(!seen[node.first() as usize]);

                seen[node.first() as usize] = true;

                let x = 10.0 * node.first() as f32;

                assert_eq!(vec3(x - 0.5, -0.5, 0.0), node.min);
                assert_eq!(vec3(x + 0.5, 0.5, 0.0), node.max);
            }
        }

        assert!(seen.into_iter().all(|seen| seen));
    }

    #[test]
    fn skips_unknown_meshes() {
        let meshes = vec![lamp()];
        let instances = vec![at(0, 0.0), at(7, 10.0), at(0, 20.0)];
        let mut accel = AccelStructures::default();

        accel.rebuild(&meshes, &instances);

        assert_eq!(2, accel.instances().len());
        assert_eq!(2, accel.data().lights.len() / 2);
        assert_eq!(1, accel.data().lights[2].instance_id);
    }

    #[test]
    fn update() {
        let meshes = vec![wall(), lamp()];
        let mut instances = vec![at(0, 0.0), at(1, 10.0)];
        let mut accel = AccelStructures::default();

        accel.rebuild(&meshes, &instances);
        instances[1] = at(1, 50.0);

        assert!(accel.update(&meshes, &instances));
        assert_eq!(50.5, accel.tlas().bounds().max().x);

        let xform = accel.data().transforms[1];

        assert_eq!(50.0, xform.world_from_object().translation.x);
        assert_eq!(10.0, xform.prev_world_from_object().translation.x);

        instances.push(at(0, 60.0));

        assert!(!accel.update(&meshes, &instances));
    }

    #[test]
    #[should_panic(expected = "scene has no emissive primitives")]
    fn no_lights() {
        let meshes = vec![wall()];
        let instances = vec![at(0, 0.0)];

        AccelStructures::default().rebuild(&meshes, &instances);
    }
}
