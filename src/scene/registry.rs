//! Transparent-object bookkeeping for the stochastic depth pass.

use hecs::Entity;

use crate::scene::{MaterialId, MaterialSlot, Scene, StochasticTransparency};

/// Entities tagged [`StochasticTransparency`], cached per scene generation.
#[derive(Debug, Default)]
pub struct TransparentRegistry {
    entities: Vec<Entity>,
    generation: Option<u64>,
}

impl TransparentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(&mut self, scene: &Scene) {
        self.entities = scene
            .world
            .query::<&StochasticTransparency>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        self.generation = Some(scene.generation());
        tracing::debug!(count = self.entities.len(), "rebuilt transparent registry");
    }

    /// Rebuild only when the scene changed structurally. Returns whether it did.
    pub fn refresh(&mut self, scene: &Scene) -> bool {
        if self.generation == Some(scene.generation()) {
            return false;
        }
        self.rebuild(scene);
        true
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.generation = None;
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Swaps every registered entity's material for a per-object
/// [`Material::StochasticDepth`](crate::Material::StochasticDepth) stand-in for as long as
/// the guard lives.
///
/// Dropping the guard (including during unwinding) puts each entity's original material
/// back and removes the stand-ins from the library.
pub struct MaterialSubstitution<'a> {
    scene: &'a mut Scene,
    saved: Vec<(Entity, MaterialId)>,
    instances: Vec<MaterialId>,
}

impl<'a> MaterialSubstitution<'a> {
    pub fn apply(scene: &'a mut Scene, registry: &TransparentRegistry) -> Self {
        let mut saved = Vec::with_capacity(registry.len());
        let mut instances = Vec::with_capacity(registry.len());

        for &entity in registry.entities() {
            let Ok(mut slot) = scene.world.get::<&mut MaterialSlot>(entity) else {
                continue;
            };
            let original = slot.0;
            let Some(stand_in) = scene.materials.get(original).map(|m| m.stochastic_depth()) else {
                continue;
            };
            let instance = scene.materials.insert(stand_in);
            slot.0 = instance;
            saved.push((entity, original));
            instances.push(instance);
        }

        Self {
            scene,
            saved,
            instances,
        }
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    pub fn substituted(&self) -> usize {
        self.saved.len()
    }
}

impl Drop for MaterialSubstitution<'_> {
    fn drop(&mut self) {
        for (entity, original) in self.saved.drain(..) {
            if let Ok(mut slot) = self.scene.world.get::<&mut MaterialSlot>(entity) {
                slot.0 = original;
            }
        }
        for id in self.instances.drain(..) {
            self.scene.materials.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Transform;
    use crate::scene::{Material, MeshId};
    use glam::Vec3;

    fn scene_with_glass() -> (Scene, Vec<(Entity, MaterialId)>) {
        let mut scene = Scene::new();
        let floor = scene.add_material(Material::opaque(Vec3::splat(0.5)));
        let glass = scene.add_material(Material::transparent(Vec3::ONE, 0.25));
        let tinted = scene.add_material(Material::transparent(Vec3::X, 0.75));

        let a = scene.spawn(Transform::new(), MeshId(0), floor);
        let b = scene.spawn_transparent(Transform::new(), MeshId(0), glass);
        let c = scene.spawn_transparent(Transform::new(), MeshId(0), tinted);
        (scene, vec![(a, floor), (b, glass), (c, tinted)])
    }

    fn material_of(scene: &Scene, entity: Entity) -> MaterialId {
        scene
            .world
            .get::<&MaterialSlot>(entity)
            .map(|slot| slot.0)
            .unwrap()
    }

    #[test]
    fn registry_tracks_tagged_entities_per_generation() {
        let (mut scene, entities) = scene_with_glass();
        let mut registry = TransparentRegistry::new();
        assert!(registry.refresh(&scene));
        assert_eq!(registry.len(), 2);
        assert!(!registry.refresh(&scene));

        scene.set_stochastic(entities[0].0, true);
        assert!(registry.refresh(&scene));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn substitution_uses_per_object_opacity() {
        let (mut scene, entities) = scene_with_glass();
        let mut registry = TransparentRegistry::new();
        registry.rebuild(&scene);

        let guard = MaterialSubstitution::apply(&mut scene, &registry);
        assert_eq!(guard.substituted(), 2);
        let s = guard.scene();
        let opacities: Vec<_> = entities[1..]
            .iter()
            .map(|(e, _)| s.materials.get(material_of(s, *e)).and_then(Material::depth_coverage))
            .collect();
        assert_eq!(opacities, vec![Some(0.25), Some(0.75)]);
        assert_eq!(material_of(s, entities[0].0), entities[0].1);
    }

    #[test]
    fn dropping_the_guard_restores_materials_and_library_size() {
        let (mut scene, entities) = scene_with_glass();
        let mut registry = TransparentRegistry::new();
        registry.rebuild(&scene);
        let before = scene.materials.len();

        {
            let guard = MaterialSubstitution::apply(&mut scene, &registry);
            assert_eq!(guard.scene().materials.len(), before + 2);
        }

        assert_eq!(scene.materials.len(), before);
        for (entity, original) in entities {
            assert_eq!(material_of(&scene, entity), original);
        }
    }

    #[test]
    fn restoration_survives_a_panic() {
        let (mut scene, entities) = scene_with_glass();
        let mut registry = TransparentRegistry::new();
        registry.rebuild(&scene);
        let before = scene.materials.len();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = MaterialSubstitution::apply(&mut scene, &registry);
            panic!("draw failed");
        }));
        assert!(result.is_err());

        assert_eq!(scene.materials.len(), before);
        for (entity, original) in entities {
            assert_eq!(material_of(&scene, entity), original);
        }
    }

    #[test]
    fn despawned_entities_are_skipped() {
        let (mut scene, entities) = scene_with_glass();
        let mut registry = TransparentRegistry::new();
        registry.rebuild(&scene);
        assert!(scene.despawn(entities[1].0));
        assert_eq!(registry.len(), 2);

        let guard = MaterialSubstitution::apply(&mut scene, &registry);
        assert_eq!(guard.substituted(), 1);
    }
}
