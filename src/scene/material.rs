use glam::Vec3;

use crate::scene::TextureId;

/// Handle to a material in a [`MaterialLibrary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

/// Surface description used by the scene passes.
#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    Opaque {
        color: Vec3,
        map: Option<TextureId>,
    },
    /// Alpha-blended in the colour pass; `alpha_map` alpha multiplies `opacity`.
    Transparent {
        color: Vec3,
        opacity: f32,
        alpha_map: Option<TextureId>,
    },
    /// Unlit, additive; scaled by the particle brightness setting.
    Emissive { color: Vec3 },
    /// Depth-only stand-in used while the stochastic depth pass draws.
    StochasticDepth {
        opacity: f32,
        alpha_map: Option<TextureId>,
    },
}

/// Draw order bucket in the colour pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenderQueue {
    Opaque,
    Transparent,
    Emissive,
}

impl Material {
    pub fn opaque(color: Vec3) -> Self {
        Material::Opaque { color, map: None }
    }

    pub fn transparent(color: Vec3, opacity: f32) -> Self {
        Material::Transparent {
            color,
            opacity,
            alpha_map: None,
        }
    }

    pub fn emissive(color: Vec3) -> Self {
        Material::Emissive { color }
    }

    pub fn queue(&self) -> RenderQueue {
        match self {
            Material::Opaque { .. } | Material::StochasticDepth { .. } => RenderQueue::Opaque,
            Material::Transparent { .. } => RenderQueue::Transparent,
            Material::Emissive { .. } => RenderQueue::Emissive,
        }
    }

    /// The texture the colour pass samples, if any.
    pub fn texture(&self) -> Option<TextureId> {
        match self {
            Material::Opaque { map, .. } => *map,
            Material::Transparent { alpha_map, .. }
            | Material::StochasticDepth { alpha_map, .. } => *alpha_map,
            Material::Emissive { .. } => None,
        }
    }

    /// The texture whose alpha scales depth coverage. Colour maps never do: an opaque
    /// surface stays fully covered whatever its map's alpha.
    pub fn coverage_map(&self) -> Option<TextureId> {
        match self {
            Material::Transparent { alpha_map, .. }
            | Material::StochasticDepth { alpha_map, .. } => *alpha_map,
            Material::Opaque { .. } | Material::Emissive { .. } => None,
        }
    }

    /// Per-object depth stand-in carrying this material's own opacity and alpha map.
    pub fn stochastic_depth(&self) -> Material {
        match self {
            Material::Transparent {
                opacity, alpha_map, ..
            }
            | Material::StochasticDepth { opacity, alpha_map } => Material::StochasticDepth {
                opacity: *opacity,
                alpha_map: *alpha_map,
            },
            Material::Opaque { .. } | Material::Emissive { .. } => Material::StochasticDepth {
                opacity: 1.0,
                alpha_map: None,
            },
        }
    }

    /// Coverage written by the stochastic depth pass, or `None` if the material does not
    /// occlude fog at all (untagged transparent surfaces and particles).
    pub fn depth_coverage(&self) -> Option<f32> {
        match self {
            Material::Opaque { .. } => Some(1.0),
            Material::StochasticDepth { opacity, .. } => Some(*opacity),
            Material::Transparent { .. } | Material::Emissive { .. } => None,
        }
    }
}

/// Arena of materials with slot reuse, so removing a temporary material never shifts the
/// ids of the others.
#[derive(Debug, Default)]
pub struct MaterialLibrary {
    slots: Vec<Option<Material>>,
    free: Vec<usize>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: Material) -> MaterialId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(material);
                MaterialId(index)
            }
            None => {
                self.slots.push(Some(material));
                MaterialId(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, id: MaterialId) -> Option<Material> {
        let removed = self.slots.get_mut(id.0).and_then(Option::take);
        if removed.is_some() {
            self.free.push(id.0);
        }
        removed
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Number of live materials.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_slots_are_reused() {
        let mut lib = MaterialLibrary::new();
        let a = lib.insert(Material::opaque(Vec3::ONE));
        let b = lib.insert(Material::emissive(Vec3::X));
        assert_eq!(lib.len(), 2);

        assert!(lib.remove(a).is_some());
        assert!(lib.remove(a).is_none());
        assert_eq!(lib.len(), 1);

        let c = lib.insert(Material::transparent(Vec3::Y, 0.5));
        assert_eq!(c, a);
        assert_eq!(lib.get(b), Some(&Material::emissive(Vec3::X)));
    }

    #[test]
    fn depth_stand_in_keeps_opacity_and_alpha_map() {
        let m = Material::Transparent {
            color: Vec3::ONE,
            opacity: 0.3,
            alpha_map: Some(TextureId(2)),
        };
        assert_eq!(
            m.stochastic_depth(),
            Material::StochasticDepth {
                opacity: 0.3,
                alpha_map: Some(TextureId(2)),
            }
        );
        assert_eq!(m.depth_coverage(), None);
        assert_eq!(m.stochastic_depth().depth_coverage(), Some(0.3));
    }

    #[test]
    fn colour_maps_never_thin_out_depth_coverage() {
        let stone = Material::Opaque {
            color: Vec3::ONE,
            map: Some(TextureId(4)),
        };
        assert_eq!(stone.texture(), Some(TextureId(4)));
        assert_eq!(stone.coverage_map(), None);
        assert_eq!(
            stone.stochastic_depth(),
            Material::StochasticDepth {
                opacity: 1.0,
                alpha_map: None,
            }
        );
    }
}
