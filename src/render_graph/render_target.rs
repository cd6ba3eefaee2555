//! Offscreen render targets and the arena that owns them.

use serde::{Deserialize, Serialize};

use crate::gpu::GpuContext;

/// Handle to a target in a [`TargetPool`].
///
/// [`TargetId::SURFACE`] names the swapchain image, which is never pooled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) usize);

impl TargetId {
    pub const SURFACE: TargetId = TargetId(usize::MAX);

    pub fn is_surface(self) -> bool {
        self == Self::SURFACE
    }
}

/// Divisor applied to the window size for sub-resolution buffers (depth, fog, shadow-free
/// passes). Only 1, 2 and 4 are supported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Downsampling {
    Full,
    #[default]
    Half,
    Quarter,
}

impl Downsampling {
    pub fn factor(self) -> u32 {
        match self {
            Downsampling::Full => 1,
            Downsampling::Half => 2,
            Downsampling::Quarter => 4,
        }
    }

    /// Nearest supported divisor for an arbitrary factor.
    pub fn from_factor(factor: u32) -> Self {
        match factor {
            0..=1 => Downsampling::Full,
            2 => Downsampling::Half,
            3 => Downsampling::Half,
            _ => Downsampling::Quarter,
        }
    }
}

/// Which resolution a target follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetScale {
    /// Window size.
    Full,
    /// Window size divided by the downsampling factor.
    Reduced,
    /// Independent of the window (shadow maps).
    Fixed(u32, u32),
}

/// Window size plus the downsampling divisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub downsampling: Downsampling,
}

impl Resolution {
    pub fn new(width: u32, height: u32, downsampling: Downsampling) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            downsampling,
        }
    }

    pub fn full(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn reduced(&self) -> (u32, u32) {
        let d = self.downsampling.factor();
        ((self.width / d).max(1), (self.height / d).max(1))
    }

    pub fn size_for(&self, scale: TargetScale) -> (u32, u32) {
        match scale {
            TargetScale::Full => self.full(),
            TargetScale::Reduced => self.reduced(),
            TargetScale::Fixed(w, h) => (w, h),
        }
    }
}

/// Static description of a pooled target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetDesc {
    pub label: &'static str,
    pub format: wgpu::TextureFormat,
    pub scale: TargetScale,
}

impl TargetDesc {
    pub const fn new(label: &'static str, format: wgpu::TextureFormat, scale: TargetScale) -> Self {
        Self {
            label,
            format,
            scale,
        }
    }

    pub fn is_depth(&self) -> bool {
        self.format.is_depth_stencil_format()
    }
}

/// An off-screen texture that is rendered into by one pass and sampled by later ones.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new(gpu: &GpuContext, desc: &TargetDesc, (width, height): (u32, u32)) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Reallocate if the size differs. Returns whether a new texture was created.
    pub fn ensure_size(&mut self, gpu: &GpuContext, desc: &TargetDesc, size: (u32, u32)) -> bool {
        if (self.width, self.height) == size {
            return false;
        }
        self.texture.destroy();
        *self = Self::new(gpu, desc, size);
        true
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Arena of every target the pipeline owns, addressed by [`TargetId`].
///
/// Slots are described up front and allocated on the first [`resize`](Self::resize), so
/// a pool that was never sized simply answers `None`.
#[derive(Default)]
pub struct TargetPool {
    descs: Vec<TargetDesc>,
    targets: Vec<Option<RenderTarget>>,
}

impl TargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a new slot. Ids are handed out densely in call order.
    pub fn describe(&mut self, desc: TargetDesc) -> TargetId {
        self.descs.push(desc);
        self.targets.push(None);
        TargetId(self.descs.len() - 1)
    }

    pub fn desc(&self, id: TargetId) -> Option<&TargetDesc> {
        self.descs.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    pub fn is_allocated(&self) -> bool {
        !self.targets.is_empty() && self.targets.iter().all(Option::is_some)
    }

    /// Allocate or resize every slot for `resolution`.
    pub fn resize(&mut self, gpu: &GpuContext, resolution: &Resolution) {
        for (desc, slot) in self.descs.iter().zip(self.targets.iter_mut()) {
            let size = resolution.size_for(desc.scale);
            match slot {
                Some(target) => {
                    if target.ensure_size(gpu, desc, size) {
                        tracing::debug!(target = desc.label, ?size, "resized render target");
                    }
                }
                None => *slot = Some(RenderTarget::new(gpu, desc, size)),
            }
        }
    }

    pub fn get(&self, id: TargetId) -> Option<&RenderTarget> {
        self.targets.get(id.0).and_then(Option::as_ref)
    }

    pub fn view(&self, id: TargetId) -> Option<&wgpu::TextureView> {
        self.get(id).map(|t| &t.view)
    }

    /// Destroy every allocated texture. Descriptions are kept, so a later
    /// [`resize`](Self::resize) reallocates.
    pub fn release(&mut self) {
        for slot in &mut self.targets {
            if let Some(target) = slot.take() {
                target.texture.destroy();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduced_size_divides_and_never_reaches_zero() {
        let res = Resolution::new(800, 600, Downsampling::Half);
        assert_eq!(res.reduced(), (400, 300));
        let tiny = Resolution::new(3, 2, Downsampling::Quarter);
        assert_eq!(tiny.reduced(), (1, 1));
        assert_eq!(res.size_for(TargetScale::Fixed(1024, 1024)), (1024, 1024));
    }

    #[test]
    fn unsupported_factors_snap_to_supported_ones() {
        assert_eq!(Downsampling::from_factor(0), Downsampling::Full);
        assert_eq!(Downsampling::from_factor(3), Downsampling::Half);
        assert_eq!(Downsampling::from_factor(16), Downsampling::Quarter);
        for d in [Downsampling::Full, Downsampling::Half, Downsampling::Quarter] {
            assert_eq!(Downsampling::from_factor(d.factor()), d);
        }
    }

    #[test]
    fn describing_slots_hands_out_dense_ids() {
        let mut pool = TargetPool::new();
        let a = pool.describe(TargetDesc::new(
            "a",
            wgpu::TextureFormat::Rgba16Float,
            TargetScale::Full,
        ));
        let b = pool.describe(TargetDesc::new(
            "b",
            wgpu::TextureFormat::Depth32Float,
            TargetScale::Reduced,
        ));
        assert_eq!((a, b), (TargetId(0), TargetId(1)));
        assert!(pool.desc(b).is_some_and(TargetDesc::is_depth));
        assert!(!pool.is_allocated());
        assert!(pool.view(a).is_none());
    }
}
