use crate::gpu::GpuContext;

/// A sampled GPU texture used as a base-colour map or an opacity (alpha) map.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw RGBA8 data.
    ///
    /// Data is stored as linear `Rgba8Unorm` so that alpha maps reach the stochastic
    /// pass without an sRGB decode.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    /// Load a texture from an image file.
    pub fn from_file(gpu: &GpuContext, path: &str) -> Result<Self, image::ImageError> {
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(gpu, &img, width, height, path))
    }

    /// Load a texture from embedded bytes.
    pub fn from_bytes(
        gpu: &GpuContext,
        bytes: &[u8],
        label: &str,
    ) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(gpu, &img, width, height, label))
    }

    /// 1×1 opaque white, bound wherever a material has no map.
    pub fn white(gpu: &GpuContext) -> Self {
        Self::from_rgba(gpu, &[255, 255, 255, 255], 1, 1, "White Texture")
    }

    /// Procedural opacity map: a checkerboard whose alpha alternates between
    /// `1.0` and `low_alpha`.
    pub fn alpha_checker(gpu: &GpuContext, size: u32, cells: u32, low_alpha: f32) -> Self {
        let data = alpha_checker_pixels(size, cells, low_alpha);
        Self::from_rgba(gpu, &data, size, size, "Alpha Checker Texture")
    }
}

pub(crate) fn alpha_checker_pixels(size: u32, cells: u32, low_alpha: f32) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let low = (low_alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let alpha = if ((x / cell) + (y / cell)) % 2 == 0 { 255 } else { low };
            data.extend_from_slice(&[255, 255, 255, alpha]);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_checker_alternates_cells() {
        let px = alpha_checker_pixels(4, 2, 0.25);
        assert_eq!(px.len(), 4 * 4 * 4);
        let alpha = |x: usize, y: usize| px[(y * 4 + x) * 4 + 3];
        assert_eq!(alpha(0, 0), 255);
        assert_eq!(alpha(2, 0), 64);
        assert_eq!(alpha(0, 2), 64);
        assert_eq!(alpha(3, 3), 255);
    }
}
