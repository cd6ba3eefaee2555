//! Geometry passes over the scene: shadow depth, stochastic depth and colour.
//!
//! All three share one vertex layout and one set of bind groups:
//! - **Group 0**: [`FrameUniforms`] (matrices, light, dither thresholds)
//! - **Group 1**: [`ObjectUniforms`] at a dynamic offset, one slot per draw
//! - **Group 2**: material texture and sampler (not used by the shadow pass)
//! - **Group 3**: shadow map and comparison sampler (colour pass only)
//!
//! Each pass owns its uniform buffers. Queue writes land before the command buffer
//! executes, so passes in one frame must never share a buffer.

use std::collections::HashMap;
use std::num::NonZeroU64;

use glam::Mat4;

use crate::gpu::GpuContext;
use crate::mesh::Vertex3d;
use crate::pipeline::DEPTH_FORMAT;
use crate::scene::{DrawItem, Material, RenderQueue, Scene, TextureId};
use crate::stochastic::MAX_DITHER_CELLS;
use crate::texture::Texture;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub shadow_matrix: [[f32; 4]; 4],
    /// xyz, w = time
    pub camera_position: [f32; 4],
    /// xyz, w = intensity
    pub light_direction: [f32; 4],
    /// rgb, w = 1 when the shadow map is valid
    pub light_color: [f32; 4],
    pub dither: [[f32; 4]; MAX_DITHER_CELLS / 4],
    /// edge length, jitter index, half step, particle brightness
    pub dither_params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// rgb, a = opacity (coverage in the depth passes)
    pub color: [f32; 4],
    /// x = material kind
    pub params: [f32; 4],
}

impl ObjectUniforms {
    /// Uniforms for `material`, or `None` if `kind` does not draw it.
    pub fn for_item(kind: ScenePassKind, model: Mat4, material: &Material) -> Option<Self> {
        let (color, opacity, code) = match (kind, material) {
            (ScenePassKind::Shadow, Material::Opaque { .. }) => ([1.0; 3], 1.0, 0.0),
            (ScenePassKind::Shadow, _) => return None,
            (ScenePassKind::StochasticDepth, m) => ([1.0; 3], m.depth_coverage()?, 3.0),
            (ScenePassKind::Color, Material::Opaque { color, .. }) => (color.to_array(), 1.0, 0.0),
            (ScenePassKind::Color, Material::Transparent { color, opacity, .. }) => {
                (color.to_array(), *opacity, 1.0)
            }
            (ScenePassKind::Color, Material::Emissive { color }) => (color.to_array(), 1.0, 2.0),
            (ScenePassKind::Color, Material::StochasticDepth { .. }) => return None,
        };
        Some(Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            color: [color[0], color[1], color[2], opacity],
            params: [code, 0.0, 0.0, 0.0],
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenePassKind {
    /// Depth from the light; opaque casters only.
    Shadow,
    /// Dithered depth for the fog march.
    StochasticDepth,
    /// Lit colour with native blending.
    Color,
}

impl ScenePassKind {
    fn label(self) -> &'static str {
        match self {
            ScenePassKind::Shadow => "Shadow Pass",
            ScenePassKind::StochasticDepth => "Stochastic Depth Pass",
            ScenePassKind::Color => "Scene Color Pass",
        }
    }

    /// Texture a draw of `material` samples in this pass; `None` binds plain white.
    ///
    /// The depth pass only reads coverage, so it never sees an opaque colour map.
    pub fn sampled_texture(self, material: &Material) -> Option<TextureId> {
        match self {
            ScenePassKind::Shadow => None,
            ScenePassKind::StochasticDepth => material.coverage_map(),
            ScenePassKind::Color => material.texture(),
        }
    }
}

/// Render target attachments for one scene draw.
pub struct SceneTargets<'a> {
    pub color: Option<&'a wgpu::TextureView>,
    pub depth: &'a wgpu::TextureView,
    pub shadow_map: Option<&'a wgpu::TextureView>,
}

pub struct ScenePass {
    kind: ScenePassKind,
    pipelines: Vec<(RenderQueue, wgpu::RenderPipeline)>,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_stride: u64,
    object_capacity: usize,
    texture_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    shadow_sampler: wgpu::Sampler,
    default_texture: Texture,
    material_groups: HashMap<Option<TextureId>, wgpu::BindGroup>,
}

const INITIAL_OBJECT_CAPACITY: usize = 64;

impl ScenePass {
    pub fn new(gpu: &GpuContext, kind: ScenePassKind, color_format: wgpu::TextureFormat) -> Self {
        let device = &gpu.device;
        let label = kind.label();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: match kind {
                ScenePassKind::Color => {
                    wgpu::ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into())
                }
                _ => wgpu::ShaderSource::Wgsl(include_str!("../shaders/depth.wgsl").into()),
            },
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<ObjectUniforms>() as u64),
                },
                count: None,
            }],
        });

        let object_stride = object_stride(gpu.uniform_alignment());
        let (object_buffer, object_bind_group) = Self::create_object_storage(
            gpu,
            &object_layout,
            object_stride,
            INITIAL_OBJECT_CAPACITY,
        );

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let default_texture = Texture::white(gpu);

        let layouts: Vec<&wgpu::BindGroupLayout> = match kind {
            ScenePassKind::Shadow => vec![&frame_layout, &object_layout],
            ScenePassKind::StochasticDepth => vec![&frame_layout, &object_layout, &texture_layout],
            ScenePassKind::Color => {
                vec![&frame_layout, &object_layout, &texture_layout, &shadow_layout]
            }
        };
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        });

        let pipelines = match kind {
            ScenePassKind::Shadow => vec![(
                RenderQueue::Opaque,
                depth_pipeline(gpu, &pipeline_layout, &shader, None),
            )],
            ScenePassKind::StochasticDepth => vec![(
                RenderQueue::Opaque,
                depth_pipeline(gpu, &pipeline_layout, &shader, Some("fs_stochastic")),
            )],
            ScenePassKind::Color => [
                (RenderQueue::Opaque, wgpu::BlendState::REPLACE, true),
                (RenderQueue::Transparent, wgpu::BlendState::ALPHA_BLENDING, false),
                (RenderQueue::Emissive, ADDITIVE, false),
            ]
            .into_iter()
            .map(|(queue, blend, depth_write)| {
                let pipeline = color_pipeline(
                    gpu,
                    &pipeline_layout,
                    &shader,
                    color_format,
                    blend,
                    depth_write,
                );
                (queue, pipeline)
            })
            .collect(),
        };

        Self {
            kind,
            pipelines,
            frame_buffer,
            frame_bind_group,
            object_layout,
            object_buffer,
            object_bind_group,
            object_stride,
            object_capacity: INITIAL_OBJECT_CAPACITY,
            texture_layout,
            shadow_layout,
            shadow_sampler,
            default_texture,
            material_groups: HashMap::new(),
        }
    }

    /// Forget cached texture bind groups. Texture ids are per scene, so this must run
    /// whenever a different scene is bound.
    pub fn clear_material_cache(&mut self) {
        self.material_groups.clear();
    }

    fn create_object_storage(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniforms"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<ObjectUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn ensure_capacity(&mut self, gpu: &GpuContext, count: usize) {
        if count <= self.object_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        let (buffer, bind_group) =
            Self::create_object_storage(gpu, &self.object_layout, self.object_stride, capacity);
        self.object_buffer.destroy();
        self.object_buffer = buffer;
        self.object_bind_group = bind_group;
        self.object_capacity = capacity;
        tracing::debug!(pass = self.kind.label(), capacity, "grew object uniform buffer");
    }

    fn cache_material_group(&mut self, gpu: &GpuContext, scene: &Scene, key: Option<TextureId>) {
        if self.material_groups.contains_key(&key) {
            return;
        }
        let texture = key
            .and_then(|id| scene.texture(id))
            .unwrap_or(&self.default_texture);
        let group = material_bind_group(gpu, &self.texture_layout, texture);
        self.material_groups.insert(key, group);
    }

    /// Draw `items` from `scene` into `targets`.
    ///
    /// Items whose mesh or material is missing, or whose material this pass does not draw,
    /// are skipped.
    pub fn draw(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        items: &[DrawItem],
        frame: &FrameUniforms,
        targets: SceneTargets,
    ) {
        let draws: Vec<(&DrawItem, &Material, ObjectUniforms)> = items
            .iter()
            .filter_map(|item| {
                scene.mesh(item.mesh)?;
                let material = scene.materials.get(item.material)?;
                let uniforms = ObjectUniforms::for_item(self.kind, item.model, material)?;
                Some((item, material, uniforms))
            })
            .collect();

        self.ensure_capacity(gpu, draws.len().max(1));
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(frame));
        let stride = self.object_stride as usize;
        let mut staging = vec![0u8; stride * draws.len()];
        for (i, (_, _, uniforms)) in draws.iter().enumerate() {
            let bytes = bytemuck::bytes_of(uniforms);
            staging[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
        }
        if !staging.is_empty() {
            gpu.queue.write_buffer(&self.object_buffer, 0, &staging);
        }

        let textured = self.kind != ScenePassKind::Shadow;
        let texture_keys: Vec<Option<TextureId>> = draws
            .iter()
            .map(|(_, material, _)| {
                self.kind
                    .sampled_texture(material)
                    .filter(|id| scene.texture(*id).is_some())
            })
            .collect();
        if textured {
            for &key in &texture_keys {
                self.cache_material_group(gpu, scene, key);
            }
        }

        let shadow_group = match (self.kind, targets.shadow_map) {
            (ScenePassKind::Color, Some(view)) => Some(gpu.device.create_bind_group(
                &wgpu::BindGroupDescriptor {
                    label: Some("Shadow Bind Group"),
                    layout: &self.shadow_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                        },
                    ],
                },
            )),
            (ScenePassKind::Color, None) => {
                tracing::debug!("colour pass has no shadow map bound, skipped");
                return;
            }
            _ => None,
        };

        // depth-only pipelines declare no colour targets, so the pass must not either
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = targets
            .color
            .map(|view| wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
            .into_iter()
            .map(Some)
            .collect();

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.kind.label()),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
        if let Some(group) = &shadow_group {
            render_pass.set_bind_group(3, group, &[]);
        }

        let mut bound_queue = None;
        for (i, (item, material, _)) in draws.iter().enumerate() {
            let Some(mesh) = scene.mesh(item.mesh) else {
                continue;
            };
            let queue = match self.kind {
                ScenePassKind::Color => material.queue(),
                _ => RenderQueue::Opaque,
            };
            if bound_queue != Some(queue) {
                let Some((_, pipeline)) = self.pipelines.iter().find(|(q, _)| *q == queue) else {
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                bound_queue = Some(queue);
            }

            let offset = (i as u64 * self.object_stride) as u32;
            render_pass.set_bind_group(1, &self.object_bind_group, &[offset]);
            if textured {
                let key = texture_keys.get(i).copied().flatten();
                if let Some(group) = self.material_groups.get(&key) {
                    render_pass.set_bind_group(2, group, &[]);
                }
            }
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

fn material_bind_group(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
) -> wgpu::BindGroup {
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Material Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    })
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Dynamic-offset stride for one [`ObjectUniforms`] slot.
pub fn object_stride(alignment: u64) -> u64 {
    let size = std::mem::size_of::<ObjectUniforms>() as u64;
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

fn depth_pipeline(
    gpu: &GpuContext,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    fragment_entry: Option<&'static str>,
) -> wgpu::RenderPipeline {
    let shadow = fragment_entry.is_none();
    gpu.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(if shadow { "Shadow Pipeline" } else { "Stochastic Depth Pipeline" }),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: fragment_entry.map(|entry| wgpu::FragmentState {
                module: shader,
                entry_point: Some(entry),
                targets: &[],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: if shadow {
                    wgpu::DepthBiasState {
                        constant: 2,
                        slope_scale: 2.0,
                        clamp: 0.0,
                    }
                } else {
                    wgpu::DepthBiasState::default()
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
}

fn color_pipeline(
    gpu: &GpuContext,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    depth_write: bool,
) -> wgpu::RenderPipeline {
    gpu.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Color Pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_write,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn uniform_blocks_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 448);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 160);
    }

    #[test]
    fn stride_respects_offset_alignment() {
        assert_eq!(object_stride(256), 256);
        assert_eq!(object_stride(64), 192);
        assert_eq!(object_stride(0), 160);
    }

    #[test]
    fn each_pass_draws_only_its_materials() {
        let model = Mat4::IDENTITY;
        let opaque = Material::opaque(Vec3::ONE);
        let glass = Material::transparent(Vec3::ONE, 0.4);
        let spark = Material::emissive(Vec3::X);
        let stand_in = glass.stochastic_depth();

        assert!(ObjectUniforms::for_item(ScenePassKind::Shadow, model, &opaque).is_some());
        assert!(ObjectUniforms::for_item(ScenePassKind::Shadow, model, &glass).is_none());

        let depth = |m: &Material| {
            ObjectUniforms::for_item(ScenePassKind::StochasticDepth, model, m).map(|u| u.color[3])
        };
        assert_eq!(depth(&opaque), Some(1.0));
        assert_eq!(depth(&stand_in), Some(0.4));
        assert_eq!(depth(&glass), None);
        assert_eq!(depth(&spark), None);

        let color = ObjectUniforms::for_item(ScenePassKind::Color, model, &spark);
        assert_eq!(color.map(|u| u.params[0]), Some(2.0));
    }

    #[test]
    fn textured_opaque_meshes_keep_full_depth_coverage() {
        let stone = Material::Opaque {
            color: Vec3::ONE,
            map: Some(TextureId(1)),
        };
        let glass = Material::Transparent {
            color: Vec3::ONE,
            opacity: 0.5,
            alpha_map: Some(TextureId(2)),
        };
        let model = Mat4::IDENTITY;

        let depth = ScenePassKind::StochasticDepth;
        assert_eq!(depth.sampled_texture(&stone), None);
        assert_eq!(
            ObjectUniforms::for_item(depth, model, &stone).map(|u| u.color[3]),
            Some(1.0)
        );
        assert_eq!(depth.sampled_texture(&glass.stochastic_depth()), Some(TextureId(2)));

        assert_eq!(ScenePassKind::Color.sampled_texture(&stone), Some(TextureId(1)));
        assert_eq!(ScenePassKind::Shadow.sampled_texture(&glass), None);
    }
}
