use std::marker::PhantomData;

use crate::gpu::GpuContext;

/// How a fullscreen pass binds one of its input textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassInput {
    /// Filterable float colour texture (`texture_2d<f32>`).
    Color,
    /// Depth texture (`texture_depth_2d`), read with `textureLoad` or a comparison sampler.
    Depth,
}

/// A shader drawn over one fullscreen triangle with a typed uniform block.
///
/// Every pass built on this shares one bind group shape:
///
/// ```wgsl
/// @group(0) @binding(0) var<uniform> u: Uniforms;
/// @group(0) @binding(1) var linear_sampler: sampler;
/// @group(0) @binding(2) var shadow_sampler: sampler_comparison;
/// @group(0) @binding(3) var input_0: texture_2d<f32>;   // or texture_depth_2d
/// @group(0) @binding(4) var input_1: ...
/// ```
///
/// The shader's vertex entry `vs` must emit the triangle from `vertex_index`; its fragment
/// entry is `fs`. Shaders may leave any of the samplers unused.
pub struct FullscreenPass<U> {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    linear_sampler: wgpu::Sampler,
    shadow_sampler: wgpu::Sampler,
    inputs: Vec<PassInput>,
    _uniforms: PhantomData<U>,
}

const FIRST_INPUT_BINDING: u32 = 3;

impl<U: bytemuck::Pod> FullscreenPass<U> {
    pub fn new(
        gpu: &GpuContext,
        label: &'static str,
        shader_source: &str,
        inputs: &[PassInput],
        format: wgpu::TextureFormat,
    ) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<U>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Fullscreen Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Fullscreen Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ];
        for (i, input) in inputs.iter().enumerate() {
            let sample_type = match input {
                PassInput::Color => wgpu::TextureSampleType::Float { filterable: true },
                PassInput::Depth => wgpu::TextureSampleType::Depth,
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: FIRST_INPUT_BINDING + i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            label,
            pipeline,
            uniform_buffer,
            bind_group_layout,
            linear_sampler,
            shadow_sampler,
            inputs: inputs.to_vec(),
            _uniforms: PhantomData,
        }
    }

    /// Upload `uniforms`, clear `target` to `clear` and draw the triangle.
    ///
    /// A mismatched input count skips the draw; the target is still cleared.
    pub fn draw(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        inputs: &[&wgpu::TextureView],
        uniforms: &U,
        clear: wgpu::Color,
    ) {
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let bind_group = (inputs.len() == self.inputs.len()).then(|| {
            let mut entries = vec![
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
            ];
            for (i, view) in inputs.iter().copied().enumerate() {
                entries.push(wgpu::BindGroupEntry {
                    binding: FIRST_INPUT_BINDING + i as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                });
            }
            gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(self.label),
                layout: &self.bind_group_layout,
                entries: &entries,
            })
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(bind_group) = bind_group else {
            tracing::debug!(
                pass = self.label,
                expected = self.inputs.len(),
                got = inputs.len(),
                "input count mismatch, draw skipped"
            );
            return;
        };

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
