use std::path::Path;

use tracing::debug;

use crate::compile::CompiledProgram;
use crate::error::RenderError;
use crate::sequence::FrameRenderer;
use crate::types::{GpuOptions, PixelBuffer, RenderJob};

use super::context::GpuContext;
use super::pipeline::{QuadPipeline, TARGET_FORMAT};
use super::readback::ReadbackBuffer;
use super::uniforms::UniformBuffers;

/// One GPU context, one compiled program, one offscreen target.
///
/// A session serves exactly one render job. Every GPU resource it acquires is
/// released when the session is dropped, whichever way the job ends.
pub struct RenderSession {
    context: GpuContext,
    pipeline: QuadPipeline,
    uniforms: UniformBuffers,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    readback: ReadbackBuffer,
    width: u32,
    height: u32,
    frames_drawn: u64,
}

impl RenderSession {
    pub fn new(
        width: u32,
        height: u32,
        program: &CompiledProgram,
        options: GpuOptions,
    ) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::invalid_job(format!(
                "render target must be non-empty (got {width}x{height})"
            )));
        }

        let context = GpuContext::headless(width, height, options)?;
        let pipeline = QuadPipeline::new(&context.device, program)?;
        let uniforms = UniformBuffers::new(
            &context.device,
            &pipeline.uniform_layout,
            program.uniform_usage(),
        );
        uniforms.write_constants(&context.queue, width, height);

        let target = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadereel offscreen target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let readback = ReadbackBuffer::new(&context.device, width, height)?;

        debug!(
            width,
            height,
            adapter = %context.adapter_profile.name,
            "render session ready"
        );

        Ok(Self {
            context,
            pipeline,
            uniforms,
            target,
            target_view,
            readback,
            width,
            height,
            frames_drawn: 0,
        })
    }

    /// Convenience constructor sized from a job.
    pub fn for_job(
        job: &RenderJob,
        program: &CompiledProgram,
        options: GpuOptions,
    ) -> Result<Self, RenderError> {
        job.validate()?;
        Self::new(job.width, job.height, program, options)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn adapter_name(&self) -> &str {
        &self.context.adapter_profile.name
    }

    /// Renders the shader at `time` seconds and returns the image top row first.
    ///
    /// Blocks until the GPU has finished and the pixels are mapped.
    pub fn draw_frame(&mut self, time: f32) -> Result<PixelBuffer, RenderError> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        self.uniforms.write_time(&self.context.queue, time);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shadereel frame"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadereel pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline.pipeline);
            render_pass.set_bind_group(0, &self.uniforms.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.pipeline.vertex_buffer.slice(..));
            render_pass.draw(0..self.pipeline.vertex_count(), 0..1);
        }
        self.readback.copy_from(&mut encoder, &self.target);
        self.context.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::device(format!(
                "frame at t={time} failed validation: {err}"
            )));
        }

        let frame = self.readback.read(device)?;
        self.frames_drawn += 1;
        Ok(frame)
    }

    /// Renders one frame at `time` and writes it to `path` as PNG.
    pub fn export_still(&mut self, time: f32, path: &Path) -> Result<(), RenderError> {
        let frame = self.draw_frame(time)?;
        frame.save_png(path)?;
        debug!(path = %path.display(), time, "exported still frame");
        Ok(())
    }
}

impl FrameRenderer for RenderSession {
    fn dimensions(&self) -> (u32, u32) {
        RenderSession::dimensions(self)
    }

    fn draw_frame(&mut self, time: f32) -> Result<PixelBuffer, RenderError> {
        RenderSession::draw_frame(self, time)
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.readback.destroy();
        self.uniforms.destroy();
        self.pipeline.vertex_buffer.destroy();
        self.target.destroy();
        debug!(frames = self.frames_drawn, "released render session");
    }
}
