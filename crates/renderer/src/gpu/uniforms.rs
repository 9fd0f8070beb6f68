use bytemuck::{Pod, Zeroable};

use crate::compile::UniformUsage;
use crate::transpile::StandardUniform;

/// Pointer position fed to `u_mouse`; there is no interactive input.
pub const DEFAULT_MOUSE: [f32; 2] = [0.0, 0.0];

/// One std140 slot. Every standard uniform fits in a single vec4.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct UniformSlot {
    value: [f32; 4],
}

impl UniformSlot {
    pub fn scalar(value: f32) -> Self {
        Self {
            value: [value, 0.0, 0.0, 0.0],
        }
    }

    pub fn vec2(x: f32, y: f32) -> Self {
        Self {
            value: [x, y, 0.0, 0.0],
        }
    }
}

const SLOT_SIZE: wgpu::BufferAddress = std::mem::size_of::<UniformSlot>() as wgpu::BufferAddress;

pub(crate) fn layout_entries() -> [wgpu::BindGroupLayoutEntry; 3] {
    StandardUniform::ALL.map(|uniform| wgpu::BindGroupLayoutEntry {
        binding: uniform.binding(),
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    })
}

/// GPU-side storage for the three standard uniforms.
pub(crate) struct UniformBuffers {
    buffers: [wgpu::Buffer; 3],
    pub bind_group: wgpu::BindGroup,
    usage: UniformUsage,
}

impl UniformBuffers {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, usage: UniformUsage) -> Self {
        let buffers = StandardUniform::ALL.map(|uniform| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(uniform.name()),
                size: SLOT_SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let entries: Vec<wgpu::BindGroupEntry<'_>> = StandardUniform::ALL
            .iter()
            .zip(buffers.iter())
            .map(|(uniform, buffer)| wgpu::BindGroupEntry {
                binding: uniform.binding(),
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("standard uniforms"),
            layout,
            entries: &entries,
        });

        Self {
            buffers,
            bind_group,
            usage,
        }
    }

    /// Writes the values that stay fixed for the whole job.
    pub fn write_constants(&self, queue: &wgpu::Queue, width: u32, height: u32) {
        self.write(
            queue,
            StandardUniform::Resolution,
            UniformSlot::vec2(width as f32, height as f32),
        );
        self.write(
            queue,
            StandardUniform::Mouse,
            UniformSlot::vec2(DEFAULT_MOUSE[0], DEFAULT_MOUSE[1]),
        );
    }

    pub fn write_time(&self, queue: &wgpu::Queue, seconds: f32) {
        self.write(queue, StandardUniform::Time, UniformSlot::scalar(seconds));
    }

    fn write(&self, queue: &wgpu::Queue, uniform: StandardUniform, slot: UniformSlot) {
        if !self.usage.uses(uniform) {
            return;
        }
        // Buffers are created in `StandardUniform::ALL` order, which is binding order.
        let buffer = &self.buffers[uniform.binding() as usize];
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(&slot));
    }

    pub fn destroy(&self) {
        for buffer in &self.buffers {
            buffer.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_one_std140_vec4() {
        assert_eq!(SLOT_SIZE, 16);
        assert_eq!(
            bytemuck::bytes_of(&UniformSlot::vec2(640.0, 360.0)),
            bytemuck::cast_slice::<f32, u8>(&[640.0, 360.0, 0.0, 0.0])
        );
    }

    #[test]
    fn layout_covers_every_standard_binding() {
        let bindings: Vec<u32> = layout_entries().iter().map(|entry| entry.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2]);
    }
}
