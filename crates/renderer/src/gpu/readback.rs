use image::imageops::flip_vertical_in_place;

use crate::error::RenderError;
use crate::types::{PixelBuffer, BYTES_PER_PIXEL};

/// Mappable staging buffer sized for one padded copy of the offscreen target.
pub(crate) struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
}

impl ReadbackBuffer {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, RenderError> {
        let unpadded_bytes_per_row = width
            .checked_mul(BYTES_PER_PIXEL as u32)
            .ok_or_else(|| RenderError::invalid_job("render target width overflow"))?;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let size = u64::from(padded_bytes_per_row) * u64::from(height);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadereel readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            buffer,
            width,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        })
    }

    pub fn copy_from(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Blocks until the last copy is visible, then returns it top row first.
    pub fn read(&self, device: &wgpu::Device) -> Result<PixelBuffer, RenderError> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| RenderError::readback(format!("wgpu poll failed: {err}")))?;
        rx.recv()
            .map_err(|_| RenderError::readback("readback channel closed"))?
            .map_err(|err| RenderError::readback(format!("buffer mapping failed: {err}")))?;

        let mapped = slice.get_mapped_range();
        let rows = tight_rows(
            &mapped,
            self.unpadded_bytes_per_row as usize,
            self.padded_bytes_per_row as usize,
            self.height as usize,
        );
        drop(mapped);
        self.buffer.unmap();

        flip_rows(self.width, self.height, rows)
    }

    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

fn tight_rows(mapped: &[u8], row_bytes: usize, padded_row_bytes: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * padded_row_bytes;
        out.extend_from_slice(&mapped[start..start + row_bytes]);
    }
    out
}

/// wgpu copies rows top first with `gl_FragCoord` growing downward. Flipping
/// puts `gl_FragCoord.y == 0` on the last delivered row, matching GL's
/// bottom-left origin, so `fragCoord.y / resolution.y` is brightest at the top.
fn flip_rows(width: u32, height: u32, rows: Vec<u8>) -> Result<PixelBuffer, RenderError> {
    let mut image = image::RgbaImage::from_raw(width, height, rows)
        .ok_or_else(|| RenderError::readback("readback size does not match the target"))?;
    flip_vertical_in_place(&mut image);
    PixelBuffer::new(width, height, image.into_raw())
}
