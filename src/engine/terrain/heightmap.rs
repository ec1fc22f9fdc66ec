//! Heightfield sampling for surface snapping and cursor picking.

use bevy::image::TextureFormatPixelInfo;
use bevy::prelude::*;
use bevy::render::render_resource::TextureFormat;

use super::manifest::TerrainBounds;

/// The active terrain heightfield: the heightmap image plus the world
/// bounds it spans. Replaced wholesale on every terrain switch; absent
/// when the fallback ground plane is in use.
#[derive(Resource, Debug, Clone)]
pub struct TerrainHeightfield {
    pub image: Handle<Image>,
    pub bounds: TerrainBounds,
}

impl TerrainHeightfield {
    /// World-space surface height at `(x, z)`, or `None` outside the
    /// heightfield extent or before the image has data available.
    pub fn height_at(&self, images: &Assets<Image>, x: f32, z: f32) -> Option<f32> {
        let image = images.get(&self.image)?;
        let norm_x = (x - self.bounds.min_x) / (self.bounds.max_x - self.bounds.min_x);
        let norm_z = (z - self.bounds.min_z) / (self.bounds.max_z - self.bounds.min_z);
        if !(0.0..=1.0).contains(&norm_x) || !(0.0..=1.0).contains(&norm_z) {
            return None;
        }
        let normalized = sample_bilinear(image, norm_x, norm_z)?;
        Some(self.bounds.min_y + normalized * (self.bounds.max_y - self.bounds.min_y))
    }
}

/// Supporting-surface height at `(x, z)`: the heightfield when one is
/// loaded and the point is inside it, else the flat ground plane. Every
/// snap and every cursor pick resolves through this one function.
pub fn surface_height_at(
    heightfield: Option<&TerrainHeightfield>,
    images: &Assets<Image>,
    ground_y: f32,
    x: f32,
    z: f32,
) -> f32 {
    heightfield
        .and_then(|hf| hf.height_at(images, x, z))
        .unwrap_or(ground_y)
}

/// Bilinear sample of a heightmap image at normalised coordinates,
/// returning a 0..1 height. Supports the two formats terrain pipelines
/// actually emit: 32-bit float and 8-bit (first channel).
fn sample_bilinear(image: &Image, norm_x: f32, norm_z: f32) -> Option<f32> {
    let data = image.data.as_ref()?;
    let width = image.texture_descriptor.size.width as usize;
    let height = image.texture_descriptor.size.height as usize;
    if width == 0 || height == 0 {
        return None;
    }

    let px = norm_x * (width - 1) as f32;
    let pz = norm_z * (height - 1) as f32;
    let x0 = px.floor() as usize;
    let z0 = pz.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let z1 = (z0 + 1).min(height - 1);
    let wx = px - x0 as f32;
    let wz = pz - z0 as f32;

    let format = image.texture_descriptor.format;
    let h00 = texel_height(data, format, width, x0, z0)?;
    let h10 = texel_height(data, format, width, x1, z0)?;
    let h01 = texel_height(data, format, width, x0, z1)?;
    let h11 = texel_height(data, format, width, x1, z1)?;

    let top = h00 * (1.0 - wx) + h10 * wx;
    let bottom = h01 * (1.0 - wx) + h11 * wx;
    Some(top * (1.0 - wz) + bottom * wz)
}

fn texel_height(
    data: &[u8],
    format: TextureFormat,
    width: usize,
    x: usize,
    z: usize,
) -> Option<f32> {
    match format {
        TextureFormat::R32Float => {
            let offset = (z * width + x) * 4;
            let bytes = data.get(offset..offset + 4)?;
            Some(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        _ => {
            // 8-bit path: first channel of however many the format packs.
            let stride = (format.pixel_size()).max(1);
            let offset = (z * width + x) * stride;
            data.get(offset).map(|b| *b as f32 / 255.0)
        }
    }
}
