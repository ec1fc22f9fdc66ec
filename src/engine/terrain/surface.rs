//! Terrain surface mesh construction.

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};

use crate::engine::terrain::grid::TerrainGrid;
use crate::engine::terrain::heightmap::TerrainHeightfield;

/// Triangle-grid resolution of the rendered heightfield surface.
const SURFACE_SEGMENTS: usize = 96;

/// Rendered surface for a loaded heightfield: a subdivided plane with
/// vertex heights sampled from the heightmap.
pub fn build_heightfield_mesh(heightfield: &TerrainHeightfield, images: &Assets<Image>) -> Mesh {
    let bounds = &heightfield.bounds;
    let ground = bounds.ground_height();

    let mut positions: Vec<[f32; 3]> = Vec::with_capacity((SURFACE_SEGMENTS + 1).pow(2));
    let mut uvs: Vec<[f32; 2]> = Vec::with_capacity(positions.capacity());
    for j in 0..=SURFACE_SEGMENTS {
        for i in 0..=SURFACE_SEGMENTS {
            let u = i as f32 / SURFACE_SEGMENTS as f32;
            let v = j as f32 / SURFACE_SEGMENTS as f32;
            let x = bounds.min_x + (bounds.max_x - bounds.min_x) * u;
            let z = bounds.min_z + (bounds.max_z - bounds.min_z) * v;
            let y = heightfield.height_at(images, x, z).unwrap_or(ground);
            positions.push([x, y, z]);
            uvs.push([u, v]);
        }
    }

    let stride = (SURFACE_SEGMENTS + 1) as u32;
    let mut indices: Vec<u32> = Vec::with_capacity(SURFACE_SEGMENTS * SURFACE_SEGMENTS * 6);
    for j in 0..SURFACE_SEGMENTS as u32 {
        for i in 0..SURFACE_SEGMENTS as u32 {
            let a = j * stride + i;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh.compute_smooth_normals();
    mesh
}

/// Flat ground plane matching the fallback grid extent.
pub fn build_ground_plane_mesh(grid: &TerrainGrid) -> Mesh {
    let size = grid.extent_max() - grid.extent_min();
    Mesh::from(Plane3d::default().mesh().size(size.x, size.y))
}
