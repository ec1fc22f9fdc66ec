//! Grid overlay: a line-segment mesh at cell pitch over the terrain
//! extent. Built once per terrain install; the toggle event only flips
//! visibility and never rebuilds the mesh.

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::mesh::PrimitiveTopology;
use bevy::render::view::NoFrustumCulling;

use crate::constants::render_settings::HIGHLIGHT_SURFACE_LIFT;
use crate::engine::events::GridToggle;
use crate::engine::terrain::grid::TerrainGrid;
use crate::engine::terrain::heightmap::TerrainHeightfield;

#[derive(Component)]
pub struct GridOverlay;

/// Segments sampled per grid line so lines follow the heightfield.
const SEGMENTS_PER_LINE: usize = 64;

pub fn spawn_grid_overlay(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    grid: &TerrainGrid,
    heightfield: Option<(&TerrainHeightfield, &Assets<Image>)>,
) {
    let material = materials.add(StandardMaterial {
        base_color: Color::srgba(1.0, 1.0, 1.0, 0.35),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    });

    commands.spawn((
        Mesh3d(meshes.add(build_overlay_mesh(grid, heightfield))),
        MeshMaterial3d(material),
        Transform::IDENTITY,
        Visibility::Visible,
        NoFrustumCulling,
        GridOverlay,
        Name::new("grid_overlay"),
    ));
}

/// Flip overlay visibility on the toggle event.
pub fn toggle_grid_overlay(
    mut events: EventReader<GridToggle>,
    mut overlays: Query<&mut Visibility, With<GridOverlay>>,
) {
    for _ in events.read() {
        for mut visibility in &mut overlays {
            *visibility = match *visibility {
                Visibility::Hidden => Visibility::Visible,
                _ => Visibility::Hidden,
            };
        }
    }
}

fn build_overlay_mesh(
    grid: &TerrainGrid,
    heightfield: Option<(&TerrainHeightfield, &Assets<Image>)>,
) -> Mesh {
    let min = grid.extent_min();
    let max = grid.extent_max();
    let (cells_x, cells_z) = grid.cells();

    let mut vertices: Vec<[f32; 3]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    let sample = |x: f32, z: f32| -> f32 {
        let y = heightfield
            .and_then(|(hf, images)| hf.height_at(images, x, z))
            .unwrap_or(grid.ground_y);
        y + HIGHLIGHT_SURFACE_LIFT
    };

    // Lines of constant X run along Z, and vice versa.
    for i in 0..=cells_x {
        let x = min.x + (max.x - min.x) * i as f32 / cells_x as f32;
        append_line(&mut vertices, &mut indices, |t| {
            let z = min.y + (max.y - min.y) * t;
            [x, sample(x, z), z]
        });
    }
    for j in 0..=cells_z {
        let z = min.y + (max.y - min.y) * j as f32 / cells_z as f32;
        append_line(&mut vertices, &mut indices, |t| {
            let x = min.x + (max.x - min.x) * t;
            [x, sample(x, z), z]
        });
    }

    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::RENDER_WORLD);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, vertices);
    mesh.insert_indices(bevy::render::mesh::Indices::U32(indices));
    mesh
}

fn append_line(
    vertices: &mut Vec<[f32; 3]>,
    indices: &mut Vec<u32>,
    point_at: impl Fn(f32) -> [f32; 3],
) {
    let base = vertices.len() as u32;
    for s in 0..=SEGMENTS_PER_LINE {
        vertices.push(point_at(s as f32 / SEGMENTS_PER_LINE as f32));
    }
    for s in 0..SEGMENTS_PER_LINE as u32 {
        indices.extend_from_slice(&[base + s, base + s + 1]);
    }
}
