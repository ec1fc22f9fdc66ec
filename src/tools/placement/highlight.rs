//! Cursor cell highlight: a single translucent quad at the hovered cell,
//! green when free and red when occupied. Disposed and recreated on every
//! highlight event; no state beyond the current quad entity.

use bevy::prelude::*;

use crate::constants::render_settings::{
    HIGHLIGHT_FREE_COLOR, HIGHLIGHT_OCCUPIED_COLOR, HIGHLIGHT_SURFACE_LIFT,
};
use crate::engine::events::{GridClearHighlight, GridHighlight};

#[derive(Resource, Default)]
pub struct HighlightQuad {
    entity: Option<Entity>,
}

pub fn apply_cell_highlight(
    mut highlights: EventReader<GridHighlight>,
    mut clears: EventReader<GridClearHighlight>,
    mut quad: ResMut<HighlightQuad>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let clear_requested = clears.read().next().is_some();
    let latest = highlights.read().last().cloned();

    // Either path replaces the quad, so the old one always goes first.
    if clear_requested || latest.is_some() {
        if let Some(entity) = quad.entity.take() {
            commands.entity(entity).despawn();
        }
    }

    let Some(GridHighlight {
        cell,
        occupied,
        surface_y,
    }) = latest
    else {
        return;
    };

    let color = if occupied {
        HIGHLIGHT_OCCUPIED_COLOR
    } else {
        HIGHLIGHT_FREE_COLOR
    };

    let entity = commands
        .spawn((
            Mesh3d(meshes.add(Rectangle::new(cell.step_x, cell.step_z))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: color,
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                cull_mode: None,
                ..default()
            })),
            Transform::from_xyz(
                cell.center_x,
                surface_y + HIGHLIGHT_SURFACE_LIFT,
                cell.center_z,
            )
            .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)),
            Name::new("cell_highlight"),
        ))
        .id();
    quad.entity = Some(entity);
}

/// Dispose the quad on terrain switch: the rest of the transient scene is
/// torn down, the highlight follows it.
pub fn clear_highlight_on_terrain_switch(
    mut terrain_switches: EventReader<crate::engine::events::TerrainSelected>,
    mut quad: ResMut<HighlightQuad>,
    mut commands: Commands,
) {
    if terrain_switches.read().next().is_none() {
        return;
    }
    if let Some(entity) = quad.entity.take() {
        commands.entity(entity).despawn();
    }
}
