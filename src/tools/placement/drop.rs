//! Palette drag-and-drop placement.
//!
//! The host forwards its drag-over and drop gestures with the serialized
//! palette payload. Drag-over drives the same cell resolution and
//! highlight as a pick-up hover; drop mints a fresh id and commits an
//! `AssetAdded` whose scale derives from the cell's step size, so dropped
//! assets visually fill their cell.

use bevy::prelude::*;

use crate::engine::assets::record::{AssetRecord, Vec3Data};
use crate::engine::camera::viewport_camera::ViewportCamera;
use crate::engine::events::{
    AssetAdded, GridClearHighlight, GridHighlight, PaletteDragMoved, PaletteDropped,
};
use crate::engine::sync::SceneAssets;
use crate::engine::terrain::grid::{GridCell, TerrainGrid};
use crate::engine::terrain::heightmap::{TerrainHeightfield, surface_height_at};
use crate::tools::placement::interaction::{cell_occupied, validate_placement};
use crate::tools::placement::state::{DropPayload, InteractionState, mint_drop_id};

/// Scale that fills a cell: the payload's base scale (default unit)
/// stretched by the cell pitch, with height following the smaller axis.
pub fn cell_filling_scale(payload: &DropPayload, cell: &GridCell) -> Vec3 {
    let base: Vec3 = payload.scale.map(Vec3::from).unwrap_or(Vec3::ONE);
    base * Vec3::new(cell.step_x, cell.step_x.min(cell.step_z), cell.step_z)
}

/// Build the committed record for an accepted drop.
pub fn drop_record(payload: &DropPayload, cell: &GridCell, surface_y: f32) -> AssetRecord {
    AssetRecord {
        id: mint_drop_id(&payload.name),
        model_url: payload.model_url.clone(),
        name: payload.name.clone(),
        position: Vec3Data {
            x: cell.center_x,
            y: surface_y,
            z: cell.center_z,
        },
        rotation: payload.rotation,
        scale: cell_filling_scale(payload, cell).into(),
    }
}

pub fn handle_palette_drag(
    mut drags: EventReader<PaletteDragMoved>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    viewport: Res<ViewportCamera>,
    grid: Option<Res<TerrainGrid>>,
    heightfield: Option<Res<TerrainHeightfield>>,
    images: Res<Assets<Image>>,
    assets: Res<SceneAssets>,
    mut state: ResMut<InteractionState>,
    mut highlight: EventWriter<GridHighlight>,
    mut clear_highlight: EventWriter<GridClearHighlight>,
) {
    let Some(drag) = drags.read().last() else {
        return;
    };
    let (Some(grid), Ok((cam_transform, camera))) = (grid, cameras.single()) else {
        return;
    };
    if DropPayload::parse(&drag.payload_json).is_err() {
        return;
    }

    let cell = viewport
        .cursor_to_surface(drag.cursor, camera, cam_transform, heightfield.as_deref(), &images)
        .and_then(|hit| grid.cell_at(hit.x, hit.z));
    let Some(cell) = cell else {
        if state.highlighted_cell.take().is_some() {
            clear_highlight.write(GridClearHighlight);
        }
        return;
    };

    if state.highlighted_cell == Some(cell.coords()) {
        return;
    }
    state.highlighted_cell = Some(cell.coords());

    let occupied = cell_occupied(&grid, &assets.records, &cell, None);
    let surface_y = surface_height_at(
        heightfield.as_deref(),
        &images,
        grid.ground_y,
        cell.center_x,
        cell.center_z,
    );
    highlight.write(GridHighlight {
        cell,
        occupied,
        surface_y,
    });
}

pub fn handle_palette_drop(
    mut drops: EventReader<PaletteDropped>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    viewport: Res<ViewportCamera>,
    grid: Option<Res<TerrainGrid>>,
    heightfield: Option<Res<TerrainHeightfield>>,
    images: Res<Assets<Image>>,
    assets: Res<SceneAssets>,
    mut state: ResMut<InteractionState>,
    mut added: EventWriter<AssetAdded>,
    mut clear_highlight: EventWriter<GridClearHighlight>,
) {
    let (Some(grid), Ok((cam_transform, camera))) = (grid, cameras.single()) else {
        return;
    };
    for drop in drops.read() {
        let payload = match DropPayload::parse(&drop.payload_json) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("discarding malformed drop payload: {err}");
                continue;
            }
        };

        let Some(hit) =
            viewport.cursor_to_surface(drop.cursor, camera, cam_transform, heightfield.as_deref(), &images)
        else {
            continue;
        };
        // Re-resolve the cell at drop time; occupied or out-of-bounds
        // drops are rejected with no event.
        let Some(cell) =
            validate_placement(&grid, &assets.records, hit.x, hit.z, None).accepted_cell()
        else {
            continue;
        };

        let surface_y = surface_height_at(
            heightfield.as_deref(),
            &images,
            grid.ground_y,
            cell.center_x,
            cell.center_z,
        );
        let record = drop_record(&payload, &cell, surface_y);
        info!("placed {} at cell ({}, {})", record.id, cell.grid_x, cell.grid_z);
        added.write(AssetAdded { record });

        state.highlighted_cell = None;
        clear_highlight.write(GridClearHighlight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> DropPayload {
        DropPayload {
            model_url: "models/barrel.glb".into(),
            name: "barrel".into(),
            rotation: Vec3Data::default(),
            scale: None,
        }
    }

    fn cell() -> GridCell {
        TerrainGrid::new(Vec2::splat(-10.0), Vec2::splat(10.0), 10, 10, 0.0)
            .cell_at(3.1, -4.9)
            .unwrap()
    }

    #[test]
    fn dropped_record_lands_on_the_cell_centre() {
        let record = drop_record(&payload(), &cell(), 1.25);
        assert!(record.id.starts_with("dragdrop-barrel-"));
        assert_eq!(record.position.x, 3.0);
        assert_eq!(record.position.y, 1.25);
        assert_eq!(record.position.z, -5.0);
    }

    #[test]
    fn drop_scale_fills_the_cell() {
        let scale = cell_filling_scale(&payload(), &cell());
        assert_eq!(scale, Vec3::new(2.0, 2.0, 2.0));

        let mut tall = payload();
        tall.scale = Some(Vec3Data { x: 0.5, y: 1.5, z: 0.5 });
        let scale = cell_filling_scale(&tall, &cell());
        assert_eq!(scale, Vec3::new(1.0, 3.0, 1.0));
    }
}
