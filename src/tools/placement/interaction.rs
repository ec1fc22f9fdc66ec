//! Pointer interaction: click-to-select, pick-up move commits, and hover
//! highlighting while an asset is picked up.
//!
//! Placement validity is an explicit query returning a result variant,
//! never a second event: callers decide what to render or emit from the
//! returned value, and rejected placements emit nothing at all.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::engine::assets::record::AssetRecord;
use crate::engine::assets::registry::AssetRegistry;
use crate::engine::assets::snapping::ModelFootprint;
use crate::engine::camera::viewport_camera::ViewportCamera;
use crate::engine::events::{
    AssetMoveFinished, AssetMoveStarted, AssetSelected, AssetUpdated, GridClearHighlight,
    GridHighlight, PickUpRequested,
};
use crate::engine::sync::SceneAssets;
use crate::engine::terrain::grid::{GridCell, TerrainGrid};
use crate::engine::terrain::heightmap::{TerrainHeightfield, surface_height_at};
use crate::tools::placement::gizmo::TransformGizmoState;
use crate::tools::placement::ray::ray_hits_instance;
use crate::tools::placement::state::{InteractionMode, InteractionState};

/// Outcome of asking whether a world point can take a placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementOutcome {
    Accepted(GridCell),
    RejectedOccupied(GridCell),
    RejectedOutOfBounds,
}

impl PlacementOutcome {
    pub fn accepted_cell(&self) -> Option<GridCell> {
        match self {
            PlacementOutcome::Accepted(cell) => Some(*cell),
            _ => None,
        }
    }
}

/// Occupancy check against the committed record list: a cell hosts at
/// most one asset. `exclude` skips the asset currently being moved.
pub fn cell_occupied(
    grid: &TerrainGrid,
    records: &[AssetRecord],
    cell: &GridCell,
    exclude: Option<&str>,
) -> bool {
    records.iter().any(|record| {
        if Some(record.id.as_str()) == exclude {
            return false;
        }
        grid.cell_at(record.position.x, record.position.z)
            .is_some_and(|c| c.coords() == cell.coords())
    })
}

/// Resolve a world point to a cell and validate occupancy in one step.
/// Both the hover highlight and the final commit go through this, so the
/// cell shown during the gesture is the cell committed on release.
pub fn validate_placement(
    grid: &TerrainGrid,
    records: &[AssetRecord],
    world_x: f32,
    world_z: f32,
    exclude: Option<&str>,
) -> PlacementOutcome {
    let Some(cell) = grid.cell_at(world_x, world_z) else {
        return PlacementOutcome::RejectedOutOfBounds;
    };
    if cell_occupied(grid, records, &cell, exclude) {
        PlacementOutcome::RejectedOccupied(cell)
    } else {
        PlacementOutcome::Accepted(cell)
    }
}

/// Validity query for drop affordances, decoupled from any presentation.
pub fn can_drop(grid: &TerrainGrid, records: &[AssetRecord], world_x: f32, world_z: f32) -> bool {
    matches!(
        validate_placement(grid, records, world_x, world_z, None),
        PlacementOutcome::Accepted(_)
    )
}

/// Host asked for a pick-up of a (usually selected) asset.
pub fn handle_pick_up_requests(
    mut requests: EventReader<PickUpRequested>,
    mut state: ResMut<InteractionState>,
    registry: Res<AssetRegistry>,
    mut move_started: EventWriter<AssetMoveStarted>,
) {
    for PickUpRequested { id } in requests.read() {
        if !registry.contains(id) {
            warn!("pick-up requested for unknown asset {id}");
            continue;
        }
        state.mode = InteractionMode::PickedUp(id.clone());
        move_started.write(AssetMoveStarted { id: id.clone() });
    }
}

/// Click handling: commit a pick-up move, or select whatever was hit.
pub fn handle_click(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    viewport: Res<ViewportCamera>,
    gizmo: Res<TransformGizmoState>,
    grid: Option<Res<TerrainGrid>>,
    heightfield: Option<Res<TerrainHeightfield>>,
    images: Res<Assets<Image>>,
    registry: Res<AssetRegistry>,
    assets: Res<SceneAssets>,
    instances: Query<(&GlobalTransform, Option<&ModelFootprint>)>,
    mut state: ResMut<InteractionState>,
    mut updated: EventWriter<AssetUpdated>,
    mut selected_events: EventWriter<AssetSelected>,
    mut move_finished: EventWriter<AssetMoveFinished>,
    mut clear_highlight: EventWriter<GridClearHighlight>,
) {
    if !buttons.just_pressed(MouseButton::Left) || gizmo.dragging.is_some() {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor_pos) = window.cursor_position() else {
        return;
    };
    let Ok((cam_transform, camera)) = cameras.single() else {
        return;
    };

    // Commit path: a second click while picked up drops the asset into
    // the hovered cell, silently rejecting occupied or out-of-bounds.
    if let Some(id) = state.picked_id().map(str::to_string) {
        let Some(grid) = grid else { return };
        let Some(hit) =
            viewport.cursor_to_surface(cursor_pos, camera, cam_transform, heightfield.as_deref(), &images)
        else {
            return;
        };
        let outcome = validate_placement(&grid, &assets.records, hit.x, hit.z, Some(&id));
        let Some(cell) = outcome.accepted_cell() else {
            return;
        };

        let surface = surface_height_at(
            heightfield.as_deref(),
            &images,
            grid.ground_y,
            cell.center_x,
            cell.center_z,
        );
        // Y is re-derived from the surface, never carried from input.
        let y = registry
            .root_of(&id)
            .and_then(|root| instances.get(root).ok())
            .map(|(transform, footprint)| match footprint {
                Some(fp) => fp.snapped_y(surface, transform.compute_transform().scale.y),
                None => surface,
            })
            .unwrap_or(surface);

        updated.write(AssetUpdated {
            id: id.clone(),
            position: Some(Vec3::new(cell.center_x, y, cell.center_z)),
            rotation: None,
            scale: None,
            from_gizmo: false,
        });
        move_finished.write(AssetMoveFinished { id });
        state.cancel();
        clear_highlight.write(GridClearHighlight);
        return;
    }

    // Selection path: nearest instance under the cursor, if any.
    let Ok(ray) = camera.viewport_to_world(cam_transform, cursor_pos) else {
        return;
    };
    let origin = ray.origin;
    let direction = ray.direction.as_vec3();

    let mut best: Option<(&str, f32)> = None;
    for (id, entry) in registry.iter() {
        let Ok((transform, footprint)) = instances.get(entry.root) else {
            continue;
        };
        let (min, max) = match footprint {
            Some(fp) => (fp.min, fp.max),
            // Placeholder instances are not yet pickable.
            None => continue,
        };
        if let Some(t) = ray_hits_instance(origin, direction, transform, min, max) {
            if best.is_none() || t < best.unwrap().1 {
                best = Some((id, t));
            }
        }
    }

    match best {
        Some((id, _)) => {
            if state.selected_id() != Some(id) {
                state.mode = InteractionMode::Selected(id.to_string());
                selected_events.write(AssetSelected { id: Some(id.to_string()) });
            }
        }
        None => {
            if state.selected_id().is_some() {
                state.cancel();
                selected_events.write(AssetSelected { id: None });
            }
        }
    }
}

/// While picked up, re-highlight the hovered cell whenever it changes.
pub fn hover_highlight_while_picked(
    windows: Query<&Window, With<PrimaryWindow>>,
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
    let Some(id) = state.picked_id().map(str::to_string) else {
        return;
    };
    let (Some(grid), Ok(window), Ok((cam_transform, camera))) =
        (grid, windows.single(), cameras.single())
    else {
        return;
    };
    let Some(cursor_pos) = window.cursor_position() else {
        return;
    };

    let hit =
        viewport.cursor_to_surface(cursor_pos, camera, cam_transform, heightfield.as_deref(), &images);
    let cell = hit.and_then(|h| grid.cell_at(h.x, h.z));
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

    let occupied = cell_occupied(&grid, &assets.records, &cell, Some(&id));
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

/// Selection and pick-up state must never outlive the instance: when a
/// deletion (or a scene clear) removes the referenced id, fall back to
/// `Idle` and notify the host of the selection change.
pub fn drop_stale_interaction(
    registry: Res<AssetRegistry>,
    mut state: ResMut<InteractionState>,
    mut selected_events: EventWriter<AssetSelected>,
    mut clear_highlight: EventWriter<GridClearHighlight>,
) {
    let Some(id) = state.selected_id() else {
        return;
    };
    if registry.contains(id) {
        return;
    }
    let was_picked = state.picked_id().is_some();
    state.cancel();
    selected_events.write(AssetSelected { id: None });
    if was_picked {
        clear_highlight.write(GridClearHighlight);
    }
}

/// Escape aborts a pick-up gesture without emitting any mutation event.
pub fn cancel_on_escape(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<InteractionState>,
    mut clear_highlight: EventWriter<GridClearHighlight>,
) {
    if !keyboard.just_pressed(KeyCode::Escape) {
        return;
    }
    if state.picked_id().is_some() {
        state.cancel();
        clear_highlight.write(GridClearHighlight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::record::Vec3Data;

    fn grid() -> TerrainGrid {
        TerrainGrid::new(Vec2::splat(-10.0), Vec2::splat(10.0), 10, 10, 0.0)
    }

    fn record_at(id: &str, x: f32, z: f32) -> AssetRecord {
        AssetRecord {
            id: id.into(),
            model_url: "models/barrel.glb".into(),
            name: "barrel".into(),
            position: Vec3Data { x, y: 0.0, z },
            rotation: Vec3Data::default(),
            scale: Vec3Data { x: 1.0, y: 1.0, z: 1.0 },
        }
    }

    #[test]
    fn occupied_cell_is_rejected() {
        let grid = grid();
        let records = vec![record_at("a", 3.0, -5.0)];
        // Same cell as the existing record (cells are 2 units wide).
        let outcome = validate_placement(&grid, &records, 3.9, -4.1, None);
        assert_eq!(
            outcome,
            PlacementOutcome::RejectedOccupied(grid.cell_at(3.9, -4.1).unwrap())
        );
        assert!(!can_drop(&grid, &records, 3.9, -4.1));
        // The neighbouring cell is free.
        assert!(can_drop(&grid, &records, 5.1, -4.1));
    }

    #[test]
    fn moving_asset_ignores_its_own_cell() {
        let grid = grid();
        let records = vec![record_at("a", 3.0, -5.0), record_at("b", 7.0, 7.0)];
        let outcome = validate_placement(&grid, &records, 3.0, -5.0, Some("a"));
        assert!(matches!(outcome, PlacementOutcome::Accepted(_)));
        let outcome = validate_placement(&grid, &records, 7.0, 7.0, Some("a"));
        assert_eq!(
            outcome,
            PlacementOutcome::RejectedOccupied(grid.cell_at(7.0, 7.0).unwrap())
        );
    }

    #[test]
    fn outside_the_grid_is_rejected() {
        let grid = grid();
        assert_eq!(
            validate_placement(&grid, &[], 50.0, 0.0, None),
            PlacementOutcome::RejectedOutOfBounds
        );
    }

    #[test]
    fn committed_placements_never_share_a_cell() {
        // Grid occupancy exclusivity over a batch of committed records.
        let grid = grid();
        let mut records: Vec<AssetRecord> = Vec::new();
        for (i, (x, z)) in [(1.0, 1.0), (1.5, 1.5), (-3.0, 1.0), (1.0, -3.0)]
            .iter()
            .enumerate()
        {
            if can_drop(&grid, &records, *x, *z) {
                let cell = grid.cell_at(*x, *z).unwrap();
                records.push(record_at(
                    &format!("asset-{i}"),
                    cell.center_x,
                    cell.center_z,
                ));
            }
        }
        // (1.5, 1.5) shares the cell of (1.0, 1.0) and was rejected.
        assert_eq!(records.len(), 3);
        let mut cells: Vec<(u32, u32)> = records
            .iter()
            .map(|r| grid.cell_at(r.position.x, r.position.z).unwrap().coords())
            .collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), records.len());
    }
}
