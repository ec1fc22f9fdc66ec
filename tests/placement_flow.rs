//! Cross-module placement flow: grid resolution, occupancy validation,
//! drop commits, reconciliation planning, and sync suppression working
//! together the way one frame of the engine drives them.

use bevy::prelude::*;

use terrain_placement_engine::engine::assets::record::AssetRecord;
use terrain_placement_engine::engine::assets::reconciler::{
    IgnoreReason, Mutation, ReconcileAction, plan,
};
use terrain_placement_engine::engine::assets::registry::{AssetRegistry, LoadPhase};
use terrain_placement_engine::engine::assets::snapping::ModelFootprint;
use terrain_placement_engine::engine::sync::{ExternalSyncState, SyncChange, diff_records};
use terrain_placement_engine::engine::terrain::grid::TerrainGrid;
use terrain_placement_engine::tools::placement::drop::drop_record;
use terrain_placement_engine::tools::placement::interaction::{
    PlacementOutcome, can_drop, validate_placement,
};
use terrain_placement_engine::tools::placement::state::DropPayload;

fn ten_by_ten() -> TerrainGrid {
    TerrainGrid::new(Vec2::splat(-10.0), Vec2::splat(10.0), 10, 10, 0.0)
}

fn barrel_payload() -> DropPayload {
    DropPayload::parse(r#"{"modelUrl": "models/barrel.glb", "name": "barrel"}"#).unwrap()
}

fn entity(index: u32) -> Entity {
    Entity::from_raw(index)
}

/// Apply a planned action to the registry the way the applier system
/// does, without the ECS side.
fn apply(
    registry: &mut AssetRegistry,
    mutation: &Mutation,
    next_entity: &mut u32,
) -> ReconcileAction {
    let action = plan(mutation, registry);
    match (&action, mutation) {
        (ReconcileAction::SpawnInstance, Mutation::Add(id))
        | (ReconcileAction::SpawnInstance, Mutation::VisualSync(id)) => {
            registry.register_pending(id, entity(*next_entity));
            *next_entity += 1;
        }
        (ReconcileAction::DetachAndDespawn, Mutation::Delete(id)) => {
            registry.remove(id);
        }
        _ => {}
    }
    action
}

#[test]
fn drop_commit_occupy_delete_roundtrip() {
    let grid = ten_by_ten();
    let mut records: Vec<AssetRecord> = Vec::new();
    let mut registry = AssetRegistry::default();
    let mut next_entity = 1;

    // Drop the worked example: world (3.1, -4.9) resolves to cell (6, 2)
    // with its centre at (3.0, -5.0).
    let outcome = validate_placement(&grid, &records, 3.1, -4.9, None);
    let cell = match outcome {
        PlacementOutcome::Accepted(cell) => cell,
        other => panic!("expected acceptance, got {other:?}"),
    };
    assert_eq!((cell.grid_x, cell.grid_z), (6, 2));

    let record = drop_record(&barrel_payload(), &cell, 0.0);
    assert_eq!((record.position.x, record.position.z), (3.0, -5.0));
    assert_eq!(
        apply(&mut registry, &Mutation::Add(&record.id), &mut next_entity),
        ReconcileAction::SpawnInstance
    );
    records.push(record.clone());

    // A second drop attempt on the identical cell is rejected before the
    // first is deleted, and no event (hence no registry change) happens.
    assert!(!can_drop(&grid, &records, 3.9, -4.3));
    assert_eq!(registry.len(), 1);

    // Replaying the add while the load is in flight is ignored.
    assert_eq!(
        apply(&mut registry, &Mutation::Add(&record.id), &mut next_entity),
        ReconcileAction::Ignore(IgnoreReason::LoadInFlight)
    );
    assert_eq!(registry.len(), 1);

    // Delete frees the cell and empties the registry.
    assert_eq!(
        apply(&mut registry, &Mutation::Delete(&record.id), &mut next_entity),
        ReconcileAction::DetachAndDespawn
    );
    records.retain(|r| r.id != record.id);
    assert!(registry.is_empty());
    assert!(can_drop(&grid, &records, 3.9, -4.3));
}

#[test]
fn locally_placed_asset_suppresses_its_sync_echo() {
    let grid = ten_by_ten();
    let cell = grid.cell_at(-7.0, 7.0).unwrap();
    let record = drop_record(&barrel_payload(), &cell, 0.0);

    // The engine notes its own commit, then the host reflects the record
    // back into the declarative list.
    let mut sync = ExternalSyncState::default();
    sync.note_commit(&record.id, 1.0);

    let changes = diff_records(&[], std::slice::from_ref(&record));
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        SyncChange::Appeared(appeared) => {
            // The appearance is suppressed: no visual-sync event, no
            // duplicate instance.
            assert!(sync.suppress(&appeared.id, 1.2));
        }
        other => panic!("expected appearance, got {other:?}"),
    }

    // A record from a saved layout has no recent commit and passes.
    let mut external = record.clone();
    external.id = "layout-asset-1".into();
    assert!(!sync.suppress(&external.id, 1.2));
}

#[test]
fn saved_layout_loads_as_visual_sync_then_reconciles_once() {
    let mut registry = AssetRegistry::default();
    let mut next_entity = 1;
    let grid = ten_by_ten();

    let layout: Vec<AssetRecord> = [(1.0, 1.0), (5.0, -3.0), (-9.0, 9.0)]
        .iter()
        .enumerate()
        .map(|(i, (x, z))| {
            let cell = grid.cell_at(*x, *z).unwrap();
            let mut record = drop_record(&barrel_payload(), &cell, 0.0);
            record.id = format!("saved-{i}");
            record
        })
        .collect();

    for change in diff_records(&[], &layout) {
        if let SyncChange::Appeared(record) = change {
            apply(&mut registry, &Mutation::VisualSync(&record.id), &mut next_entity);
        }
    }
    assert_eq!(registry.len(), 3);

    // Re-running the same diff against the now-observed list is a no-op.
    assert!(diff_records(&layout, &layout).is_empty());

    // All saved placements occupy distinct cells.
    let mut cells: Vec<(u32, u32)> = layout
        .iter()
        .map(|r| grid.cell_at(r.position.x, r.position.z).unwrap().coords())
        .collect();
    cells.sort();
    cells.dedup();
    assert_eq!(cells.len(), layout.len());
}

#[test]
fn terrain_switch_clears_every_instance_and_resource() {
    let mut registry = AssetRegistry::default();
    for i in 0..5 {
        let id = format!("asset-{i}");
        registry.register_pending(&id, entity(i + 1));
        let entry = registry.entry_mut(&id).unwrap();
        entry.phase = LoadPhase::Ready;
        entry.meshes.push(Handle::default());
        entry.materials.push(Handle::default());
    }
    assert_eq!(registry.retained_resource_count(), 10);

    // The visual-only clear drains the registry without producing any
    // per-asset deletion, so nothing can reach the persistence layer.
    let drained = registry.drain_all();
    assert_eq!(drained.len(), 5);
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.retained_resource_count(), 0);
}

#[test]
fn snap_invariant_holds_across_move_and_scale() {
    let grid = ten_by_ten();
    let footprint = ModelFootprint {
        min: Vec3::new(-0.4, -0.25, -0.4),
        max: Vec3::new(0.4, 1.75, 0.4),
    };

    for (x, z, scale) in [(1.0, 1.0, 1.0), (-5.0, 3.0, 2.0), (9.0, -9.0, 0.5)] {
        let cell = grid.cell_at(x, z).unwrap();
        // Ground-plane case: the supporting surface is the grid's ground.
        let y = footprint.snapped_y(grid.ground_y, scale);
        let base = footprint.base_y(y, scale);
        assert!((base - grid.ground_y).abs() < 1e-4);
        assert!(grid.cell_at(cell.center_x, cell.center_z).is_some());
    }
}
