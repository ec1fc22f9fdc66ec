//! Mutation reconciliation: keeps the set of live scene instances equal
//! to the set of ids implied by the mutation event stream.
//!
//! Every event is first resolved against the registry by the pure
//! [`plan`] function, then applied by the ECS systems. The split keeps
//! the invariant logic (one instance per id, ignore duplicates while a
//! load is in flight, discard late loads for deleted ids) testable
//! without a render device.

use bevy::asset::LoadState;
use bevy::gltf::GltfAssetLabel;
use bevy::prelude::*;
use bevy::render::primitives::Aabb;

use crate::EngineSet;
use crate::engine::assets::lod::{
    AssetRoot, DetailTier, LodPlugin, NeedsFlatShading, PROXY_BASE_COLOR,
};
use crate::engine::assets::record::{AssetRecord, resolve_model_path};
use crate::engine::assets::registry::{AssetRegistry, LoadPhase};
use crate::engine::assets::snapping::ModelFootprint;
use crate::engine::errors::SceneError;
use crate::engine::events::{
    AssetAdded, AssetDeleted, AssetUpdated, AssetVisualSync, SceneClearRequested, SceneErrorEvent,
};
use crate::engine::terrain::grid::TerrainGrid;
use crate::engine::terrain::heightmap::{TerrainHeightfield, surface_height_at};

/// Non-owning reference to whichever instance the transform gizmo is
/// attached to. Instance lifetime is owned solely by the registry;
/// detaching on delete is a lookup-and-clear here.
#[derive(Resource, Default)]
pub struct GizmoAttachment {
    pub id: Option<String>,
}

impl GizmoAttachment {
    pub fn detach_if(&mut self, id: &str) {
        if self.id.as_deref() == Some(id) {
            self.id = None;
        }
    }
}

/// A mutation event viewed uniformly for planning.
pub enum Mutation<'a> {
    Add(&'a str),
    VisualSync(&'a str),
    Update { id: &'a str, from_gizmo: bool },
    Delete(&'a str),
}

/// What the applier should do for one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Register a placeholder and start the async model load.
    SpawnInstance,
    /// Mutate the existing instance's transform in place.
    ApplyTransform,
    /// Detach from the gizmo, despawn, and release resources.
    DetachAndDespawn,
    Ignore(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A load for this id is already in flight; a duplicate event must
    /// not trigger a second concurrent load.
    LoadInFlight,
    /// Gizmo ticks already mutated the scene graph.
    AlreadyApplied,
    UnknownId,
}

/// Resolve a mutation against the current registry state.
pub fn plan(mutation: &Mutation, registry: &AssetRegistry) -> ReconcileAction {
    match mutation {
        Mutation::Add(id) | Mutation::VisualSync(id) => match registry.entry(id) {
            None => ReconcileAction::SpawnInstance,
            Some(entry) if entry.phase == LoadPhase::Pending => {
                ReconcileAction::Ignore(IgnoreReason::LoadInFlight)
            }
            Some(_) => ReconcileAction::ApplyTransform,
        },
        Mutation::Update { id, from_gizmo } => {
            if *from_gizmo {
                ReconcileAction::Ignore(IgnoreReason::AlreadyApplied)
            } else if registry.contains(id) {
                ReconcileAction::ApplyTransform
            } else {
                ReconcileAction::Ignore(IgnoreReason::UnknownId)
            }
        }
        Mutation::Delete(id) => {
            if registry.contains(id) {
                ReconcileAction::DetachAndDespawn
            } else {
                ReconcileAction::Ignore(IgnoreReason::UnknownId)
            }
        }
    }
}

pub struct ReconcilerPlugin;

impl Plugin for ReconcilerPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(LodPlugin)
            .init_resource::<AssetRegistry>()
            .init_resource::<GizmoAttachment>()
            .add_systems(
                Update,
                (apply_mutations, clear_scene, finalize_pending_instances)
                    .chain()
                    .in_set(EngineSet::Reconcile),
            );
    }
}

fn apply_mutations(
    mut registry: ResMut<AssetRegistry>,
    mut gizmo: ResMut<GizmoAttachment>,
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut added: EventReader<AssetAdded>,
    mut synced: EventReader<AssetVisualSync>,
    mut updated: EventReader<AssetUpdated>,
    mut deleted: EventReader<AssetDeleted>,
    mut transforms: Query<&mut Transform>,
) {
    for AssetAdded { record } in added.read() {
        match plan(&Mutation::Add(&record.id), &registry) {
            ReconcileAction::SpawnInstance => {
                spawn_instance(&mut commands, &asset_server, &mut registry, record);
            }
            ReconcileAction::ApplyTransform => {
                apply_record_transform(&registry, record, &mut transforms);
            }
            _ => {}
        }
    }

    for AssetVisualSync { record } in synced.read() {
        match plan(&Mutation::VisualSync(&record.id), &registry) {
            ReconcileAction::SpawnInstance => {
                spawn_instance(&mut commands, &asset_server, &mut registry, record);
            }
            ReconcileAction::ApplyTransform => {
                apply_record_transform(&registry, record, &mut transforms);
            }
            _ => {}
        }
    }

    for event in updated.read() {
        let mutation = Mutation::Update {
            id: &event.id,
            from_gizmo: event.from_gizmo,
        };
        if plan(&mutation, &registry) != ReconcileAction::ApplyTransform {
            continue;
        }
        let Some(root) = registry.root_of(&event.id) else {
            continue;
        };
        if let Ok(mut transform) = transforms.get_mut(root) {
            if let Some(position) = event.position {
                transform.translation = position;
            }
            if let Some(rotation) = event.rotation {
                transform.rotation = Quat::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z);
            }
            if let Some(scale) = event.scale {
                transform.scale = scale;
            }
        }
    }

    for AssetDeleted { id } in deleted.read() {
        if plan(&Mutation::Delete(id), &registry) != ReconcileAction::DetachAndDespawn {
            continue;
        }
        gizmo.detach_if(id);
        if let Some(entry) = registry.remove(id) {
            // Despawning the instance tree drops its mesh and material
            // component handles; the entry drop releases the rest.
            commands.entity(entry.root).despawn();
        }
    }
}

/// Visual-only teardown: every instance despawned and every retained
/// handle released, with no per-asset deletion events emitted.
fn clear_scene(
    mut events: EventReader<SceneClearRequested>,
    mut registry: ResMut<AssetRegistry>,
    mut gizmo: ResMut<GizmoAttachment>,
    mut commands: Commands,
) {
    if events.read().next().is_none() {
        return;
    }
    gizmo.id = None;
    for (id, entry) in registry.drain_all() {
        debug!("clearing instance {id}");
        commands.entity(entry.root).despawn();
    }
}

fn spawn_instance(
    commands: &mut Commands,
    asset_server: &AssetServer,
    registry: &mut AssetRegistry,
    record: &AssetRecord,
) {
    let path = resolve_model_path(&record.model_url);
    let scene: Handle<Scene> = asset_server.load(GltfAssetLabel::Scene(0).from_asset(path));

    let root = commands
        .spawn((
            record.transform(),
            Visibility::default(),
            AssetRoot,
            Name::new(record.name.clone()),
        ))
        .with_children(|parent| {
            parent.spawn((
                SceneRoot(scene.clone()),
                DetailTier::Full,
                Transform::IDENTITY,
                Visibility::Inherited,
            ));
        })
        .id();

    // Registered synchronously: a second event for this id while the load
    // is in flight sees the placeholder and is ignored.
    registry.register_pending(&record.id, root);
    if let Some(entry) = registry.entry_mut(&record.id) {
        entry.scenes.push(scene);
    }
}

fn apply_record_transform(
    registry: &AssetRegistry,
    record: &AssetRecord,
    transforms: &mut Query<&mut Transform>,
) {
    if let Some(root) = registry.root_of(&record.id) {
        if let Ok(mut transform) = transforms.get_mut(root) {
            *transform = record.transform();
        }
    }
}

/// Promote pending instances whose model finished loading: capture the
/// footprint, snap onto the surface, and build the cheap detail tiers.
/// Failed loads remove the placeholder and surface the error. Ids deleted
/// while their load was in flight are already gone from the registry, so
/// their resolution is never acted on.
fn finalize_pending_instances(
    mut registry: ResMut<AssetRegistry>,
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    images: Res<Assets<Image>>,
    grid: Option<Res<TerrainGrid>>,
    heightfield: Option<Res<TerrainHeightfield>>,
    mut errors: EventWriter<SceneErrorEvent>,
    children: Query<&Children>,
    global_transforms: Query<&GlobalTransform>,
    mesh_aabbs: Query<(&GlobalTransform, &Aabb), With<Mesh3d>>,
    mut transforms: Query<&mut Transform>,
) {
    let pending: Vec<String> = registry
        .iter()
        .filter(|(_, entry)| entry.phase == LoadPhase::Pending)
        .map(|(id, _)| id.to_string())
        .collect();

    for id in pending {
        let (root, scene) = {
            let Some(entry) = registry.entry(&id) else {
                continue;
            };
            (entry.root, entry.scenes.first().cloned())
        };

        if let Some(handle) = &scene {
            if let Some(LoadState::Failed(err)) = asset_server.get_load_state(handle.id()) {
                let reason = err.to_string();
                warn!("model load failed for {id}: {reason}");
                if let Some(entry) = registry.remove(&id) {
                    commands.entity(entry.root).despawn();
                }
                errors.write(
                    SceneError::LoadFailure {
                        path: id.clone(),
                        reason,
                    }
                    .into(),
                );
                continue;
            }
        }

        let Some(footprint) = measure_footprint(root, &children, &global_transforms, &mesh_aabbs)
        else {
            continue; // still loading
        };

        // Snap invariant: base rests on the supporting surface.
        let ground_y = grid.as_ref().map(|g| g.ground_y).unwrap_or(0.0);
        if let Ok(mut transform) = transforms.get_mut(root) {
            let surface = surface_height_at(
                heightfield.as_deref(),
                &images,
                ground_y,
                transform.translation.x,
                transform.translation.z,
            );
            transform.translation.y = footprint.snapped_y(surface, transform.scale.y);
        }

        let Some(scene) = scene else {
            continue;
        };
        let size = footprint.size();
        let proxy_mesh = meshes.add(Rectangle::new(size.x.max(size.z), size.y));
        let proxy_material = materials.add(StandardMaterial {
            base_color: PROXY_BASE_COLOR,
            unlit: true,
            cull_mode: None,
            ..default()
        });

        commands.entity(root).insert(footprint).with_children(|parent| {
            parent.spawn((
                SceneRoot(scene),
                DetailTier::Medium,
                NeedsFlatShading,
                Transform::IDENTITY,
                Visibility::Hidden,
            ));
            parent.spawn((
                Mesh3d(proxy_mesh.clone()),
                MeshMaterial3d(proxy_material.clone()),
                DetailTier::Proxy,
                Transform::from_translation(footprint.center()),
                Visibility::Hidden,
            ));
        });

        let entry = registry.entry_mut(&id).expect("entry checked above");
        entry.meshes.push(proxy_mesh);
        entry.materials.push(proxy_material);
        entry.phase = LoadPhase::Ready;
        debug!("instance ready: {id}");
    }
}

/// Model-space bounding box of the loaded scene under `root`, at unit
/// scale, or `None` while no meshes have spawned yet.
fn measure_footprint(
    root: Entity,
    children: &Query<&Children>,
    global_transforms: &Query<&GlobalTransform>,
    mesh_aabbs: &Query<(&GlobalTransform, &Aabb), With<Mesh3d>>,
) -> Option<ModelFootprint> {
    let root_transform = global_transforms.get(root).ok()?;
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    let mut found = false;

    for descendant in children.iter_descendants(root) {
        let Ok((child_transform, aabb)) = mesh_aabbs.get(descendant) else {
            continue;
        };
        let local = child_transform.reparented_to(root_transform);
        let center = Vec3::from(aabb.center);
        let half = Vec3::from(aabb.half_extents);
        for corner in [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ] {
            let point = local.transform_point(center + half * corner);
            min = min.min(point);
            max = max.max(point);
        }
        found = true;
    }

    found.then_some(ModelFootprint { min, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(index: u32) -> Entity {
        Entity::from_raw(index)
    }

    #[test]
    fn replayed_add_yields_one_instance() {
        let mut registry = AssetRegistry::default();
        assert_eq!(
            plan(&Mutation::Add("barrel"), &registry),
            ReconcileAction::SpawnInstance
        );
        registry.register_pending("barrel", entity(1));
        // The placeholder exists before the load resolves: the replay is
        // ignored rather than starting a duplicate concurrent load.
        assert_eq!(
            plan(&Mutation::Add("barrel"), &registry),
            ReconcileAction::Ignore(IgnoreReason::LoadInFlight)
        );
        registry.entry_mut("barrel").unwrap().phase = LoadPhase::Ready;
        assert_eq!(
            plan(&Mutation::Add("barrel"), &registry),
            ReconcileAction::ApplyTransform
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn gizmo_ticks_are_never_reapplied() {
        let mut registry = AssetRegistry::default();
        registry.register_pending("crate", entity(1));
        registry.entry_mut("crate").unwrap().phase = LoadPhase::Ready;
        assert_eq!(
            plan(
                &Mutation::Update {
                    id: "crate",
                    from_gizmo: true
                },
                &registry
            ),
            ReconcileAction::Ignore(IgnoreReason::AlreadyApplied)
        );
        assert_eq!(
            plan(
                &Mutation::Update {
                    id: "crate",
                    from_gizmo: false
                },
                &registry
            ),
            ReconcileAction::ApplyTransform
        );
    }

    #[test]
    fn delete_for_unknown_id_is_ignored() {
        let registry = AssetRegistry::default();
        assert_eq!(
            plan(&Mutation::Delete("ghost"), &registry),
            ReconcileAction::Ignore(IgnoreReason::UnknownId)
        );
    }

    #[test]
    fn gizmo_detaches_only_its_own_id() {
        let mut gizmo = GizmoAttachment {
            id: Some("barrel".into()),
        };
        gizmo.detach_if("crate");
        assert_eq!(gizmo.id.as_deref(), Some("barrel"));
        gizmo.detach_if("barrel");
        assert_eq!(gizmo.id, None);
    }

    /// Registry completeness: after any finite sequence of mutations, the
    /// registry holds exactly the non-deleted added ids.
    #[test]
    fn randomized_sequences_preserve_registry_completeness() {
        use rand::prelude::*;
        use std::collections::HashSet;

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let mut registry = AssetRegistry::default();
            let mut expected: HashSet<String> = HashSet::new();
            let mut next_entity = 1u32;

            for _ in 0..rng.gen_range(1..60) {
                let id = format!("asset-{}", rng.gen_range(0..8));
                match rng.gen_range(0..4) {
                    0 | 1 => {
                        let mutation = if rng.gen_bool(0.5) {
                            Mutation::Add(&id)
                        } else {
                            Mutation::VisualSync(&id)
                        };
                        if plan(&mutation, &registry) == ReconcileAction::SpawnInstance {
                            registry.register_pending(&id, entity(next_entity));
                            next_entity += 1;
                        }
                        expected.insert(id.clone());
                    }
                    2 => {
                        // Updates never create or destroy instances.
                        let _ = plan(
                            &Mutation::Update {
                                id: &id,
                                from_gizmo: rng.gen_bool(0.3),
                            },
                            &registry,
                        );
                    }
                    _ => {
                        if plan(&Mutation::Delete(&id), &registry)
                            == ReconcileAction::DetachAndDespawn
                        {
                            registry.remove(&id);
                        }
                        expected.remove(&id);
                    }
                }
            }

            let live: HashSet<String> = registry.ids().map(str::to_string).collect();
            assert_eq!(live, expected);
            if expected.is_empty() {
                assert_eq!(registry.retained_resource_count(), 0);
            }
        }
    }
}
