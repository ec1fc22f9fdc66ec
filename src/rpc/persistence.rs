//! Persistence adapter and host callback boundary.
//!
//! Committed mutations are queued as they are read and flushed through
//! the injected callback object in the same frame, scoped by the active
//! terrain id. In-drag gizmo ticks never reach the queue. Failures are
//! surfaced once through `on_error` and never retried: retry is a host
//! action, not an engine responsibility.

use bevy::prelude::*;
use std::sync::Arc;

use crate::EngineSet;
use crate::engine::assets::record::{AssetRecord, PlacedLayout};
use crate::engine::assets::registry::AssetRegistry;
use crate::engine::errors::SceneError;
use crate::engine::events::{
    AssetAdded, AssetDeleted, AssetSelected, AssetUpdated, SceneErrorEvent,
};
use crate::engine::terrain::ActiveTerrain;

/// Callback contract with the owning application. Placement, move, and
/// delete calls are the backend writes; selection and error calls are
/// plain notifications.
pub trait SceneCallbacks: Send + Sync + 'static {
    fn on_asset_placed(&self, record: &AssetRecord, terrain_id: &str) -> Result<(), SceneError>;

    fn on_asset_moved(
        &self,
        id: &str,
        position: Vec3,
        rotation: Vec3,
        scale: Vec3,
        terrain_id: &str,
    ) -> Result<(), SceneError>;

    fn on_asset_deleted(&self, id: &str, terrain_id: &str) -> Result<(), SceneError>;

    /// Replace the whole stored layout in one request. The clear-all
    /// operation sends an empty layout instead of per-asset deletes.
    fn replace_layout(&self, terrain_id: &str, layout: &PlacedLayout) -> Result<(), SceneError>;

    fn on_asset_selected(&self, id: Option<&str>);

    fn on_error(&self, message: &str);
}

/// Injected callback object. Hosts insert their own; the default logs.
#[derive(Resource, Clone)]
pub struct ExternalInterface {
    pub callbacks: Arc<dyn SceneCallbacks>,
}

impl Default for ExternalInterface {
    fn default() -> Self {
        Self {
            callbacks: Arc::new(LoggingCallbacks),
        }
    }
}

/// Host request for the bulk clear: one layout-replace request, no
/// per-asset deletions.
#[derive(Event, Debug, Clone)]
pub struct LayoutClearRequested;

/// One queued backend write.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMutation {
    Placed(AssetRecord),
    Moved {
        id: String,
        position: Vec3,
        rotation: Vec3,
        scale: Vec3,
    },
    Deleted(String),
}

/// Outgoing write queue, drained by the flush system each frame.
#[derive(Resource, Default)]
pub struct PersistenceQueue {
    outgoing: Vec<OutgoingMutation>,
}

impl PersistenceQueue {
    pub fn push(&mut self, mutation: OutgoingMutation) {
        self.outgoing.push(mutation);
    }

    pub fn drain(&mut self) -> Vec<OutgoingMutation> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }
}

/// Commits worth persisting: everything except in-drag gizmo ticks.
pub fn should_persist_update(event: &AssetUpdated) -> bool {
    !event.from_gizmo
}

pub struct PersistencePlugin;

impl Plugin for PersistencePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ExternalInterface>()
            .init_resource::<PersistenceQueue>()
            .add_event::<LayoutClearRequested>()
            .add_systems(
                Update,
                (
                    queue_committed_mutations,
                    flush_persistence_queue,
                    handle_layout_clear,
                    forward_selection,
                    forward_errors,
                )
                    .chain()
                    .in_set(EngineSet::Persist),
            );
    }
}

fn queue_committed_mutations(
    mut queue: ResMut<PersistenceQueue>,
    mut added: EventReader<AssetAdded>,
    mut updated: EventReader<AssetUpdated>,
    mut deleted: EventReader<AssetDeleted>,
    registry: Res<AssetRegistry>,
    transforms: Query<&Transform>,
) {
    for AssetAdded { record } in added.read() {
        queue.push(OutgoingMutation::Placed(record.clone()));
    }

    for event in updated.read() {
        if !should_persist_update(event) {
            continue;
        }
        // Fill fields the event left implicit from the live instance,
        // which the reconciler already brought up to date this frame.
        let live = registry
            .root_of(&event.id)
            .and_then(|root| transforms.get(root).ok());
        let position = event.position.or_else(|| live.map(|t| t.translation));
        let rotation = event.rotation.or_else(|| {
            live.map(|t| {
                let (x, y, z) = t.rotation.to_euler(EulerRot::XYZ);
                Vec3::new(x, y, z)
            })
        });
        let scale = event.scale.or_else(|| live.map(|t| t.scale));
        let (Some(position), Some(rotation), Some(scale)) = (position, rotation, scale) else {
            continue;
        };
        queue.push(OutgoingMutation::Moved {
            id: event.id.clone(),
            position,
            rotation,
            scale,
        });
    }

    for AssetDeleted { id } in deleted.read() {
        queue.push(OutgoingMutation::Deleted(id.clone()));
    }
}

fn flush_persistence_queue(
    mut queue: ResMut<PersistenceQueue>,
    interface: Res<ExternalInterface>,
    terrain: Option<Res<ActiveTerrain>>,
    mut errors: EventWriter<SceneErrorEvent>,
) {
    if queue.is_empty() {
        return;
    }
    let terrain_id = terrain
        .map(|t| t.terrain_id.clone())
        .unwrap_or_else(|| "default".into());

    for mutation in queue.drain() {
        let result = match &mutation {
            OutgoingMutation::Placed(record) => {
                interface.callbacks.on_asset_placed(record, &terrain_id)
            }
            OutgoingMutation::Moved {
                id,
                position,
                rotation,
                scale,
            } => interface
                .callbacks
                .on_asset_moved(id, *position, *rotation, *scale, &terrain_id),
            OutgoingMutation::Deleted(id) => interface.callbacks.on_asset_deleted(id, &terrain_id),
        };

        // The visual mutation already happened; the record may now lag
        // storage. Surfaced, not rolled back, and not retried.
        if let Err(err) = result {
            errors.write(err.into());
        }
    }
}

fn handle_layout_clear(
    mut requests: EventReader<LayoutClearRequested>,
    interface: Res<ExternalInterface>,
    terrain: Option<Res<ActiveTerrain>>,
    mut errors: EventWriter<SceneErrorEvent>,
) {
    if requests.read().next().is_none() {
        return;
    }
    let terrain_id = terrain
        .map(|t| t.terrain_id.clone())
        .unwrap_or_else(|| "default".into());
    if let Err(err) = interface
        .callbacks
        .replace_layout(&terrain_id, &PlacedLayout::default())
    {
        errors.write(err.into());
    }
}

fn forward_selection(
    mut selections: EventReader<AssetSelected>,
    interface: Res<ExternalInterface>,
) {
    for AssetSelected { id } in selections.read() {
        interface.callbacks.on_asset_selected(id.as_deref());
    }
}

fn forward_errors(mut events: EventReader<SceneErrorEvent>, interface: Res<ExternalInterface>) {
    for SceneErrorEvent { error } in events.read() {
        interface.callbacks.on_error(&error.to_string());
    }
}

/// Default callback object: logs every call. Useful for the demo binary
/// and as a template for host integrations.
pub struct LoggingCallbacks;

impl SceneCallbacks for LoggingCallbacks {
    fn on_asset_placed(&self, record: &AssetRecord, terrain_id: &str) -> Result<(), SceneError> {
        info!("persist place {} on {terrain_id}", record.id);
        Ok(())
    }

    fn on_asset_moved(
        &self,
        id: &str,
        position: Vec3,
        _rotation: Vec3,
        _scale: Vec3,
        terrain_id: &str,
    ) -> Result<(), SceneError> {
        info!("persist move {id} to {position} on {terrain_id}");
        Ok(())
    }

    fn on_asset_deleted(&self, id: &str, terrain_id: &str) -> Result<(), SceneError> {
        info!("persist delete {id} on {terrain_id}");
        Ok(())
    }

    fn replace_layout(&self, terrain_id: &str, layout: &PlacedLayout) -> Result<(), SceneError> {
        info!(
            "replace layout on {terrain_id} with {} assets",
            layout.placed_assets.len()
        );
        Ok(())
    }

    fn on_asset_selected(&self, id: Option<&str>) {
        info!("selection: {id:?}");
    }

    fn on_error(&self, message: &str) {
        error!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::record::Vec3Data;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallbacks {
        calls: Mutex<Vec<String>>,
        fail_moves: bool,
    }

    impl SceneCallbacks for RecordingCallbacks {
        fn on_asset_placed(&self, record: &AssetRecord, terrain: &str) -> Result<(), SceneError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("place:{}:{terrain}", record.id));
            Ok(())
        }

        fn on_asset_moved(
            &self,
            id: &str,
            _position: Vec3,
            _rotation: Vec3,
            _scale: Vec3,
            terrain: &str,
        ) -> Result<(), SceneError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("move:{id}:{terrain}"));
            if self.fail_moves {
                Err(SceneError::PersistenceFailure("503".into()))
            } else {
                Ok(())
            }
        }

        fn on_asset_deleted(&self, id: &str, terrain: &str) -> Result<(), SceneError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete:{id}:{terrain}"));
            Ok(())
        }

        fn replace_layout(&self, terrain: &str, layout: &PlacedLayout) -> Result<(), SceneError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("replace:{terrain}:{}", layout.placed_assets.len()));
            Ok(())
        }

        fn on_asset_selected(&self, _id: Option<&str>) {}

        fn on_error(&self, message: &str) {
            self.calls.lock().unwrap().push(format!("error:{message}"));
        }
    }

    fn record(id: &str) -> AssetRecord {
        AssetRecord {
            id: id.into(),
            model_url: "models/barrel.glb".into(),
            name: "barrel".into(),
            position: Vec3Data::default(),
            rotation: Vec3Data::default(),
            scale: Vec3Data { x: 1.0, y: 1.0, z: 1.0 },
        }
    }

    #[test]
    fn gizmo_ticks_are_filtered_from_persistence() {
        let tick = AssetUpdated {
            id: "a".into(),
            position: Some(Vec3::ZERO),
            rotation: None,
            scale: None,
            from_gizmo: true,
        };
        assert!(!should_persist_update(&tick));
        assert!(should_persist_update(&AssetUpdated::committed("a")));
    }

    #[test]
    fn queue_drains_in_order() {
        let mut queue = PersistenceQueue::default();
        queue.push(OutgoingMutation::Placed(record("a")));
        queue.push(OutgoingMutation::Deleted("a".into()));
        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert!(queue.is_empty());
        assert_eq!(drained[0], OutgoingMutation::Placed(record("a")));
        assert_eq!(drained[1], OutgoingMutation::Deleted("a".into()));
    }

    #[test]
    fn bulk_clear_is_one_replace_request() {
        let callbacks = RecordingCallbacks::default();
        callbacks
            .replace_layout("terrain-9", &PlacedLayout::default())
            .unwrap();
        let calls = callbacks.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), ["replace:terrain-9:0"]);
    }

    #[test]
    fn failed_move_surfaces_an_error_and_does_not_retry() {
        let callbacks = RecordingCallbacks {
            fail_moves: true,
            ..Default::default()
        };
        let result = callbacks.on_asset_moved("a", Vec3::ZERO, Vec3::ZERO, Vec3::ONE, "t");
        assert!(matches!(result, Err(SceneError::PersistenceFailure(_))));
        // Exactly one attempt was made.
        assert_eq!(callbacks.calls.lock().unwrap().len(), 1);
    }
}
