//! External sync: diffs the host-owned declarative record list against
//! the previously observed list every frame and emits the synthetic
//! mutation events that bring the scene graph into agreement.
//!
//! New ids emit `AssetVisualSync` rather than `AssetAdded` so state that
//! already came from storage never re-triggers persistence. Ids the
//! engine itself committed moments earlier are tracked in a short-lived
//! set and suppressed entirely: the reconciler already holds the live
//! instance, and echoing the commit back as a second event would
//! double-persist it.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::EngineSet;
use crate::constants::render_settings::SYNC_SUPPRESSION_WINDOW;
use crate::engine::assets::record::AssetRecord;
use crate::engine::events::{AssetAdded, AssetDeleted, AssetUpdated, AssetVisualSync};

/// The declarative asset list, owned by the host. The engine only reads
/// it; the host applies committed mutation events to it at its own pace.
#[derive(Resource, Default, Debug, Clone)]
pub struct SceneAssets {
    pub records: Vec<AssetRecord>,
}

/// Host request to emit a deletion for every tracked record. Unlike the
/// visual-only scene clear, these deletions do reach persistence.
#[derive(Event, Debug, Clone)]
pub struct SyncClearRequested;

/// One observed difference between two record lists.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncChange {
    Appeared(AssetRecord),
    Changed(AssetRecord),
    Vanished(String),
}

/// Key-by-id diff with deep equality over position/rotation/scale.
pub fn diff_records(previous: &[AssetRecord], current: &[AssetRecord]) -> Vec<SyncChange> {
    let mut changes = Vec::new();
    let before: HashMap<&str, &AssetRecord> =
        previous.iter().map(|r| (r.id.as_str(), r)).collect();

    for record in current {
        match before.get(record.id.as_str()) {
            None => changes.push(SyncChange::Appeared(record.clone())),
            Some(old) if !old.same_transform(record) => {
                changes.push(SyncChange::Changed(record.clone()))
            }
            Some(_) => {}
        }
    }

    let now: HashMap<&str, ()> = current.iter().map(|r| (r.id.as_str(), ())).collect();
    for record in previous {
        if !now.contains_key(record.id.as_str()) {
            changes.push(SyncChange::Vanished(record.id.clone()));
        }
    }

    changes
}

#[derive(Resource, Default)]
pub struct ExternalSyncState {
    last_seen: Vec<AssetRecord>,
    /// id -> expiry time (seconds since startup) of a local commit whose
    /// echo from the host list must be suppressed.
    recently_committed: HashMap<String, f32>,
}

impl ExternalSyncState {
    pub fn note_commit(&mut self, id: &str, now: f32) {
        self.recently_committed
            .insert(id.to_string(), now + SYNC_SUPPRESSION_WINDOW);
    }

    /// True (and forgets the entry) if this id's echo should be dropped.
    pub fn suppress(&mut self, id: &str, now: f32) -> bool {
        match self.recently_committed.remove(id) {
            Some(expires_at) if now <= expires_at => true,
            _ => false,
        }
    }

    pub fn purge_expired(&mut self, now: f32) {
        self.recently_committed.retain(|_, expiry| now <= *expiry);
    }

    pub fn tracked_ids(&self) -> Vec<String> {
        self.last_seen.iter().map(|r| r.id.clone()).collect()
    }
}

pub struct ExternalSyncPlugin;

impl Plugin for ExternalSyncPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneAssets>()
            .init_resource::<ExternalSyncState>()
            .add_event::<SyncClearRequested>()
            .add_systems(
                Update,
                (note_local_commits, sync_external_records, handle_sync_clear)
                    .chain()
                    .in_set(EngineSet::Sync),
            );
    }
}

/// Record every locally accepted placement so its echo from the host
/// list is suppressed. Only placements need this: sync itself never
/// emits `AssetAdded`, and update echoes converge after one diff.
fn note_local_commits(
    mut state: ResMut<ExternalSyncState>,
    mut added: EventReader<AssetAdded>,
    time: Res<Time>,
) {
    let now = time.elapsed_secs();
    for event in added.read() {
        state.note_commit(&event.record.id, now);
    }
    state.purge_expired(now);
}

fn sync_external_records(
    assets: Res<SceneAssets>,
    mut state: ResMut<ExternalSyncState>,
    time: Res<Time>,
    mut synced: EventWriter<AssetVisualSync>,
    mut updated: EventWriter<AssetUpdated>,
    mut deleted: EventWriter<AssetDeleted>,
) {
    if state.last_seen == assets.records {
        return;
    }
    let now = time.elapsed_secs();

    for change in diff_records(&state.last_seen, &assets.records) {
        match change {
            SyncChange::Appeared(record) => {
                if state.suppress(&record.id, now) {
                    continue;
                }
                synced.write(AssetVisualSync { record });
            }
            SyncChange::Changed(record) => {
                let rotation: Vec3 = record.rotation.into();
                updated.write(AssetUpdated {
                    id: record.id.clone(),
                    position: Some(record.position.into()),
                    rotation: Some(rotation),
                    scale: Some(record.scale.into()),
                    from_gizmo: false,
                });
            }
            SyncChange::Vanished(id) => {
                deleted.write(AssetDeleted { id });
            }
        }
    }

    state.last_seen = assets.records.clone();
}

/// Emit a real deletion for every tracked id and reset the diff state.
fn handle_sync_clear(
    mut events: EventReader<SyncClearRequested>,
    mut state: ResMut<ExternalSyncState>,
    mut deleted: EventWriter<AssetDeleted>,
) {
    if events.read().next().is_none() {
        return;
    }
    for id in state.tracked_ids() {
        deleted.write(AssetDeleted { id });
    }
    state.last_seen.clear();
    state.recently_committed.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::record::Vec3Data;

    fn record(id: &str, x: f32) -> AssetRecord {
        AssetRecord {
            id: id.into(),
            model_url: "models/barrel.glb".into(),
            name: "barrel".into(),
            position: Vec3Data { x, y: 0.0, z: 0.0 },
            rotation: Vec3Data::default(),
            scale: Vec3Data { x: 1.0, y: 1.0, z: 1.0 },
        }
    }

    #[test]
    fn diff_detects_appearance_change_and_vanish() {
        let previous = vec![record("a", 0.0), record("b", 1.0)];
        let current = vec![record("b", 5.0), record("c", 2.0)];
        let changes = diff_records(&previous, &current);
        assert!(changes.contains(&SyncChange::Changed(record("b", 5.0))));
        assert!(changes.contains(&SyncChange::Appeared(record("c", 2.0))));
        assert!(changes.contains(&SyncChange::Vanished("a".into())));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn unchanged_records_emit_nothing() {
        let list = vec![record("a", 0.0)];
        assert!(diff_records(&list, &list.clone()).is_empty());
    }

    #[test]
    fn local_commit_echo_is_suppressed_once() {
        let mut state = ExternalSyncState::default();
        state.note_commit("dragdrop-barrel-1", 10.0);
        // The echo arrives within the window and is dropped.
        assert!(state.suppress("dragdrop-barrel-1", 10.5));
        // A later, genuinely external change for the same id passes.
        assert!(!state.suppress("dragdrop-barrel-1", 10.6));
    }

    #[test]
    fn stale_commits_do_not_suppress() {
        let mut state = ExternalSyncState::default();
        state.note_commit("a", 0.0);
        assert!(!state.suppress("a", SYNC_SUPPRESSION_WINDOW + 0.1));
    }
}
