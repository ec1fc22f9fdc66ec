//! Scene synchronization and placement engine for terrain/dungeon scenes.
//!
//! Keeps a declarative list of placed asset records, owned by a host
//! application, in agreement with a live Bevy scene graph while every
//! accepted mutation is forwarded to a backend store. The host drives the
//! engine through typed events and two injected trait objects; the engine
//! owns the scene-graph side of every asset instance.
//!
//! ## Architecture
//!
//! Two producers emit mutation events: the placement tools (pointer input,
//! palette drag-and-drop, transform gizmo) and the external sync layer
//! (diffing the host-owned record list). The reconciler is the only
//! consumer that mutates scene-graph asset nodes; the persistence adapter
//! is a second consumer that mutates the backend. Cell highlighting and
//! the gizmo are driven by transient interaction state that is never
//! persisted.
//!
//! ```text
//! host record list ──diff──> sync events ─┐
//! pointer / palette / gizmo ──────────────┼──> reconciler ──> scene graph
//!                                         └──> persistence ──> backend
//! ```
//!
//! Event producers, the reconciler, and the persistence flush are chained
//! within one `Update` run, so a mutation emitted this frame is applied to
//! the scene graph and queued for the backend before the frame ends.

pub mod constants;
pub mod engine;
pub mod rpc;
pub mod tools;

use bevy::prelude::*;

use crate::engine::assets::reconciler::ReconcilerPlugin;
use crate::engine::core::SceneCorePlugin;
use crate::engine::events::SceneEventsPlugin;
use crate::engine::sync::ExternalSyncPlugin;
use crate::engine::terrain::TerrainPlugin;
use crate::rpc::persistence::PersistencePlugin;
use crate::tools::placement::PlacementPlugin;

/// System sets ordering one frame of the engine: input and sync produce
/// mutation events, the reconciler applies them to the scene graph, the
/// persistence adapter forwards them, feedback (highlight, LOD, overlay)
/// runs last.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineSet {
    Input,
    Sync,
    Reconcile,
    Persist,
    Feedback,
}

/// Umbrella plugin wiring every engine subsystem into the app in the
/// required order. Hosts add this plus their own `SceneCallbacks` /
/// `SceneBackend` resources.
pub struct TerrainPlacementPlugin;

impl Plugin for TerrainPlacementPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                EngineSet::Input,
                EngineSet::Sync,
                EngineSet::Reconcile,
                EngineSet::Persist,
                EngineSet::Feedback,
            )
                .chain(),
        );

        app.add_plugins((
            SceneEventsPlugin,
            SceneCorePlugin,
            TerrainPlugin,
            ExternalSyncPlugin,
            ReconcilerPlugin,
            PlacementPlugin,
            PersistencePlugin,
        ));
    }
}
