//! Typed event channels for every cross-subsystem message.
//!
//! The app is the message bus: all channels are registered here at
//! composition time, producers hold an `EventWriter` and consumers an
//! `EventReader`, and the `EngineSet` chain guarantees that everything
//! written during input/sync is consumed by the reconciler and the
//! persistence adapter within the same frame.

use bevy::prelude::*;

use crate::engine::assets::record::AssetRecord;
use crate::engine::errors::SceneError;
use crate::engine::terrain::grid::GridCell;

/// Host selected a terrain (or cleared it with `None`). Triggers teardown
/// of the current terrain and a visual-only clear of all instances.
#[derive(Event, Debug, Clone)]
pub struct TerrainSelected {
    pub url: Option<String>,
}

/// The terrain surface, grid mapping, and overlay are installed.
#[derive(Event, Debug, Clone)]
pub struct TerrainLoaded {
    pub terrain_id: String,
}

/// Terrain manifest or heightmap failed to load.
#[derive(Event, Debug, Clone)]
pub struct TerrainError {
    pub message: String,
}

/// A locally accepted placement. Carries the full record; the reconciler
/// spawns the instance and the persistence adapter stores it.
#[derive(Event, Debug, Clone)]
pub struct AssetAdded {
    pub record: AssetRecord,
}

/// An externally originated record (e.g. a saved layout) that needs a
/// scene instance but must not re-trigger persistence.
#[derive(Event, Debug, Clone)]
pub struct AssetVisualSync {
    pub record: AssetRecord,
}

/// Transform change for an existing instance. `from_gizmo` marks in-drag
/// ticks that already mutated the scene graph: the reconciler skips them
/// and the persistence adapter ignores them.
#[derive(Event, Debug, Clone)]
pub struct AssetUpdated {
    pub id: String,
    pub position: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub scale: Option<Vec3>,
    pub from_gizmo: bool,
}

impl AssetUpdated {
    pub fn committed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position: None,
            rotation: None,
            scale: None,
            from_gizmo: false,
        }
    }
}

/// Instance removal. Consumed by both the reconciler and persistence.
#[derive(Event, Debug, Clone)]
pub struct AssetDeleted {
    pub id: String,
}

/// Selection changed; `None` means deselected.
#[derive(Event, Debug, Clone)]
pub struct AssetSelected {
    pub id: Option<String>,
}

/// A move gesture began (pick-up affordance or gizmo drag start). The
/// orbit camera is locked for its duration.
#[derive(Event, Debug, Clone)]
pub struct AssetMoveStarted {
    pub id: String,
}

/// The move gesture ended; the orbit camera unlocks.
#[derive(Event, Debug, Clone)]
pub struct AssetMoveFinished {
    pub id: String,
}

/// Host request to put a selected asset into pick-up mode.
#[derive(Event, Debug, Clone)]
pub struct PickUpRequested {
    pub id: String,
}

/// Flip grid overlay visibility. The overlay is toggled, never rebuilt.
#[derive(Event, Debug, Clone)]
pub struct GridToggle;

/// Show the cursor cell, coloured by occupancy.
#[derive(Event, Debug, Clone)]
pub struct GridHighlight {
    pub cell: GridCell,
    pub occupied: bool,
    pub surface_y: f32,
}

/// Remove the cursor cell quad.
#[derive(Event, Debug, Clone)]
pub struct GridClearHighlight;

/// Host drag of a palette entry moved over the viewport.
#[derive(Event, Debug, Clone)]
pub struct PaletteDragMoved {
    pub payload_json: String,
    pub cursor: Vec2,
}

/// Host dropped a palette entry onto the viewport.
#[derive(Event, Debug, Clone)]
pub struct PaletteDropped {
    pub payload_json: String,
    pub cursor: Vec2,
}

/// Visual-only teardown of every instance. Emits no per-asset deletions,
/// so the persistence layer never hears about it.
#[derive(Event, Debug, Clone)]
pub struct SceneClearRequested;

/// A failure converted at its async boundary, bound for `on_error`.
#[derive(Event, Debug, Clone)]
pub struct SceneErrorEvent {
    pub error: SceneError,
}

impl From<SceneError> for SceneErrorEvent {
    fn from(error: SceneError) -> Self {
        Self { error }
    }
}

pub struct SceneEventsPlugin;

impl Plugin for SceneEventsPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<TerrainSelected>()
            .add_event::<TerrainLoaded>()
            .add_event::<TerrainError>()
            .add_event::<AssetAdded>()
            .add_event::<AssetVisualSync>()
            .add_event::<AssetUpdated>()
            .add_event::<AssetDeleted>()
            .add_event::<AssetSelected>()
            .add_event::<AssetMoveStarted>()
            .add_event::<AssetMoveFinished>()
            .add_event::<PickUpRequested>()
            .add_event::<GridToggle>()
            .add_event::<GridHighlight>()
            .add_event::<GridClearHighlight>()
            .add_event::<PaletteDragMoved>()
            .add_event::<PaletteDropped>()
            .add_event::<SceneClearRequested>()
            .add_event::<SceneErrorEvent>();
    }
}
