//! Placement tool family.
//!
//! One state machine (`Idle -> Selected -> PickedUp`) drives three input
//! sources treated uniformly: viewport clicks, host pick-up requests, and
//! palette drag-and-drop. All of them resolve cells through the terrain
//! grid and validate occupancy through the same query, and none of them
//! touches a scene node directly — every mutation travels as an event to
//! the reconciler.

pub mod drop;
pub mod gizmo;
pub mod highlight;
pub mod interaction;
pub mod ray;
pub mod state;

use bevy::prelude::*;

use crate::EngineSet;
use drop::{handle_palette_drag, handle_palette_drop};
use gizmo::{GizmoSystemsPlugin, attach_gizmo_to_selection, handle_gizmo_drag};
use highlight::{HighlightQuad, apply_cell_highlight, clear_highlight_on_terrain_switch};
use interaction::{
    cancel_on_escape, drop_stale_interaction, handle_click, handle_pick_up_requests,
    hover_highlight_while_picked,
};
use state::InteractionState;

pub struct PlacementPlugin;

impl Plugin for PlacementPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(GizmoSystemsPlugin)
            .init_resource::<InteractionState>()
            .init_resource::<HighlightQuad>()
            .add_systems(
                Update,
                (
                    handle_pick_up_requests,
                    attach_gizmo_to_selection,
                    // Gizmo drags claim the pointer press before the
                    // click handler sees it.
                    handle_gizmo_drag,
                    handle_click,
                    hover_highlight_while_picked,
                    handle_palette_drag,
                    handle_palette_drop,
                    cancel_on_escape,
                )
                    .chain()
                    .in_set(EngineSet::Input),
            )
            .add_systems(
                Update,
                (
                    drop_stale_interaction.in_set(EngineSet::Persist),
                    (apply_cell_highlight, clear_highlight_on_terrain_switch)
                        .in_set(EngineSet::Feedback),
                ),
            );
    }
}
