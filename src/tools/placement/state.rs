use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::assets::record::Vec3Data;

/// Pointer interaction lifecycle. `Selected` and `PickedUp` both carry
/// the asset id they refer to; instance lifetime stays with the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionMode {
    #[default]
    Idle,
    Selected(String),
    PickedUp(String),
}

#[derive(Resource, Debug, Default)]
pub struct InteractionState {
    pub mode: InteractionMode,
    /// Cell currently shown by the highlight quad, to avoid re-emitting
    /// an identical highlight every pointer move.
    pub highlighted_cell: Option<(u32, u32)>,
}

impl InteractionState {
    pub fn selected_id(&self) -> Option<&str> {
        match &self.mode {
            InteractionMode::Selected(id) | InteractionMode::PickedUp(id) => Some(id),
            InteractionMode::Idle => None,
        }
    }

    pub fn picked_id(&self) -> Option<&str> {
        match &self.mode {
            InteractionMode::PickedUp(id) => Some(id),
            _ => None,
        }
    }

    /// Force-return to `Idle` without emitting any mutation event. The
    /// host calls this to abort a pick-up gesture.
    pub fn cancel(&mut self) {
        self.mode = InteractionMode::Idle;
        self.highlighted_cell = None;
    }
}

/// Payload carried by a palette drag, as serialized by the host UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DropPayload {
    pub model_url: String,
    pub name: String,
    #[serde(default)]
    pub rotation: Vec3Data,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3Data>,
}

impl DropPayload {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Mint a fresh placement id for a dropped payload. Uniqueness, not
/// monotonicity, is the contract.
pub fn mint_drop_id(name: &str) -> String {
    format!("dragdrop-{}-{}", name, Uuid::new_v4().simple())
}
