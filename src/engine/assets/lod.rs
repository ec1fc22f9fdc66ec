//! Three-tier detail wrapper around every loaded instance: the full model
//! near the camera, a flat-shaded clone at a medium distance, and a quad
//! proxy beyond that. Thresholds are fixed distances, not configurable.

use bevy::prelude::*;

use crate::EngineSet;
use crate::constants::render_settings::{LOD_FAR_DISTANCE, LOD_MEDIUM_DISTANCE, SELECTION_TINT};
use crate::engine::assets::registry::AssetRegistry;
use crate::engine::events::AssetSelected;

/// Which representation a child entity carries.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailTier {
    Full,
    Medium,
    Proxy,
}

impl DetailTier {
    /// Tier visible at a given camera distance.
    pub fn for_distance(distance: f32) -> Self {
        if distance < LOD_MEDIUM_DISTANCE {
            DetailTier::Full
        } else if distance < LOD_FAR_DISTANCE {
            DetailTier::Medium
        } else {
            DetailTier::Proxy
        }
    }
}

/// Marker on instance roots whose tier children need visibility driving.
#[derive(Component)]
pub struct AssetRoot;

/// Medium-tier clones spawn with their source materials; this marker asks
/// the flattening system to swap them for the shared flat material once
/// the clone's scene instance has produced its mesh entities.
#[derive(Component)]
pub struct NeedsFlatShading;

/// Shared handles for the cheap tiers.
#[derive(Resource)]
pub struct LodMaterials {
    pub flat: Handle<StandardMaterial>,
}

impl FromWorld for LodMaterials {
    fn from_world(world: &mut World) -> Self {
        let mut materials = world.resource_mut::<Assets<StandardMaterial>>();
        Self {
            flat: materials.add(StandardMaterial {
                base_color: Color::srgb(0.6, 0.58, 0.52),
                unlit: true,
                ..default()
            }),
        }
    }
}

pub struct LodPlugin;

impl Plugin for LodPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LodMaterials>().add_systems(
            Update,
            (flatten_medium_tier, select_detail_tier, tint_selected_instance)
                .in_set(EngineSet::Feedback),
        );
    }
}

/// Colour of an unselected proxy tier.
pub const PROXY_BASE_COLOR: Color = Color::srgb(0.55, 0.53, 0.5);

/// Swap the selected instance's per-instance materials to the selection
/// tint and restore the previous selection, mirroring wireframe recolour
/// feedback.
fn tint_selected_instance(
    mut selections: EventReader<AssetSelected>,
    mut previous: Local<Option<String>>,
    registry: Res<AssetRegistry>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for AssetSelected { id } in selections.read() {
        if let Some(old) = previous.take() {
            recolor(&registry, &mut materials, &old, PROXY_BASE_COLOR);
        }
        if let Some(id) = id {
            recolor(&registry, &mut materials, id, SELECTION_TINT);
            *previous = Some(id.clone());
        }
    }
}

fn recolor(
    registry: &AssetRegistry,
    materials: &mut Assets<StandardMaterial>,
    id: &str,
    color: Color,
) {
    let Some(entry) = registry.entry(id) else {
        return;
    };
    for handle in &entry.materials {
        if let Some(material) = materials.get_mut(handle) {
            material.base_color = color;
        }
    }
}

/// Swap every material under a medium-tier clone for the flat one. Runs
/// until the clone's scene instance has spawned meshes, then unmarks it.
fn flatten_medium_tier(
    mut commands: Commands,
    lod_materials: Res<LodMaterials>,
    pending: Query<Entity, With<NeedsFlatShading>>,
    children: Query<&Children>,
    mut mesh_materials: Query<&mut MeshMaterial3d<StandardMaterial>>,
) {
    for tier in &pending {
        let mut swapped = false;
        for descendant in children.iter_descendants(tier) {
            if let Ok(mut material) = mesh_materials.get_mut(descendant) {
                material.0 = lod_materials.flat.clone();
                swapped = true;
            }
        }
        if swapped {
            commands.entity(tier).remove::<NeedsFlatShading>();
        }
    }
}

/// Drive tier visibility from camera distance, once per frame.
fn select_detail_tier(
    cameras: Query<&GlobalTransform, With<Camera3d>>,
    roots: Query<(&GlobalTransform, &Children), With<AssetRoot>>,
    mut tiers: Query<(&DetailTier, &mut Visibility)>,
) {
    let Ok(camera) = cameras.single() else {
        return;
    };
    let camera_pos = camera.translation();

    for (root_transform, children) in &roots {
        let active = DetailTier::for_distance(root_transform.translation().distance(camera_pos));
        for child in children.iter() {
            if let Ok((tier, mut visibility)) = tiers.get_mut(child) {
                *visibility = if *tier == active {
                    Visibility::Inherited
                } else {
                    Visibility::Hidden
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds_are_fixed_distances() {
        assert_eq!(DetailTier::for_distance(0.0), DetailTier::Full);
        assert_eq!(
            DetailTier::for_distance(LOD_MEDIUM_DISTANCE - 0.1),
            DetailTier::Full
        );
        assert_eq!(
            DetailTier::for_distance(LOD_MEDIUM_DISTANCE + 0.1),
            DetailTier::Medium
        );
        assert_eq!(
            DetailTier::for_distance(LOD_FAR_DISTANCE + 0.1),
            DetailTier::Proxy
        );
    }
}
