//! Transform gizmo: immediate-mode handles drawn around the selected
//! instance, with drag gestures for translate (surface-following), rotate
//! (yaw ring), and scale. Scaling is uniform: one factor applied to all
//! three axes.
//!
//! While a drag is live the orbit camera is locked and every tick emits
//! `AssetUpdated { from_gizmo: true }` — the scene graph is already
//! mutated, so the reconciler skips these and persistence ignores them.
//! Release emits `AssetMoveFinished` plus a single committing update with
//! a re-derived snapped Y.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::EngineSet;
use crate::constants::render_settings::{
    GIZMO_HANDLE_SIZE, GIZMO_RING_RADIUS, GIZMO_SCALE_SENSITIVITY,
};
use crate::engine::assets::reconciler::GizmoAttachment;
use crate::engine::assets::registry::AssetRegistry;
use crate::engine::assets::snapping::ModelFootprint;
use crate::engine::camera::viewport_camera::ViewportCamera;
use crate::engine::events::{AssetMoveFinished, AssetMoveStarted, AssetUpdated};
use crate::engine::terrain::grid::TerrainGrid;
use crate::engine::terrain::heightmap::{TerrainHeightfield, surface_height_at};
use crate::tools::placement::ray::ray_point_distance;
use crate::tools::placement::state::InteractionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Translate,
    Rotate,
    Scale,
}

#[derive(Resource, Default)]
pub struct TransformGizmoState {
    pub dragging: Option<DragKind>,
    drag_start_cursor: Vec2,
    initial_rotation: Quat,
    initial_scale: Vec3,
}

/// Mirror the interaction selection into the gizmo attachment. The
/// attachment holds only the id; the registry stays the sole owner of
/// instance lifetime.
pub fn attach_gizmo_to_selection(
    state: Res<InteractionState>,
    mut attachment: ResMut<GizmoAttachment>,
    mut gizmo_state: ResMut<TransformGizmoState>,
) {
    let selected = state.selected_id().map(str::to_string);
    if attachment.id != selected {
        attachment.id = selected;
        gizmo_state.dragging = None;
    }
}

/// Handle positions in world space for the attached instance.
struct HandleLayout {
    origin: Vec3,
    translate: Vec3,
    scale: Vec3,
    ring_radius: f32,
}

fn handle_layout(transform: &Transform, footprint: Option<&ModelFootprint>) -> HandleLayout {
    let height = footprint
        .map(|fp| fp.size().y * transform.scale.y)
        .unwrap_or(2.0);
    let radius = footprint
        .map(|fp| {
            let half = fp.half_extents();
            Vec2::new(half.x, half.z).length() * transform.scale.x.max(transform.scale.z)
        })
        .unwrap_or(1.0)
        .max(GIZMO_RING_RADIUS);
    let origin = transform.translation;
    HandleLayout {
        origin,
        translate: origin + Vec3::Y * (height + 0.6),
        scale: origin + Vec3::new(radius * 0.8, height + 0.6, 0.0),
        ring_radius: radius,
    }
}

pub fn draw_transform_gizmo(
    mut gizmos: Gizmos,
    attachment: Res<GizmoAttachment>,
    gizmo_state: Res<TransformGizmoState>,
    registry: Res<AssetRegistry>,
    instances: Query<(&Transform, Option<&ModelFootprint>)>,
) {
    let Some(root) = attachment.id.as_deref().and_then(|id| registry.root_of(id)) else {
        return;
    };
    let Ok((transform, footprint)) = instances.get(root) else {
        return;
    };
    let layout = handle_layout(transform, footprint);

    let highlight = Color::srgb(1.0, 1.0, 0.2);
    let translate_color = if gizmo_state.dragging == Some(DragKind::Translate) {
        highlight
    } else {
        Color::srgb(0.15, 0.55, 0.95)
    };
    let rotate_color = if gizmo_state.dragging == Some(DragKind::Rotate) {
        highlight
    } else {
        Color::srgb(0.15, 0.95, 0.35)
    };
    let scale_color = if gizmo_state.dragging == Some(DragKind::Scale) {
        highlight
    } else {
        Color::srgb(0.95, 0.45, 0.15)
    };

    gizmos.line(layout.origin, layout.translate, translate_color);
    gizmos.sphere(layout.translate, GIZMO_HANDLE_SIZE, translate_color);

    gizmos.circle(
        Isometry3d::new(
            layout.origin,
            Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        ),
        layout.ring_radius,
        rotate_color,
    );

    gizmos.line(layout.translate, layout.scale, scale_color);
    gizmos.cuboid(
        Transform::from_translation(layout.scale).with_scale(Vec3::splat(GIZMO_HANDLE_SIZE * 2.0)),
        scale_color,
    );
}

pub fn handle_gizmo_drag(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    viewport: Res<ViewportCamera>,
    attachment: Res<GizmoAttachment>,
    registry: Res<AssetRegistry>,
    grid: Option<Res<TerrainGrid>>,
    heightfield: Option<Res<TerrainHeightfield>>,
    images: Res<Assets<Image>>,
    mut gizmo_state: ResMut<TransformGizmoState>,
    mut instances: Query<(&mut Transform, Option<&ModelFootprint>)>,
    mut updated: EventWriter<AssetUpdated>,
    mut move_started: EventWriter<AssetMoveStarted>,
    mut move_finished: EventWriter<AssetMoveFinished>,
) {
    let Some(id) = attachment.id.clone() else {
        gizmo_state.dragging = None;
        return;
    };
    let Some(root) = registry.root_of(&id) else {
        return;
    };
    let Ok((mut transform, footprint)) = instances.get_mut(root) else {
        return;
    };
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor_pos) = window.cursor_position() else {
        return;
    };
    let Ok((cam_transform, camera)) = cameras.single() else {
        return;
    };

    if buttons.just_pressed(MouseButton::Left) && gizmo_state.dragging.is_none() {
        let Ok(ray) = camera.viewport_to_world(cam_transform, cursor_pos) else {
            return;
        };
        let layout = handle_layout(&transform, footprint);
        let origin = ray.origin;
        let direction = ray.direction.as_vec3();
        let grab_radius = GIZMO_HANDLE_SIZE * 2.5;

        let kind = if ray_point_distance(origin, direction, layout.translate) < grab_radius {
            Some(DragKind::Translate)
        } else if ray_point_distance(origin, direction, layout.scale) < grab_radius {
            Some(DragKind::Scale)
        } else if ring_grabbed(origin, direction, &layout) {
            Some(DragKind::Rotate)
        } else {
            None
        };

        if let Some(kind) = kind {
            gizmo_state.dragging = Some(kind);
            gizmo_state.drag_start_cursor = cursor_pos;
            gizmo_state.initial_rotation = transform.rotation;
            gizmo_state.initial_scale = transform.scale;
            move_started.write(AssetMoveStarted { id: id.clone() });
        }
        return;
    }

    let Some(kind) = gizmo_state.dragging else {
        return;
    };

    let ground_y = grid.as_ref().map(|g| g.ground_y).unwrap_or(0.0);
    let surface_at = |x: f32, z: f32| {
        surface_height_at(heightfield.as_deref(), &images, ground_y, x, z)
    };

    if buttons.pressed(MouseButton::Left) {
        match kind {
            DragKind::Translate => {
                let Some(hit) = viewport.cursor_to_surface(
                    cursor_pos,
                    camera,
                    cam_transform,
                    heightfield.as_deref(),
                    &images,
                ) else {
                    return;
                };
                let y = snapped_y(footprint, hit.y, transform.scale.y);
                transform.translation = Vec3::new(hit.x, y, hit.z);
            }
            DragKind::Rotate => {
                let delta = cursor_pos.x - gizmo_state.drag_start_cursor.x;
                transform.rotation =
                    Quat::from_rotation_y(delta * 0.01) * gizmo_state.initial_rotation;
            }
            DragKind::Scale => {
                // Uniform constraint: one factor, all three axes.
                let delta = cursor_pos - gizmo_state.drag_start_cursor;
                let factor =
                    (1.0 + (delta.x - delta.y) * GIZMO_SCALE_SENSITIVITY).clamp(0.05, 20.0);
                transform.scale = gizmo_state.initial_scale * factor;
                // Scale edits re-snap, not merely translate.
                let surface = surface_at(transform.translation.x, transform.translation.z);
                transform.translation.y = snapped_y(footprint, surface, transform.scale.y);
            }
        }

        let rotation = transform.rotation.to_euler(EulerRot::XYZ);
        updated.write(AssetUpdated {
            id: id.clone(),
            position: Some(transform.translation),
            rotation: Some(Vec3::new(rotation.0, rotation.1, rotation.2)),
            scale: Some(transform.scale),
            from_gizmo: true,
        });
        return;
    }

    // Release: re-snap once more (rotation edits included) and commit.
    gizmo_state.dragging = None;
    let surface = surface_at(transform.translation.x, transform.translation.z);
    transform.translation.y = snapped_y(footprint, surface, transform.scale.y);
    let rotation = transform.rotation.to_euler(EulerRot::XYZ);
    move_finished.write(AssetMoveFinished { id: id.clone() });
    updated.write(AssetUpdated {
        id,
        position: Some(transform.translation),
        rotation: Some(Vec3::new(rotation.0, rotation.1, rotation.2)),
        scale: Some(transform.scale),
        from_gizmo: false,
    });
}

/// Lock the orbit camera whenever a manipulation gesture owns the
/// pointer: a live gizmo drag or a picked-up asset.
pub fn update_orbit_lock(
    gizmo_state: Res<TransformGizmoState>,
    interaction: Res<InteractionState>,
    mut viewport: ResMut<ViewportCamera>,
) {
    viewport.orbit_locked = gizmo_state.dragging.is_some() || interaction.picked_id().is_some();
}

fn snapped_y(footprint: Option<&ModelFootprint>, surface_y: f32, scale_y: f32) -> f32 {
    match footprint {
        Some(fp) => fp.snapped_y(surface_y, scale_y),
        None => surface_y,
    }
}

/// The rotate ring counts as grabbed when the ray passes near the ring
/// band at the instance's base height.
fn ring_grabbed(origin: Vec3, direction: Vec3, layout: &HandleLayout) -> bool {
    if direction.y.abs() < 1e-4 {
        return false;
    }
    let t = (layout.origin.y - origin.y) / direction.y;
    if t <= 0.0 {
        return false;
    }
    let hit = origin + direction * t;
    let offset = hit - layout.origin;
    let radial = Vec2::new(offset.x, offset.z).length();
    (radial - layout.ring_radius).abs() < GIZMO_HANDLE_SIZE * 2.0
}

pub struct GizmoSystemsPlugin;

impl Plugin for GizmoSystemsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TransformGizmoState>().add_systems(
            Update,
            (draw_transform_gizmo, update_orbit_lock).in_set(EngineSet::Feedback),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_grab_requires_proximity_to_the_band() {
        let layout = HandleLayout {
            origin: Vec3::ZERO,
            translate: Vec3::Y * 2.0,
            scale: Vec3::new(1.0, 2.0, 0.0),
            ring_radius: 2.0,
        };
        // Straight down onto the band.
        assert!(ring_grabbed(
            Vec3::new(2.0, 5.0, 0.0),
            Vec3::NEG_Y,
            &layout
        ));
        // Straight down through the middle misses the band.
        assert!(!ring_grabbed(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, &layout));
    }
}
