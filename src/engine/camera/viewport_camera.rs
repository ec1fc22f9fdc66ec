use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::constants::render_settings::CAMERA_FIT_FACTOR;
use crate::engine::terrain::heightmap::TerrainHeightfield;

/// Orbit camera state. The controller system interpolates the real
/// `Camera3d` transform toward the pose described here every frame.
#[derive(Resource)]
pub struct ViewportCamera {
    pub focus_point: Vec3,
    pub distance: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub ground_height: f32,
    /// Set while a gizmo drag is in progress so camera input never fights
    /// the manipulation gesture.
    pub orbit_locked: bool,
}

impl Default for ViewportCamera {
    fn default() -> Self {
        Self {
            focus_point: Vec3::ZERO,
            distance: 60.0,
            pitch: -0.6,
            yaw: 0.0,
            ground_height: 0.0,
            orbit_locked: false,
        }
    }
}

impl ViewportCamera {
    /// Frame a target: orbit focus on its centre, at a distance scaled by
    /// the larger horizontal dimension and the field-of-view fit factor.
    pub fn fit_to_bounds(&mut self, center: Vec3, size: Vec3) {
        self.focus_point = center;
        self.distance = size.x.max(size.z).max(10.0) * CAMERA_FIT_FACTOR;
        self.pitch = -0.6;
    }

    pub fn view_rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// Resolve a cursor position to the point where its view ray meets
    /// the supporting surface: ray-marched against the heightfield when
    /// one is loaded, else intersected with the flat ground plane.
    pub fn cursor_to_surface(
        &self,
        cursor_pos: Vec2,
        camera: &Camera,
        camera_transform: &GlobalTransform,
        heightfield: Option<&TerrainHeightfield>,
        images: &Assets<Image>,
    ) -> Option<Vec3> {
        let ray = camera.viewport_to_world(camera_transform, cursor_pos).ok()?;
        match heightfield {
            Some(hf) => self.march_heightfield(&ray, hf, images),
            None => self.intersect_ground_plane(&ray),
        }
    }

    fn march_heightfield(
        &self,
        ray: &Ray3d,
        heightfield: &TerrainHeightfield,
        images: &Assets<Image>,
    ) -> Option<Vec3> {
        // Coarse march, refined by bisection once the ray dips below the
        // surface. Step scales with viewing distance.
        let step = (self.distance * 0.01).clamp(0.1, 2.0);
        let max_distance = self.distance * 4.0;
        let mut prev_t: Option<f32> = None;
        let mut t = 0.0;
        while t < max_distance {
            let point = ray.origin + ray.direction * t;
            if let Some(surface) = heightfield.height_at(images, point.x, point.z) {
                if point.y <= surface {
                    let t = match prev_t {
                        Some(prev) => bisect(ray, heightfield, images, prev, t),
                        None => t,
                    };
                    let hit = ray.origin + ray.direction * t;
                    let y = heightfield.height_at(images, hit.x, hit.z)?;
                    return Some(Vec3::new(hit.x, y, hit.z));
                }
                prev_t = Some(t);
            }
            t += step;
        }
        None
    }

    fn intersect_ground_plane(&self, ray: &Ray3d) -> Option<Vec3> {
        if ray.direction.y.abs() < 1e-4 {
            return None;
        }
        let t = (self.ground_height - ray.origin.y) / ray.direction.y;
        (t > 0.0).then(|| ray.origin + ray.direction * t)
    }
}

fn bisect(
    ray: &Ray3d,
    heightfield: &TerrainHeightfield,
    images: &Assets<Image>,
    mut above: f32,
    mut below: f32,
) -> f32 {
    for _ in 0..6 {
        let mid = (above + below) * 0.5;
        let point = ray.origin + ray.direction * mid;
        match heightfield.height_at(images, point.x, point.z) {
            Some(surface) if point.y > surface => above = mid,
            _ => below = mid,
        }
    }
    (above + below) * 0.5
}

/// Damped orbit controller: right-drag look, scroll dolly, WASD/QE pan.
/// All input is ignored while a gizmo drag holds the orbit lock.
pub fn camera_controller(
    mut cameras: Query<&mut Transform, With<Camera3d>>,
    mut viewport: ResMut<ViewportCamera>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut scroll_events: EventReader<MouseWheel>,
    keyboard: Res<ButtonInput<KeyCode>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    time: Res<Time>,
) {
    let Ok(mut camera_transform) = cameras.single_mut() else {
        return;
    };
    if windows.single().is_err() {
        return;
    }

    let mouse_delta: Vec2 = mouse_motion.read().map(|m| m.delta).sum();
    let mut scroll = 0.0;
    for ev in scroll_events.read() {
        scroll += match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y * 0.05,
        };
    }

    if !viewport.orbit_locked {
        if mouse_button.pressed(MouseButton::Right) && mouse_delta != Vec2::ZERO {
            viewport.yaw -= mouse_delta.x * 0.0035;
            viewport.pitch = (viewport.pitch - mouse_delta.y * 0.003).clamp(-1.55, -0.05);
        }

        if scroll.abs() > f32::EPSILON {
            let dolly = (viewport.distance * 0.15).clamp(0.5, 200.0);
            viewport.distance = (viewport.distance - scroll * dolly).max(2.0);
        }

        let mut pan = Vec3::ZERO;
        if keyboard.pressed(KeyCode::KeyW) {
            pan.z -= 1.0;
        }
        if keyboard.pressed(KeyCode::KeyS) {
            pan.z += 1.0;
        }
        if keyboard.pressed(KeyCode::KeyD) {
            pan.x += 1.0;
        }
        if keyboard.pressed(KeyCode::KeyA) {
            pan.x -= 1.0;
        }
        if keyboard.pressed(KeyCode::KeyE) {
            pan.y += 1.0;
        }
        if keyboard.pressed(KeyCode::KeyQ) {
            pan.y -= 1.0;
        }
        if pan != Vec3::ZERO {
            let rot = Quat::from_rotation_y(viewport.yaw);
            let mut speed = (viewport.distance * 0.5).clamp(2.0, 120.0);
            if keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]) {
                speed *= 3.0;
            }
            let world = rot * Vec3::new(pan.x, 0.0, pan.z) + Vec3::Y * pan.y;
            viewport.focus_point += world.normalize() * speed * time.delta_secs();
        }
    }

    let target_rot = viewport.view_rotation();
    let target_pos = viewport.focus_point + target_rot * Vec3::new(0.0, 0.0, viewport.distance);

    let blend = (12.0 * time.delta_secs()).min(1.0);
    camera_transform.translation = camera_transform.translation.lerp(target_pos, blend);
    camera_transform.rotation = camera_transform.rotation.slerp(target_rot, blend);
}
