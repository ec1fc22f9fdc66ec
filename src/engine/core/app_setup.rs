use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_common_assets::json::JsonAssetPlugin;

use crate::EngineSet;
use crate::engine::camera::viewport_camera::{ViewportCamera, camera_controller};
use crate::engine::core::app_state::{SessionState, transition_to_running};
use crate::engine::errors::SceneError;
use crate::engine::events::SceneErrorEvent;
use crate::engine::terrain::manifest::TerrainManifest;

/// Core scene hosting: render surface checks, camera and lighting,
/// terrain manifest asset registration, and the orbit controller.
pub struct SceneCorePlugin;

impl Plugin for SceneCorePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(JsonAssetPlugin::<TerrainManifest>::new(&["terrain.json"]))
            .init_state::<SessionState>()
            .init_resource::<ViewportCamera>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                transition_to_running.run_if(in_state(SessionState::Initializing)),
            )
            .add_systems(
                Update,
                camera_controller
                    .in_set(EngineSet::Feedback)
                    .run_if(in_state(SessionState::Running)),
            );
    }
}

/// Default plugin group for a standalone app: windowed, with asset meta
/// checks disabled so plain directories serve as asset sources.
pub fn create_default_plugins(title: &str) -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(Window {
            title: title.to_string(),
            ..default()
        }),
        ..default()
    };
    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };
    DefaultPlugins.set(window_config).set(asset_config)
}

fn setup_scene(
    mut commands: Commands,
    windows: Query<(), With<PrimaryWindow>>,
    mut errors: EventWriter<SceneErrorEvent>,
) {
    // A missing primary window means no render surface could be created;
    // fatal for the session, reported once.
    if windows.is_empty() {
        errors.write(
            SceneError::InitializationFailure("no primary window available".into()).into(),
        );
        return;
    }

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-30.0, 40.0, 60.0).looking_at(Vec3::ZERO, Vec3::Y),
        Name::new("scene_camera"),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(
            EulerRot::ZYX,
            0.0,
            1.0,
            -std::f32::consts::FRAC_PI_4,
        )),
        Name::new("sun"),
    ));
}
