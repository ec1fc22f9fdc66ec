//! Terrain lifecycle: manifest loading, surface install/teardown, grid
//! mapping, and the overlay.
//!
//! State machine per terrain URL: `Idle -> Loading -> {Loaded | Failed}`.
//! A new `TerrainSelected` event always tears the previous terrain down
//! first (surface, overlay, heightfield, grid, and a visual-only clear of
//! every placed instance) so switching terrains never leaks scene nodes
//! or fires persistence deletions.

pub mod grid;
pub mod heightmap;
pub mod manifest;
pub mod overlay;
pub mod surface;

use bevy::asset::LoadState;
use bevy::prelude::*;

use crate::EngineSet;
use crate::constants::render_settings::DEFAULT_CELL_SIZE;
use crate::engine::camera::viewport_camera::ViewportCamera;
use crate::engine::errors::SceneError;
use crate::engine::events::{
    SceneClearRequested, SceneErrorEvent, TerrainError, TerrainLoaded, TerrainSelected,
};
use grid::TerrainGrid;
use heightmap::TerrainHeightfield;
use manifest::TerrainManifest;
use overlay::{GridOverlay, spawn_grid_overlay, toggle_grid_overlay};
use surface::{build_ground_plane_mesh, build_heightfield_mesh};

/// Marker for the rendered terrain surface (heightfield or fallback
/// ground plane).
#[derive(Component)]
pub struct TerrainSurface;

/// Identity of the currently installed terrain; persistence requests are
/// scoped by it.
#[derive(Resource, Debug, Clone)]
pub struct ActiveTerrain {
    pub terrain_id: String,
}

/// Saved layout dimensions supplied by the host, used to size the
/// fallback ground when no terrain URL is given.
#[derive(Resource, Debug, Clone, Copy)]
pub struct FallbackLayout {
    pub cells_x: u32,
    pub cells_z: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerrainPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Loader state machine. `Failed` is sticky until the next URL arrives.
#[derive(Resource, Default)]
pub struct TerrainLoader {
    pub phase: TerrainPhase,
    url: Option<String>,
    manifest_handle: Option<Handle<TerrainManifest>>,
    heightmap_handle: Option<Handle<Image>>,
    pending_manifest: Option<TerrainManifest>,
}

pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TerrainLoader>().add_systems(
            Update,
            (
                handle_terrain_selected.in_set(EngineSet::Input),
                poll_terrain_manifest.in_set(EngineSet::Input),
                poll_terrain_heightmap.in_set(EngineSet::Input),
                toggle_grid_overlay.in_set(EngineSet::Feedback),
            ),
        );
    }
}

fn handle_terrain_selected(
    mut events: EventReader<TerrainSelected>,
    mut loader: ResMut<TerrainLoader>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut camera: ResMut<ViewportCamera>,
    mut clear_events: EventWriter<SceneClearRequested>,
    asset_server: Res<AssetServer>,
    fallback: Option<Res<FallbackLayout>>,
    stale: Query<Entity, Or<(With<TerrainSurface>, With<GridOverlay>)>>,
) {
    // Only the most recent selection matters when several arrive at once.
    let Some(selected) = events.read().last().cloned() else {
        return;
    };

    // Teardown: surface + overlay entities release their mesh and
    // material handles on despawn; instances are cleared visually, with
    // no per-asset deletions reaching persistence.
    for entity in &stale {
        commands.entity(entity).despawn();
    }
    commands.remove_resource::<TerrainHeightfield>();
    commands.remove_resource::<TerrainGrid>();
    commands.remove_resource::<ActiveTerrain>();
    clear_events.write(SceneClearRequested);

    loader.manifest_handle = None;
    loader.heightmap_handle = None;
    loader.pending_manifest = None;

    match selected.url {
        Some(url) => {
            info!("→ Loading terrain manifest {url}");
            loader.manifest_handle = Some(asset_server.load(url.clone()));
            loader.url = Some(url);
            loader.phase = TerrainPhase::Loading;
        }
        None => {
            // No terrain: install the fallback ground extent directly.
            let cells = fallback.map(|f| (f.cells_x, f.cells_z));
            let grid = TerrainGrid::fallback(cells);
            install_ground_plane(&mut commands, &mut meshes, &mut materials, &grid);
            let extent = grid.extent_max() - grid.extent_min();
            camera.fit_to_bounds(Vec3::ZERO, Vec3::new(extent.x, 0.0, extent.y));
            commands.insert_resource(grid);
            commands.insert_resource(ActiveTerrain {
                terrain_id: "default".into(),
            });
            loader.url = None;
            loader.phase = TerrainPhase::Idle;
        }
    }
}

fn poll_terrain_manifest(
    mut loader: ResMut<TerrainLoader>,
    manifests: Res<Assets<TerrainManifest>>,
    asset_server: Res<AssetServer>,
    mut errors: EventWriter<SceneErrorEvent>,
    mut terrain_errors: EventWriter<TerrainError>,
) {
    if loader.phase != TerrainPhase::Loading || loader.pending_manifest.is_some() {
        return;
    }
    let Some(handle) = loader.manifest_handle.clone() else {
        return;
    };

    if let Some(manifest) = manifests.get(&handle) {
        println!("✓ Terrain manifest loaded");
        loader.heightmap_handle = Some(asset_server.load(manifest.heightmap.clone()));
        loader.pending_manifest = Some(manifest.clone());
    } else if let Some(LoadState::Failed(err)) = asset_server.get_load_state(handle.id()) {
        fail_terrain(&mut loader, &mut errors, &mut terrain_errors, &err.to_string());
    }
}

fn poll_terrain_heightmap(
    mut loader: ResMut<TerrainLoader>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut camera: ResMut<ViewportCamera>,
    images: Res<Assets<Image>>,
    asset_server: Res<AssetServer>,
    mut loaded_events: EventWriter<TerrainLoaded>,
    mut errors: EventWriter<SceneErrorEvent>,
    mut terrain_errors: EventWriter<TerrainError>,
) {
    if loader.phase != TerrainPhase::Loading {
        return;
    }
    let (Some(handle), Some(manifest)) =
        (loader.heightmap_handle.clone(), loader.pending_manifest.clone())
    else {
        return;
    };

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {}
        Some(LoadState::Failed(err)) => {
            let reason = err.to_string();
            fail_terrain(&mut loader, &mut errors, &mut terrain_errors, &reason);
            return;
        }
        _ => return,
    }

    let heightfield = TerrainHeightfield {
        image: handle,
        bounds: manifest.bounds.clone(),
    };

    // Grid dimensions: explicit manifest values win, else the extent is
    // partitioned at the default cell pitch.
    let min = Vec2::new(manifest.bounds.min_x, manifest.bounds.min_z);
    let max = Vec2::new(manifest.bounds.max_x, manifest.bounds.max_z);
    let ground = manifest.bounds.ground_height();
    let grid = match (manifest.grid_width, manifest.grid_height) {
        (Some(w), Some(h)) => TerrainGrid::new(min, max, w, h, ground),
        _ => TerrainGrid::from_cell_size(
            min,
            max,
            manifest.cell_size.unwrap_or(DEFAULT_CELL_SIZE),
            ground,
        ),
    };

    commands.spawn((
        Mesh3d(meshes.add(build_heightfield_mesh(&heightfield, &images))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.45, 0.5, 0.38),
            perceptual_roughness: 0.95,
            ..default()
        })),
        Transform::IDENTITY,
        TerrainSurface,
        Name::new("terrain_surface"),
    ));
    spawn_grid_overlay(
        &mut commands,
        &mut meshes,
        &mut materials,
        &grid,
        Some((&heightfield, &images)),
    );

    camera.fit_to_bounds(manifest.bounds.center(), manifest.bounds.size());
    camera.ground_height = ground;

    let terrain_id = loader.url.clone().unwrap_or_else(|| "default".into());
    println!("✓ Terrain installed: {terrain_id}");
    commands.insert_resource(heightfield);
    commands.insert_resource(grid);
    commands.insert_resource(ActiveTerrain {
        terrain_id: terrain_id.clone(),
    });
    loaded_events.write(TerrainLoaded { terrain_id });
    loader.phase = TerrainPhase::Loaded;
}

fn install_ground_plane(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    grid: &TerrainGrid,
) {
    let center = (grid.extent_min() + grid.extent_max()) * 0.5;
    commands.spawn((
        Mesh3d(meshes.add(build_ground_plane_mesh(grid))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.35, 0.37, 0.4),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::from_xyz(center.x, grid.ground_y, center.y),
        TerrainSurface,
        Name::new("fallback_ground"),
    ));

    spawn_grid_overlay(commands, meshes, materials, grid, None);
}

fn fail_terrain(
    loader: &mut TerrainLoader,
    errors: &mut EventWriter<SceneErrorEvent>,
    terrain_errors: &mut EventWriter<TerrainError>,
    reason: &str,
) {
    let path = loader.url.clone().unwrap_or_default();
    warn!("Terrain load failed for {path}: {reason}");
    errors.write(
        SceneError::LoadFailure {
            path,
            reason: reason.to_string(),
        }
        .into(),
    );
    terrain_errors.write(TerrainError {
        message: reason.to_string(),
    });
    loader.phase = TerrainPhase::Failed;
    loader.manifest_handle = None;
    loader.heightmap_handle = None;
    loader.pending_manifest = None;
}
