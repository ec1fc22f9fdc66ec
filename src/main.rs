use bevy::prelude::*;

use terrain_placement_engine::TerrainPlacementPlugin;
use terrain_placement_engine::engine::core::app_setup::create_default_plugins;
use terrain_placement_engine::engine::events::TerrainSelected;
use terrain_placement_engine::engine::terrain::FallbackLayout;

/// Standalone demo: fallback ground extent, logging callbacks, and the
/// full placement engine. A host application would add its own
/// `ExternalInterface` and drive `SceneAssets` / the palette events.
fn main() {
    App::new()
        .add_plugins(create_default_plugins("terrain placement engine"))
        .add_plugins(TerrainPlacementPlugin)
        .insert_resource(FallbackLayout {
            cells_x: 20,
            cells_z: 20,
        })
        .add_systems(Startup, select_default_terrain)
        .run();
}

fn select_default_terrain(mut terrain: EventWriter<TerrainSelected>) {
    // No terrain URL: the engine installs the fallback ground plane and
    // grid so placement works out of the box.
    terrain.write(TerrainSelected { url: None });
}
