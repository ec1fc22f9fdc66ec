use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// World-space extent of a terrain, as stored in its manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub max_z: f32,
}

impl TerrainBounds {
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
            (self.min_z + self.max_z) * 0.5,
        )
    }

    pub fn size(&self) -> Vec3 {
        Vec3::new(
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        )
    }

    pub fn ground_height(&self) -> f32 {
        self.min_y
    }
}

/// Terrain manifest as a loadable JSON asset: names the heightmap image,
/// the world bounds it spans, and optionally how the extent is gridded.
/// When `grid_width`/`grid_height` are absent the extent is partitioned by
/// the configured cell pitch instead.
#[derive(Asset, Debug, Clone, Serialize, Deserialize, TypePath)]
pub struct TerrainManifest {
    pub heightmap: String,
    pub bounds: TerrainBounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_size: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_without_optional_fields() {
        let json = r#"{
            "heightmap": "terrain/riverbed_height.png",
            "bounds": {
                "min_x": -50.0, "min_y": 0.0, "min_z": -50.0,
                "max_x": 50.0, "max_y": 12.0, "max_z": 50.0
            }
        }"#;
        let manifest: TerrainManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.grid_width, None);
        assert_eq!(manifest.bounds.size(), Vec3::new(100.0, 12.0, 100.0));
        assert_eq!(manifest.bounds.ground_height(), 0.0);
    }
}
