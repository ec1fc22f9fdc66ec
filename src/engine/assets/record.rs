use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Plain vector triple used on every wire shape. Mirrors the JSON layout
/// exactly; converted to `Vec3` at the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Data {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3Data> for Vec3 {
    fn from(v: Vec3Data) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// One placed asset as the host and the backend see it. The engine never
/// mutates a record directly; every change travels as a mutation event
/// that the host applies to its own list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: String,
    pub model_url: String,
    pub name: String,
    pub position: Vec3Data,
    /// Euler angles (XYZ order), radians.
    pub rotation: Vec3Data,
    pub scale: Vec3Data,
}

impl AssetRecord {
    pub fn transform(&self) -> Transform {
        let r: Vec3 = self.rotation.into();
        Transform {
            translation: self.position.into(),
            rotation: Quat::from_euler(EulerRot::XYZ, r.x, r.y, r.z),
            scale: self.scale.into(),
        }
    }

    /// Deep equality over the transform fields only, used by the external
    /// sync diff. Identity fields (id, model, name) never change for a
    /// live record.
    pub fn same_transform(&self, other: &AssetRecord) -> bool {
        const EPS: f32 = 1e-5;
        let close = |a: Vec3Data, b: Vec3Data| {
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS && (a.z - b.z).abs() < EPS
        };
        close(self.position, other.position)
            && close(self.rotation, other.rotation)
            && close(self.scale, other.scale)
    }
}

/// Bulk layout replacement body for the terrain-layout endpoint
/// (`PUT { placedAssets: [...] }`). The clear operation sends this with an
/// empty list instead of issuing one deletion per asset.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlacedLayout {
    pub placed_assets: Vec<AssetRecord>,
}

/// Model-listing endpoint response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub models: Vec<ModelSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3Data>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3Data>,
}

/// Resolve a record's model URL to an asset path. Absolute URLs pass
/// through; leading slashes are stripped so the asset server treats the
/// remainder as relative to its root.
pub fn resolve_model_path(model_url: &str) -> String {
    if model_url.starts_with("http://") || model_url.starts_with("https://") {
        model_url.to_string()
    } else {
        model_url.trim_start_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, position: Vec3) -> AssetRecord {
        AssetRecord {
            id: id.into(),
            model_url: "models/barrel.glb".into(),
            name: "barrel".into(),
            position: position.into(),
            rotation: Vec3Data::default(),
            scale: Vec3::ONE.into(),
        }
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let json = serde_json::to_string(&record("a", Vec3::ZERO)).unwrap();
        assert!(json.contains("\"modelUrl\""));
        let layout = PlacedLayout {
            placed_assets: vec![record("a", Vec3::ZERO)],
        };
        assert!(serde_json::to_string(&layout).unwrap().contains("\"placedAssets\""));
    }

    #[test]
    fn transform_equality_ignores_identity_fields() {
        let a = record("a", Vec3::new(1.0, 2.0, 3.0));
        let mut b = record("b", Vec3::new(1.0, 2.0, 3.0));
        b.name = "crate".into();
        assert!(a.same_transform(&b));
        b.position.x += 0.5;
        assert!(!a.same_transform(&b));
    }

    #[test]
    fn catalog_parses_with_optional_metadata() {
        let json = r#"{
            "models": [
                {"id": "barrel", "name": "Barrel", "icon": "icons/barrel.png",
                 "metadata": {"scale": {"x": 1.0, "y": 1.0, "z": 1.0}}},
                {"id": "crate", "name": "Crate"}
            ]
        }"#;
        let catalog: ModelCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.models.len(), 2);
        assert!(catalog.models[1].icon.is_none());
        assert!(catalog.models[1].metadata.scale.is_none());
    }

    #[test]
    fn model_paths_resolve_relative_and_absolute() {
        assert_eq!(resolve_model_path("/models/barrel.glb"), "models/barrel.glb");
        assert_eq!(
            resolve_model_path("https://cdn.example/barrel.glb"),
            "https://cdn.example/barrel.glb"
        );
    }

    #[test]
    fn record_transform_applies_euler_rotation() {
        let mut rec = record("a", Vec3::ZERO);
        rec.rotation = Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0).into();
        let transform = rec.transform();
        let rotated = transform.rotation * Vec3::X;
        assert!((rotated - Vec3::NEG_Z).length() < 1e-5);
    }
}
