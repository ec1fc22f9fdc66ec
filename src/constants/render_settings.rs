use bevy::prelude::*;

/// Distance from the camera at which an instance drops from the full
/// model to the flat-shaded clone.
pub const LOD_MEDIUM_DISTANCE: f32 = 40.0;
/// Distance at which the flat-shaded clone gives way to the proxy quad.
pub const LOD_FAR_DISTANCE: f32 = 90.0;

/// Fill colours for the cell highlight quad.
pub const HIGHLIGHT_FREE_COLOR: Color = Color::srgba(0.2, 0.85, 0.3, 0.45);
pub const HIGHLIGHT_OCCUPIED_COLOR: Color = Color::srgba(0.9, 0.2, 0.2, 0.55);
/// Lift applied to the highlight quad so it never z-fights the surface.
pub const HIGHLIGHT_SURFACE_LIFT: f32 = 0.02;

/// Wireframe-style tint applied to the selected instance's proxy tier.
pub const SELECTION_TINT: Color = Color::srgb(1.0, 0.85, 0.2);

/// Camera distance multiplier when framing a freshly loaded terrain,
/// chosen so the full extent fits the default vertical field of view.
pub const CAMERA_FIT_FACTOR: f32 = 1.2;

/// Grid extent used when no terrain is loaded and the host supplied no
/// layout dimensions: a 20x20 cell ground plane with 2-unit cells.
pub const FALLBACK_GRID_CELLS: u32 = 20;
pub const FALLBACK_CELL_SIZE: f32 = 2.0;

/// World-units-per-cell used when a terrain manifest carries no explicit
/// grid dimensions and the extent must be partitioned by cell pitch.
pub const DEFAULT_CELL_SIZE: f32 = 2.0;

/// Tolerance for the snap invariant: an instance's bounding-box floor may
/// differ from the supporting surface by at most this much.
pub const SNAP_EPSILON: f32 = 1e-3;

/// Seconds a locally committed mutation suppresses the matching
/// external-sync echo for its id.
pub const SYNC_SUPPRESSION_WINDOW: f32 = 2.0;

/// Gizmo handle geometry, in world units before camera-distance scaling.
pub const GIZMO_RING_RADIUS: f32 = 1.6;
pub const GIZMO_HANDLE_SIZE: f32 = 0.22;
pub const GIZMO_SCALE_SENSITIVITY: f32 = 0.01;
