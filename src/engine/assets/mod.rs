/// Three-tier detail wrapper and camera-distance tier selection.
pub mod lod;

/// Wire/record shapes shared with the host and the backend.
pub mod record;

/// Reconciliation of mutation events against the instance registry.
pub mod reconciler;

/// Bidirectional id <-> entity registry with disposal accounting.
pub mod registry;

/// Vertical snapping of instances onto the supporting surface.
pub mod snapping;
