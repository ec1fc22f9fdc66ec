/// Pointer-driven placement: selection, pick-up moves, palette drops,
/// cell highlighting, and the transform gizmo.
pub mod placement;
