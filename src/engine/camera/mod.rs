//! Orbit viewport camera: navigation, terrain framing, and surface
//! picking for pointer input.

pub mod viewport_camera;
