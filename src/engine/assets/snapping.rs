//! Vertical snapping: an instance's base always rests on the supporting
//! surface. Y is never taken from user input — every placement, move,
//! scale, or rotation edit re-derives it from the surface height at the
//! instance's XZ plus the instance's own bottom-to-origin offset.

use bevy::prelude::*;

/// Model-space bounding box of a loaded instance at unit scale, captured
/// once when the model finishes loading.
#[derive(Component, Debug, Clone, Copy)]
pub struct ModelFootprint {
    pub min: Vec3,
    pub max: Vec3,
}

impl ModelFootprint {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Origin Y that rests this footprint on a surface at `surface_y`,
    /// for the given scale. A model whose origin sits at its base has
    /// `min.y == 0` and lands exactly on the surface; any other origin is
    /// offset by its scaled distance to the base.
    pub fn snapped_y(&self, surface_y: f32, scale_y: f32) -> f32 {
        surface_y - self.min.y * scale_y
    }

    /// World-space minimum Y for an origin at `origin_y`: the quantity the
    /// snap invariant constrains to equal the surface height.
    pub fn base_y(&self, origin_y: f32, scale_y: f32) -> f32 {
        origin_y + self.min.y * scale_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::render_settings::SNAP_EPSILON;

    #[test]
    fn base_origin_model_rests_on_surface() {
        let footprint = ModelFootprint {
            min: Vec3::new(-0.5, 0.0, -0.5),
            max: Vec3::new(0.5, 2.0, 0.5),
        };
        let y = footprint.snapped_y(3.25, 1.0);
        assert!((footprint.base_y(y, 1.0) - 3.25).abs() < SNAP_EPSILON);
        assert_eq!(y, 3.25);
    }

    #[test]
    fn centred_origin_model_is_lifted_by_half_height() {
        let footprint = ModelFootprint {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let y = footprint.snapped_y(0.0, 1.0);
        assert_eq!(y, 1.0);
        // Scaling the instance scales the lift with it.
        let y = footprint.snapped_y(0.0, 2.5);
        assert_eq!(y, 2.5);
        assert!((footprint.base_y(y, 2.5) - 0.0).abs() < SNAP_EPSILON);
    }

    #[test]
    fn snap_holds_on_uneven_surface_heights() {
        let footprint = ModelFootprint {
            min: Vec3::new(-0.3, -0.1, -0.3),
            max: Vec3::new(0.3, 1.4, 0.3),
        };
        for surface in [-4.0, 0.0, 7.5] {
            let y = footprint.snapped_y(surface, 1.7);
            assert!((footprint.base_y(y, 1.7) - surface).abs() < SNAP_EPSILON);
        }
    }
}
