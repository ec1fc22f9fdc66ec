//! Ray tests for instance picking.

use bevy::prelude::*;

/// Slab-method ray/AABB intersection in the box's own space. Returns the
/// nearest non-negative hit distance.
pub fn ray_aabb_hit(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = Vec3::new(
        safe_recip(direction.x),
        safe_recip(direction.y),
        safe_recip(direction.z),
    );

    let t1 = (min - origin) * inv;
    let t2 = (max - origin) * inv;
    let t_min = t1.min(t2).max_element();
    let t_max = t1.max(t2).min_element();

    if t_min > t_max || t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}

/// Intersect a world-space ray with an instance's oriented bounding box:
/// the model-space box `[min, max]` carried through the instance's full
/// transform (rotation and scale included).
pub fn ray_hits_instance(
    origin: Vec3,
    direction: Vec3,
    transform: &GlobalTransform,
    min: Vec3,
    max: Vec3,
) -> Option<f32> {
    let inverse = transform.compute_matrix().inverse();
    let local_origin = inverse.transform_point3(origin);
    let local_direction = inverse.transform_vector3(direction);
    ray_aabb_hit(local_origin, local_direction, min, max)
}

/// Shortest distance from a ray to a point, for gizmo handle hit tests.
pub fn ray_point_distance(origin: Vec3, direction: Vec3, point: Vec3) -> f32 {
    let dir = direction.normalize_or_zero();
    let to_point = point - origin;
    let t = to_point.dot(dir).max(0.0);
    (to_point - dir * t).length()
}

fn safe_recip(v: f32) -> f32 {
    if v != 0.0 { 1.0 / v } else { f32::INFINITY }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_ray_hits_unit_box() {
        let t = ray_aabb_hit(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
        );
        assert_eq!(t, Some(4.0));
    }

    #[test]
    fn ray_starting_inside_reports_exit() {
        let t = ray_aabb_hit(Vec3::ZERO, Vec3::X, Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(t, Some(1.0));
    }

    #[test]
    fn miss_and_behind_are_none() {
        assert_eq!(
            ray_aabb_hit(
                Vec3::new(5.0, 0.0, -5.0),
                Vec3::Z,
                Vec3::splat(-1.0),
                Vec3::splat(1.0)
            ),
            None
        );
        assert_eq!(
            ray_aabb_hit(
                Vec3::new(0.0, 0.0, 5.0),
                Vec3::Z,
                Vec3::splat(-1.0),
                Vec3::splat(1.0)
            ),
            None
        );
    }

    #[test]
    fn rotated_instance_is_hit_through_its_transform() {
        // A long thin box rotated 90 degrees around Y: the ray along Z
        // hits it only because the test works in instance space.
        let transform = GlobalTransform::from(
            Transform::from_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
        );
        let min = Vec3::new(-3.0, -0.2, -0.2);
        let max = Vec3::new(3.0, 0.2, 0.2);
        let hit = ray_hits_instance(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, &transform, min, max);
        assert!(hit.is_some());
        let miss = ray_hits_instance(Vec3::new(1.0, 0.0, -5.0), Vec3::Z, &transform, min, max);
        assert!(miss.is_none());
    }

    #[test]
    fn point_distance_is_perpendicular() {
        let d = ray_point_distance(Vec3::ZERO, Vec3::X, Vec3::new(3.0, 4.0, 0.0));
        assert!((d - 4.0).abs() < 1e-6);
        // Points behind the origin measure to the origin itself.
        let d = ray_point_distance(Vec3::ZERO, Vec3::X, Vec3::new(-3.0, 4.0, 0.0));
        assert!((d - 5.0).abs() < 1e-6);
    }
}
