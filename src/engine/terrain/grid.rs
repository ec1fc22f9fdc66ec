//! World-to-grid mapping.
//!
//! `TerrainGrid` partitions the terrain's world extent into addressable
//! `(grid_x, grid_z)` cells. `cell_at` is the single source of truth for
//! "which cell does this point belong to": the hover highlight and the
//! final commit both resolve through it, so the cell shown during a drag
//! is always the cell committed on drop.

use bevy::prelude::*;

use crate::constants::render_settings::{FALLBACK_CELL_SIZE, FALLBACK_GRID_CELLS};

/// A resolved grid cell with its world-space centre and pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub grid_x: u32,
    pub grid_z: u32,
    pub center_x: f32,
    pub center_z: f32,
    pub step_x: f32,
    pub step_z: f32,
}

impl GridCell {
    pub fn coords(&self) -> (u32, u32) {
        (self.grid_x, self.grid_z)
    }
}

/// Uniform partition of a rectangular world extent. Derived from the
/// loaded terrain's bounds (or the fallback extent) and replaced wholesale
/// on every terrain switch.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct TerrainGrid {
    min_x: f32,
    min_z: f32,
    step_x: f32,
    step_z: f32,
    cells_x: u32,
    cells_z: u32,
    /// Surface height used when no heightfield is available.
    pub ground_y: f32,
}

impl TerrainGrid {
    /// Grid over an explicit extent with explicit cell counts.
    pub fn new(min: Vec2, max: Vec2, cells_x: u32, cells_z: u32, ground_y: f32) -> Self {
        let cells_x = cells_x.max(1);
        let cells_z = cells_z.max(1);
        Self {
            min_x: min.x,
            min_z: min.y,
            step_x: (max.x - min.x) / cells_x as f32,
            step_z: (max.y - min.y) / cells_z as f32,
            cells_x,
            cells_z,
            ground_y,
        }
    }

    /// Grid over an extent partitioned by cell pitch rather than count.
    pub fn from_cell_size(min: Vec2, max: Vec2, cell_size: f32, ground_y: f32) -> Self {
        let cells_x = ((max.x - min.x) / cell_size).round().max(1.0) as u32;
        let cells_z = ((max.y - min.y) / cell_size).round().max(1.0) as u32;
        Self::new(min, max, cells_x, cells_z, ground_y)
    }

    /// Fixed default extent centred on the origin, used when no terrain is
    /// loaded. `layout_cells` lets the host pass saved layout dimensions.
    pub fn fallback(layout_cells: Option<(u32, u32)>) -> Self {
        let (cx, cz) = layout_cells.unwrap_or((FALLBACK_GRID_CELLS, FALLBACK_GRID_CELLS));
        let half_x = cx as f32 * FALLBACK_CELL_SIZE * 0.5;
        let half_z = cz as f32 * FALLBACK_CELL_SIZE * 0.5;
        Self::new(
            Vec2::new(-half_x, -half_z),
            Vec2::new(half_x, half_z),
            cx,
            cz,
            0.0,
        )
    }

    pub fn cells(&self) -> (u32, u32) {
        (self.cells_x, self.cells_z)
    }

    pub fn extent_min(&self) -> Vec2 {
        Vec2::new(self.min_x, self.min_z)
    }

    pub fn extent_max(&self) -> Vec2 {
        Vec2::new(
            self.min_x + self.step_x * self.cells_x as f32,
            self.min_z + self.step_z * self.cells_z as f32,
        )
    }

    /// Resolve a world point to its cell, or `None` outside the extent.
    pub fn cell_at(&self, world_x: f32, world_z: f32) -> Option<GridCell> {
        let fx = (world_x - self.min_x) / self.step_x;
        let fz = (world_z - self.min_z) / self.step_z;
        if fx < 0.0 || fz < 0.0 {
            return None;
        }
        let grid_x = fx.floor() as u32;
        let grid_z = fz.floor() as u32;
        if grid_x >= self.cells_x || grid_z >= self.cells_z {
            return None;
        }
        Some(GridCell {
            grid_x,
            grid_z,
            center_x: self.min_x + (grid_x as f32 + 0.5) * self.step_x,
            center_z: self.min_z + (grid_z as f32 + 0.5) * self.step_z,
            step_x: self.step_x,
            step_z: self.step_z,
        })
    }

    /// Cell lookup by index rather than world position.
    pub fn cell(&self, grid_x: u32, grid_z: u32) -> Option<GridCell> {
        if grid_x >= self.cells_x || grid_z >= self.cells_z {
            return None;
        }
        Some(GridCell {
            grid_x,
            grid_z,
            center_x: self.min_x + (grid_x as f32 + 0.5) * self.step_x,
            center_z: self.min_z + (grid_z as f32 + 0.5) * self.step_z,
            step_x: self.step_x,
            step_z: self.step_z,
        })
    }
}
