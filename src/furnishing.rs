use glam::Vec2;
use rand::Rng;

use crate::config::FurnishingTuning;
use crate::constants::{BED_HALF_EXTENTS, TABLE_HALF_EXTENTS};
use crate::types::{FurnitureKind, FurnitureView, GridCoord, Room};
use crate::world::grid_to_world;

/// Static obstacle dropped into a room. Beds double as hiding spots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Furniture {
    pub kind: FurnitureKind,
    pub position: Vec2,
}

impl Furniture {
    pub fn half_extents(&self) -> Vec2 {
        let (x, z) = match self.kind {
            FurnitureKind::Bed => BED_HALF_EXTENTS,
            FurnitureKind::Table => TABLE_HALF_EXTENTS,
        };
        Vec2::new(x, z)
    }

    pub fn is_hiding_spot(&self) -> bool {
        self.kind == FurnitureKind::Bed
    }

    /// Strict interior test; a point on the edge is not blocked.
    pub fn blocks(&self, point: Vec2) -> bool {
        let delta = (point - self.position).abs();
        let half = self.half_extents();
        delta.x < half.x && delta.y < half.y
    }

    pub fn view(&self) -> FurnitureView {
        FurnitureView {
            kind: self.kind,
            x: self.position.x,
            z: self.position.y,
        }
    }
}

pub fn place_furniture<R: Rng + ?Sized>(
    rooms: &[Room],
    cell_size: f32,
    tuning: &FurnishingTuning,
    rng: &mut R,
) -> Vec<Furniture> {
    let mut placed = Vec::new();
    for room in rooms {
        if rng.random_bool(tuning.bed_chance) {
            placed.push(Furniture {
                kind: FurnitureKind::Bed,
                position: grid_to_world(GridCoord::new(room.x + 1, room.z + 1), cell_size),
            });
        }
        if room.w >= 3 && room.h >= 3 && rng.random_bool(tuning.table_chance) {
            let center = Vec2::new(
                room.x as f32 + room.w as f32 / 2.0,
                room.z as f32 + room.h as f32 / 2.0,
            );
            placed.push(Furniture {
                kind: FurnitureKind::Table,
                position: center * cell_size,
            });
        }
    }
    placed
}
