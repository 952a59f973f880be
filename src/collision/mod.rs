//! Spatial collision engine: uniform-grid broad phase plus
//! shape-specific narrow phase.

pub mod grid;
pub mod resolve;
pub mod shape;

pub use resolve::{Contact, resolve};
pub use shape::{Shape, ShapeKind};

use grid::Grid;
use std::collections::HashMap;

struct Collider {
    shape: Shape,
    cells: Vec<usize>,
}

/// Owns every registered collider and its grid memberships. A removed
/// id never resolves again; re-registering requires a fresh insert.
pub struct CollisionWorld {
    grid: Grid,
    colliders: HashMap<u64, Collider>,
}

impl CollisionWorld {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        Self {
            grid: Grid::new(width, height, cell_size),
            colliders: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: u64, shape: Shape) {
        let cells = self.grid.insert(id, &shape.extent());
        self.colliders.insert(id, Collider { shape, cells });
    }

    /// Moves the collider and rebuilds its cell memberships. Arcs also
    /// take their owner's facing. Unknown ids are ignored: an object
    /// whose collider died mid-tick simply stops syncing.
    pub fn sync(&mut self, id: u64, x: f32, y: f32, direction: f32) {
        let Some(collider) = self.colliders.get_mut(&id) else {
            return;
        };
        collider.shape.x = x;
        collider.shape.y = y;
        if let ShapeKind::Arc {
            direction: ref mut dir,
            ..
        } = collider.shape.kind
        {
            *dir = direction;
        }

        self.grid.remove(id, &collider.cells);
        collider.cells = self.grid.insert(id, &collider.shape.extent());
    }

    pub fn remove(&mut self, id: u64) {
        if let Some(collider) = self.colliders.remove(&id) {
            self.grid.remove(id, &collider.cells);
        }
    }

    pub fn shape(&self, id: u64) -> Option<&Shape> {
        self.colliders.get(&id).map(|c| &c.shape)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.colliders.contains_key(&id)
    }

    /// Broad-phase candidates: unordered id pairs sharing a cell, each
    /// reported once. Overlap is not checked here.
    pub fn check(&self) -> Vec<(u64, u64)> {
        self.grid.candidate_pairs()
    }

    /// Narrow-phase result for a candidate pair, or `None` when either
    /// id is gone or the shapes do not actually overlap.
    pub fn contact(&self, a: u64, b: u64) -> Option<Contact> {
        let sa = self.shape(a)?;
        let sb = self.shape(b)?;
        resolve(sa, sb)
    }
}
