//! Non-networked game objects: transient attack hitboxes and sensor
//! volumes. They share the citizens' collision machinery but are never
//! serialized to clients.

use std::collections::{HashMap, HashSet};

/// Position and facing of a citizen, captured before free objects step
/// so follower objects can track their owner within the same tick.
pub type PoseMap = HashMap<u64, (f32, f32, f32)>;

#[derive(Debug)]
pub enum ObjectKind {
    /// Melee swing volume. Follows the owner, damages each victim at
    /// most once, and rips itself when the swing ends.
    Slash {
        owner: u64,
        damage: i32,
        duration: f32,
        timer: f32,
        hit: Vec<u64>,
    },
    /// Awareness sensor for bot-controlled citizens; records the sids
    /// it currently overlaps.
    Sight { owner: u64, seen: HashSet<u64> },
}

#[derive(Debug)]
pub struct FreeObject {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub direction: f32,
    /// Marked for removal; pruned at end of tick, never mid-step.
    pub rip: bool,
    pub kind: ObjectKind,
}

impl FreeObject {
    pub fn step(&mut self, dt: f32, poses: &PoseMap) {
        let owner = match &self.kind {
            ObjectKind::Slash { owner, .. } | ObjectKind::Sight { owner, .. } => *owner,
        };
        match poses.get(&owner) {
            Some(&(x, y, direction)) => {
                self.x = x;
                self.y = y;
                self.direction = direction;
            }
            // Owner left the world: nothing to follow.
            None => self.rip = true,
        }

        if let ObjectKind::Slash {
            duration, timer, ..
        } = &mut self.kind
        {
            *timer += dt;
            if *timer >= *duration {
                self.rip = true;
            }
        }

        if let ObjectKind::Sight { seen, .. } = &mut self.kind {
            // Re-populated by this tick's collision callbacks.
            seen.clear();
        }
    }
}

/// Spawn requests produced by state hooks; the world materializes them
/// (allocating ids and colliders) once the entity phase is over.
#[derive(Debug)]
pub enum ObjectSpawn {
    Slash {
        owner: u64,
        x: f32,
        y: f32,
        direction: f32,
        inner_radius: f32,
        range: f32,
        sweep: f32,
        duration: f32,
        damage: i32,
    },
    Sight {
        owner: u64,
        x: f32,
        y: f32,
        radius: f32,
    },
}

/// Side effects collected while stepping entities. State hooks cannot
/// reach the world directly (it is mid-iteration), so they stage
/// object spawns and collider retirements here.
#[derive(Debug, Default)]
pub struct TickFx {
    pub spawns: Vec<ObjectSpawn>,
    pub retire_colliders: Vec<u64>,
}
