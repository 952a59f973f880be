//! World state and the per-tick pipeline: step entities, step free
//! objects, sync colliders, broad phase, narrow phase + callbacks,
//! collect replication deltas, prune the dead.

pub mod citizen;
pub mod fsm;
pub mod object;
pub mod schema;
pub mod states;

use glam::Vec2;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::collision::{CollisionWorld, Contact, Shape};
use crate::protocol::{CitizenCommand, PrivateUpdate};
use crate::tuning::CITIZEN;
use citizen::{Citizen, CitizenState, Controller};
use object::{FreeObject, ObjectKind, ObjectSpawn, PoseMap, TickFx};

enum Slot {
    Citizen(usize),
    Object(usize),
}

pub struct World {
    citizens: Vec<Citizen>,
    objects: Vec<FreeObject>,
    collisions: CollisionWorld,
    /// Single id space for sids and free-object ids, so grid ids are
    /// globally unique and never reused.
    next_id: u64,
}

impl World {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        Self {
            citizens: Vec::new(),
            objects: Vec::new(),
            collisions: CollisionWorld::new(width, height, cell_size),
            next_id: 0,
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn spawn_citizen(
        &mut self,
        name: String,
        x: f32,
        y: f32,
        controller: Controller,
    ) -> u64 {
        let sid = self.alloc_id();
        let team = (self.citizens.len() % 2) as u8;
        let citizen = Citizen::new(sid, name, x, y, team, controller);
        self.collisions.insert(
            sid,
            Shape::circle_squeezed(x, y, CITIZEN.radius, CITIZEN.squeeze),
        );

        if matches!(controller, Controller::Bot(_)) {
            let id = self.alloc_id();
            self.collisions
                .insert(id, Shape::circle(x, y, CITIZEN.sight_radius));
            self.objects.push(FreeObject {
                id,
                x,
                y,
                direction: 0.0,
                rip: false,
                kind: ObjectKind::Sight {
                    owner: sid,
                    seen: Default::default(),
                },
            });
        }

        info!(sid, team, "citizen spawned");
        self.citizens.push(citizen);
        sid
    }

    pub fn remove_citizen(&mut self, sid: u64) {
        self.collisions.remove(sid);
        self.citizens.retain(|c| c.sid != sid);
        // Follower objects notice the missing owner and rip themselves
        // on their next step.
        info!(sid, "citizen removed");
    }

    pub fn citizen(&self, sid: u64) -> Option<&Citizen> {
        self.citizens.iter().find(|c| c.sid == sid)
    }

    pub fn citizen_mut(&mut self, sid: u64) -> Option<&mut Citizen> {
        self.citizens.iter_mut().find(|c| c.sid == sid)
    }

    /// Stages a mutation for the entity's next step. Commands aimed at
    /// a removed sid are dropped: a removed sid must never resolve.
    pub fn queue_command(&mut self, sid: u64, command: CitizenCommand) {
        match self.citizen_mut(sid) {
            Some(citizen) => citizen.queue(command),
            None => debug!(sid, "command for unknown sid dropped"),
        }
    }

    /// Full world state for a newly welcomed peer.
    pub fn snapshot(&self) -> Vec<Value> {
        self.citizens.iter().map(schema::snapshot).collect()
    }

    pub fn drain_private(&mut self, sid: u64) -> Option<PrivateUpdate> {
        self.citizen_mut(sid)?.drain_private()
    }

    /// One simulation step. Returns the `[sid, bitmask, ...values]`
    /// delta rows for every citizen that changed this tick.
    pub fn step(&mut self, dt: f32) -> Vec<Value> {
        let mut fx = TickFx::default();

        // Bots read their sight sensors (filled by last tick's
        // callbacks) and feed the same deferred-command path players
        // use.
        self.drive_bots(dt);

        // Pre-step wire values; the delta pass at the end diffs
        // against these, so collision corrections replicate too.
        let prevs: Vec<Vec<Value>> = self
            .citizens
            .iter()
            .map(|c| schema::encode_with(schema::CITIZEN_SCHEMA, c))
            .collect();

        for c in &mut self.citizens {
            c.step(dt, &mut fx);
        }

        let poses: PoseMap = self
            .citizens
            .iter()
            .map(|c| (c.sid, (c.x, c.y, c.direction)))
            .collect();
        for o in &mut self.objects {
            o.step(dt, &poses);
        }

        // Spawns from enter hooks become live colliders this tick.
        self.apply_fx(&mut fx);

        for c in &self.citizens {
            self.collisions.sync(c.sid, c.x, c.y, c.direction);
        }
        for o in &self.objects {
            self.collisions.sync(o.id, o.x, o.y, o.direction);
        }

        for (a, b) in self.collisions.check() {
            let Some(contact) = self.collisions.contact(a, b) else {
                continue;
            };
            self.dispatch_contact(a, b, contact, &mut fx);
        }
        // Deaths during dispatch retire colliders here.
        self.apply_fx(&mut fx);

        let mut rows = Vec::new();
        for (i, c) in self.citizens.iter_mut().enumerate() {
            let (bits, values) = if c.new {
                c.new = false;
                (
                    schema::full_mask(schema::CITIZEN_SCHEMA),
                    schema::encode_with(schema::CITIZEN_SCHEMA, c),
                )
            } else {
                schema::diff(schema::CITIZEN_SCHEMA, &prevs[i], c)
            };
            if bits != 0 {
                let mut row = Vec::with_capacity(2 + values.len());
                row.push(Value::from(c.sid));
                row.push(Value::from(bits));
                row.extend(values);
                rows.push(Value::Array(row));
            }
        }

        for o in &self.objects {
            if o.rip {
                self.collisions.remove(o.id);
            }
        }
        self.objects.retain(|o| !o.rip);

        rows
    }

    fn apply_fx(&mut self, fx: &mut TickFx) {
        for id in fx.retire_colliders.drain(..) {
            self.collisions.remove(id);
        }
        for spawn in fx.spawns.drain(..) {
            let id = self.alloc_id();
            match spawn {
                ObjectSpawn::Slash {
                    owner,
                    x,
                    y,
                    direction,
                    inner_radius,
                    range,
                    sweep,
                    duration,
                    damage,
                } => {
                    self.collisions
                        .insert(id, Shape::arc(x, y, inner_radius, range, direction, sweep));
                    self.objects.push(FreeObject {
                        id,
                        x,
                        y,
                        direction,
                        rip: false,
                        kind: ObjectKind::Slash {
                            owner,
                            damage,
                            duration,
                            timer: 0.0,
                            hit: Vec::new(),
                        },
                    });
                }
                ObjectSpawn::Sight { owner, x, y, radius } => {
                    self.collisions.insert(id, Shape::circle(x, y, radius));
                    self.objects.push(FreeObject {
                        id,
                        x,
                        y,
                        direction: 0.0,
                        rip: false,
                        kind: ObjectKind::Sight {
                            owner,
                            seen: Default::default(),
                        },
                    });
                }
            }
        }
    }

    fn drive_bots(&mut self, dt: f32) {
        let sights: HashMap<u64, Vec<u64>> = self
            .objects
            .iter()
            .filter_map(|o| match &o.kind {
                ObjectKind::Sight { owner, seen } => {
                    Some((*owner, seen.iter().copied().collect()))
                }
                _ => None,
            })
            .collect();

        let poses: HashMap<u64, (Vec2, u8, bool)> = self
            .citizens
            .iter()
            .map(|c| (c.sid, (Vec2::new(c.x, c.y), c.team, c.alive())))
            .collect();

        for i in 0..self.citizens.len() {
            let Controller::Bot(brain) = self.citizens[i].controller else {
                continue;
            };
            let sid = self.citizens[i].sid;
            let team = self.citizens[i].team;
            let me = Vec2::new(self.citizens[i].x, self.citizens[i].y);

            let mut targets: Vec<(u64, Vec2)> = sights
                .get(&sid)
                .into_iter()
                .flatten()
                .filter_map(|other| {
                    let &(pos, other_team, alive) = poses.get(other)?;
                    (alive && other_team != team).then_some((*other, pos))
                })
                .collect();
            targets.sort_by(|a, b| {
                (a.1 - me)
                    .length_squared()
                    .total_cmp(&(b.1 - me).length_squared())
            });

            let mut brain = brain;
            let commands = brain.think(dt, me, &targets);
            let c = &mut self.citizens[i];
            c.controller = Controller::Bot(brain);
            for command in commands {
                c.queue(command);
            }
        }
    }

    fn locate(&self, id: u64) -> Option<Slot> {
        if let Some(i) = self.citizens.iter().position(|c| c.sid == id) {
            return Some(Slot::Citizen(i));
        }
        self.objects
            .iter()
            .position(|o| o.id == id)
            .map(Slot::Object)
    }

    fn dispatch_contact(&mut self, a: u64, b: u64, contact: Contact, fx: &mut TickFx) {
        match (self.locate(a), self.locate(b)) {
            (Some(Slot::Citizen(i)), Some(Slot::Citizen(j))) => {
                self.separate_citizens(i, j, contact);
            }
            (Some(Slot::Object(oi)), Some(Slot::Citizen(cj))) => {
                self.object_touches_citizen(oi, cj, fx);
            }
            (Some(Slot::Citizen(ci)), Some(Slot::Object(oj))) => {
                self.object_touches_citizen(oj, ci, fx);
            }
            // Object/object overlaps (slash through sight volumes) and
            // ids pruned mid-dispatch have no callback.
            _ => {}
        }
    }

    /// Symmetric position correction: both sides move half the push,
    /// and only when both opt in.
    fn separate_citizens(&mut self, i: usize, j: usize, contact: Contact) {
        if !(self.citizens[i].move_out_collision && self.citizens[j].move_out_collision) {
            return;
        }
        {
            let c = &mut self.citizens[i];
            c.x += contact.push_a.x;
            c.y += contact.push_a.y;
        }
        {
            let c = &mut self.citizens[j];
            c.x += contact.push_b.x;
            c.y += contact.push_b.y;
        }
        // Re-sync right away so later pairs this tick see the
        // corrected positions.
        for k in [i, j] {
            let (sid, x, y, direction) = {
                let c = &self.citizens[k];
                (c.sid, c.x, c.y, c.direction)
            };
            self.collisions.sync(sid, x, y, direction);
        }
    }

    fn object_touches_citizen(&mut self, oi: usize, cj: usize, fx: &mut TickFx) {
        let obj = &mut self.objects[oi];
        let cit = &mut self.citizens[cj];

        let mut kill_credit = None;
        match &mut obj.kind {
            ObjectKind::Slash {
                owner,
                damage,
                hit,
                ..
            } => {
                if *owner == cit.sid || hit.contains(&cit.sid) || !cit.alive() {
                    return;
                }
                hit.push(cit.sid);

                let blocking = cit.state() == CitizenState::Block;
                let dealt = if blocking { *damage / 2 } else { *damage };
                cit.health -= dealt;

                if cit.health <= 0 {
                    cit.health = 0;
                    cit.force_state(CitizenState::Dying, fx);
                    kill_credit = Some(*owner);
                } else if !blocking {
                    cit.force_state(CitizenState::Stunned, fx);
                }

                info!(
                    victim = cit.sid,
                    attacker = *owner,
                    damage = dealt,
                    health = cit.health,
                    "melee hit"
                );
            }
            ObjectKind::Sight { owner, seen } => {
                if cit.sid != *owner && cit.alive() {
                    seen.insert(cit.sid);
                }
            }
        }

        if let Some(attacker) = kill_credit {
            if let Some(c) = self.citizen_mut(attacker) {
                c.score += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ActionKind;
    use crate::tuning::weapon;
    use citizen::Weapon;

    fn world() -> World {
        World::new(800.0, 600.0, 16.0)
    }

    fn spawn_player(w: &mut World, x: f32, y: f32) -> u64 {
        w.spawn_citizen(format!("p{x}"), x, y, Controller::Player)
    }

    #[test]
    fn first_tick_emits_full_bitmask_then_quiet() {
        let mut w = world();
        let sid = spawn_player(&mut w, 100.0, 100.0);

        let rows = w.step(0.05);
        assert_eq!(rows.len(), 1);
        let Value::Array(row) = &rows[0] else {
            panic!("delta rows are arrays");
        };
        assert_eq!(row[0], Value::from(sid));
        assert_eq!(
            row[1],
            Value::from(schema::full_mask(schema::CITIZEN_SCHEMA))
        );
        assert_eq!(row.len(), 2 + schema::CITIZEN_SCHEMA.len());

        // Nothing changes while idle with no inputs.
        let rows = w.step(0.05);
        assert!(rows.is_empty());
    }

    #[test]
    fn delta_contains_only_the_changed_properties() {
        let mut w = world();
        let sid = spawn_player(&mut w, 100.0, 100.0);
        w.step(0.05);

        w.queue_command(sid, CitizenCommand::Movement { x: 1.0, y: 0.0 });
        let rows = w.step(0.05);
        assert_eq!(rows.len(), 1);
        let Value::Array(row) = &rows[0] else {
            panic!("delta rows are arrays");
        };
        let bits = row[1].as_u64().expect("bitmask") as u32;
        // x (bit 1) and moving (bit 12) changed; health (bit 4) did not.
        assert_ne!(bits & (1 << 1), 0);
        assert_ne!(bits & (1 << 12), 0);
        assert_eq!(bits & (1 << 4), 0);
        assert_eq!(row.len(), 2 + bits.count_ones() as usize);
    }

    #[test]
    fn damage_lands_in_the_same_ticks_delta() {
        let mut w = world();
        let attacker = spawn_player(&mut w, 100.0, 100.0);
        let victim = spawn_player(&mut w, 130.0, 100.0);
        w.step(0.05);

        w.queue_command(attacker, CitizenCommand::Pointer { x: 30.0, y: 0.0 });
        w.queue_command(
            attacker,
            CitizenCommand::Action {
                action: ActionKind::Attack,
            },
        );
        let rows = w.step(0.05);

        let victim_row = rows
            .iter()
            .filter_map(|r| r.as_array())
            .find(|r| r[0] == Value::from(victim))
            .expect("victim delta");
        let bits = victim_row[1].as_u64().expect("bitmask") as u32;
        // Health (bit 4) and state (bit 9) both replicate in the tick
        // the hit was resolved, not one tick later.
        assert_ne!(bits & (1 << 4), 0);
        assert_ne!(bits & (1 << 9), 0);
    }

    #[test]
    fn overlapping_citizens_get_pushed_apart() {
        let mut w = world();
        let a = spawn_player(&mut w, 100.0, 100.0);
        let b = spawn_player(&mut w, 110.0, 100.0);

        w.step(0.05);
        let ax = w.citizen(a).expect("a").x;
        let bx = w.citizen(b).expect("b").x;
        // Combined radius 28 over an initial gap of 10: both moved,
        // symmetrically, away from each other.
        assert!(ax < 100.0);
        assert!(bx > 110.0);
        assert!((100.0 - ax - (bx - 110.0)).abs() < 1e-3);
    }

    #[test]
    fn command_for_removed_sid_is_dropped() {
        let mut w = world();
        let sid = spawn_player(&mut w, 100.0, 100.0);
        w.remove_citizen(sid);

        w.queue_command(sid, CitizenCommand::Movement { x: 1.0, y: 0.0 });
        assert!(w.citizen(sid).is_none());
        assert!(w.step(0.05).is_empty());
    }

    #[test]
    fn attack_damages_each_victim_once_and_then_expires() {
        let mut w = world();
        let attacker = spawn_player(&mut w, 100.0, 100.0);
        let victim = spawn_player(&mut w, 130.0, 100.0);

        // Aim east and swing.
        w.queue_command(attacker, CitizenCommand::Pointer { x: 30.0, y: 0.0 });
        w.queue_command(
            attacker,
            CitizenCommand::Action {
                action: ActionKind::Attack,
            },
        );
        w.step(0.05);

        let dmg = weapon(Weapon::Axe).melee_damage;
        let hurt = w.citizen(victim).expect("victim");
        assert_eq!(hurt.health, CITIZEN.max_health - dmg);
        assert_eq!(hurt.state(), CitizenState::Stunned);

        // Same swing, next tick: the hit list blocks a second hit.
        w.step(0.05);
        assert_eq!(w.citizen(victim).expect("victim").health, CITIZEN.max_health - dmg);

        // Past the swing duration the hitbox is pruned from the grid.
        w.step(weapon(Weapon::Axe).attack_duration);
        w.step(0.05);
        assert!(w.objects.is_empty());
    }

    #[test]
    fn lethal_hit_forces_dying_and_awards_score() {
        let mut w = world();
        let attacker = spawn_player(&mut w, 100.0, 100.0);
        let victim = spawn_player(&mut w, 130.0, 100.0);
        w.citizen_mut(victim).expect("victim").health = 1;

        w.queue_command(attacker, CitizenCommand::Pointer { x: 30.0, y: 0.0 });
        w.queue_command(
            attacker,
            CitizenCommand::Action {
                action: ActionKind::Attack,
            },
        );
        w.step(0.05);

        let dead = w.citizen(victim).expect("victim");
        assert_eq!(dead.state(), CitizenState::Dying);
        assert_eq!(dead.health, 0);
        assert_eq!(w.citizen(attacker).expect("attacker").score, 1);

        // Dying retired the victim's collider: no candidate pairs can
        // name it again even though the citizen still exists.
        assert!(!w.collisions.contains(victim));

        // And the score change reaches the attacker's private channel.
        let private = w.drain_private(attacker).expect("score delta");
        assert_ne!(private.bits & 0b10, 0);
    }

    #[test]
    fn destroyed_slash_never_reappears_in_check() {
        let mut w = world();
        let attacker = spawn_player(&mut w, 100.0, 100.0);
        w.queue_command(
            attacker,
            CitizenCommand::Action {
                action: ActionKind::Attack,
            },
        );
        w.step(0.05);
        let slash_id = w.objects[0].id;
        assert!(w.collisions.contains(slash_id));

        w.step(weapon(Weapon::Axe).attack_duration + 0.1);
        assert!(!w.collisions.contains(slash_id));
        assert!(
            w.collisions
                .check()
                .iter()
                .all(|&(a, b)| a != slash_id && b != slash_id)
        );
    }

    #[test]
    fn bot_patrols_through_the_command_path() {
        let mut w = world();
        let bot = w.spawn_citizen(
            "bot".to_string(),
            300.0,
            300.0,
            Controller::Bot(Default::default()),
        );

        let x0 = w.citizen(bot).expect("bot").x;
        w.step(0.1);
        let c = w.citizen(bot).expect("bot");
        assert_ne!(c.x, x0);
        assert!(c.moving);
    }
}
