//! Citizen state table. All behavior lives here as data; the executor
//! in `fsm` knows nothing about citizens.

use glam::Vec2;

use crate::tuning::{CITIZEN, weapon};
use crate::world::citizen::{Citizen, CitizenState, look_at};
use crate::world::fsm::{StateDef, StateTable};
use crate::world::object::{ObjectSpawn, TickFx};

type Def = StateDef<CitizenState, Citizen, TickFx>;

fn handle_movement(entity: &mut Citizen, dt: f32, allow_growling: bool) {
    let speed = if entity.growling && allow_growling {
        CITIZEN.speed * CITIZEN.growl_speed_factor
    } else {
        CITIZEN.speed
    };

    let m = entity.inputs.movement;
    entity.moving = m != Vec2::ZERO;
    entity.x += speed * m.x * dt;
    entity.y += speed * m.y * dt;
}

fn handle_pointer(entity: &mut Citizen) {
    // Look is an offset from the citizen; zero means no aim input has
    // arrived yet, and the current facing holds.
    let look = entity.inputs.look;
    if look != Vec2::ZERO {
        entity.direction = look_at(0.0, 0.0, look.x, look.y);
    }
}

fn facing(entity: &Citizen) -> Vec2 {
    Vec2::new(entity.direction.cos(), entity.direction.sin())
}

fn spawn_slash(entity: &Citizen, sweep: f32, duration: f32, fx: &mut TickFx) {
    let w = weapon(entity.weapon);
    fx.spawns.push(ObjectSpawn::Slash {
        owner: entity.sid,
        x: entity.x,
        y: entity.y,
        direction: entity.direction,
        inner_radius: CITIZEN.radius,
        range: w.melee_range,
        sweep,
        duration,
        damage: w.melee_damage,
    });
}

pub static CITIZEN_STATES: StateTable<CitizenState, Citizen, TickFx> = StateTable {
    states: &[
        (
            CitizenState::Idle,
            Def {
                flow: &[
                    CitizenState::Attack,
                    CitizenState::Block,
                    CitizenState::Spin,
                    CitizenState::Roll,
                    CitizenState::Charging,
                ],
                enter: Some(|entity, _| {
                    entity.move_out_collision = true;
                }),
                leave: None,
                step: Some(|dt, entity, _, _| {
                    handle_movement(entity, dt, true);
                    handle_pointer(entity);
                }),
            },
        ),
        (
            CitizenState::Attack,
            Def {
                flow: &[CitizenState::Idle],
                enter: Some(|entity, fx| {
                    let w = weapon(entity.weapon);
                    spawn_slash(entity, w.melee_arc, w.attack_duration, fx);
                }),
                leave: None,
                step: Some(|dt, entity, machine, fx| {
                    handle_movement(entity, dt, true);
                    handle_pointer(entity);
                    if machine.duration >= weapon(entity.weapon).attack_duration {
                        machine.set(CitizenState::Idle, entity, fx);
                    }
                }),
            },
        ),
        (
            CitizenState::Block,
            Def {
                flow: &[CitizenState::Idle],
                enter: None,
                leave: None,
                step: Some(|dt, entity, machine, fx| {
                    handle_movement(entity, dt, true);
                    handle_pointer(entity);
                    if machine.duration >= CITIZEN.block_duration {
                        machine.set(CitizenState::Idle, entity, fx);
                    }
                }),
            },
        ),
        (
            CitizenState::Roll,
            Def {
                flow: &[CitizenState::Idle],
                enter: Some(|entity, _| {
                    // Dashes pass through bodies; idle restores this.
                    entity.move_out_collision = false;
                    entity.stamina = (entity.stamina - CITIZEN.roll_stamina_cost).max(0.0);
                }),
                leave: None,
                step: Some(|dt, entity, machine, fx| {
                    if machine.duration >= CITIZEN.roll_duration {
                        machine.set(CitizenState::Idle, entity, fx);
                    }
                    let dir = facing(entity);
                    entity.x += dir.x * CITIZEN.roll_speed * dt;
                    entity.y += dir.y * CITIZEN.roll_speed * dt;
                }),
            },
        ),
        (
            CitizenState::Spin,
            Def {
                flow: &[CitizenState::Idle],
                enter: Some(|entity, fx| {
                    spawn_slash(entity, std::f32::consts::TAU, CITIZEN.spin_duration, fx);
                    entity.stamina = (entity.stamina - CITIZEN.spin_stamina_cost).max(0.0);
                }),
                leave: None,
                step: Some(|dt, entity, machine, fx| {
                    if machine.duration >= CITIZEN.spin_duration {
                        machine.set(CitizenState::Idle, entity, fx);
                    }
                    // Lunge that fades out over the spin.
                    let fade = (CITIZEN.spin_duration - machine.duration) * 2.0;
                    let dir = facing(entity);
                    entity.x += dir.x * CITIZEN.spin_speed * fade * dt;
                    entity.y += dir.y * CITIZEN.spin_speed * fade * dt;
                    handle_movement(entity, dt, false);
                }),
            },
        ),
        (
            CitizenState::Charging,
            Def {
                flow: &[
                    CitizenState::Idle,
                    CitizenState::Attack,
                    CitizenState::Spin,
                ],
                enter: None,
                leave: None,
                step: Some(|dt, entity, machine, fx| {
                    handle_movement(entity, dt, false);
                    handle_pointer(entity);

                    entity.stamina =
                        (entity.stamina - CITIZEN.charge_stamina_drain * dt).max(0.0);
                    let w = weapon(entity.weapon);
                    if machine.duration >= w.charge_duration {
                        machine.set(w.on_charged, entity, fx);
                    } else if entity.stamina == 0.0 {
                        // Ran dry before full charge; nothing released.
                        machine.set(CitizenState::Idle, entity, fx);
                    }
                }),
            },
        ),
        (
            CitizenState::Stunned,
            Def {
                flow: &[CitizenState::Idle],
                enter: None,
                leave: None,
                step: Some(|_, entity, machine, fx| {
                    if machine.duration >= CITIZEN.stun_duration {
                        machine.set(CitizenState::Idle, entity, fx);
                    }
                }),
            },
        ),
        (
            CitizenState::Dying,
            Def {
                flow: &[CitizenState::Dead],
                enter: Some(|entity, fx| {
                    // The body stops colliding the moment death starts.
                    fx.retire_colliders.push(entity.sid);
                    entity.move_out_collision = false;
                }),
                leave: None,
                step: Some(|dt, entity, machine, fx| {
                    let remaining = CITIZEN.dying_duration - machine.duration;
                    let dir = facing(entity);
                    entity.x -= remaining * CITIZEN.dying_drift * dir.x * dt;
                    entity.y -= remaining * CITIZEN.dying_drift * dir.y * dt;

                    if machine.duration >= CITIZEN.dying_duration {
                        machine.set(CitizenState::Dead, entity, fx);
                    }
                }),
            },
        ),
        (
            CitizenState::Dead,
            Def {
                flow: &[],
                enter: None,
                leave: None,
                step: None,
            },
        ),
    ],
};
