//! The networked entity. One flat struct carries position, combat
//! fields, inputs, the FSM and the replication bookkeeping; behavior
//! differences come from the state table and the controller, not from
//! subclassing.

use glam::Vec2;
use serde_json::Value;
use std::f32::consts::TAU;

use crate::protocol::{ActionKind, CitizenCommand, PrivateUpdate};
use crate::tuning::CITIZEN;
use crate::world::fsm::StateMachine;
use crate::world::object::TickFx;
use crate::world::schema;
use crate::world::states;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitizenState {
    Idle,
    Attack,
    Block,
    Roll,
    Spin,
    Stunned,
    Dying,
    Dead,
    Charging,
}

impl CitizenState {
    pub fn index(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Attack => 1,
            Self::Block => 2,
            Self::Roll => 3,
            Self::Spin => 4,
            Self::Stunned => 5,
            Self::Dying => 6,
            Self::Dead => 7,
            Self::Charging => 8,
        }
    }

    pub fn from_index(i: u8) -> Option<Self> {
        Some(match i {
            0 => Self::Idle,
            1 => Self::Attack,
            2 => Self::Block,
            3 => Self::Roll,
            4 => Self::Spin,
            5 => Self::Stunned,
            6 => Self::Dying,
            7 => Self::Dead,
            8 => Self::Charging,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weapon {
    Axe,
    Sword,
}

impl Weapon {
    pub fn index(self) -> u8 {
        match self {
            Self::Axe => 0,
            Self::Sword => 1,
        }
    }

    pub fn from_index(i: u8) -> Option<Self> {
        Some(match i {
            0 => Self::Axe,
            1 => Self::Sword,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shield {
    None,
    Wooden,
}

impl Shield {
    pub fn index(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Wooden => 1,
        }
    }

    pub fn from_index(i: u8) -> Option<Self> {
        Some(match i {
            0 => Self::None,
            1 => Self::Wooden,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn index(self) -> u8 {
        match self {
            Self::Female => 0,
            Self::Male => 1,
        }
    }

    pub fn from_index(i: u8) -> Option<Self> {
        Some(match i {
            0 => Self::Female,
            1 => Self::Male,
            _ => return None,
        })
    }
}

/// Last applied input state; written only by deferred commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inputs {
    pub movement: Vec2,
    /// Aim offset relative to the citizen's position. Zero until the
    /// first pointer input arrives; facing holds until then.
    pub look: Vec2,
}

/// Who drives this citizen's inputs.
#[derive(Debug, Clone, Copy)]
pub enum Controller {
    Player,
    Bot(BotBrain),
}

/// Minimal bot: patrol east/west until the sight sensor reports a
/// target, then chase and swing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BotBrain {
    t: f32,
    pub target: Option<u64>,
}

impl BotBrain {
    pub fn think(&mut self, dt: f32, me: Vec2, targets: &[(u64, Vec2)]) -> Vec<CitizenCommand> {
        let mut commands = Vec::new();

        if let Some(&(sid, pos)) = targets.first() {
            self.target = Some(sid);
            let d = pos - me;
            commands.push(CitizenCommand::Pointer { x: d.x, y: d.y });

            let dist = d.length();
            if dist > CITIZEN.radius * 2.0 {
                let n = d / dist;
                commands.push(CitizenCommand::Movement { x: n.x, y: n.y });
            } else {
                commands.push(CitizenCommand::Movement { x: 0.0, y: 0.0 });
                commands.push(CitizenCommand::Action {
                    action: ActionKind::Attack,
                });
            }
            return commands;
        }

        self.target = None;
        self.t += dt;
        let x = if self.t < 0.25 { 1.0 } else { -1.0 };
        if self.t >= 0.45 {
            self.t = 0.0;
        }
        commands.push(CitizenCommand::Movement { x, y: 0.0 });
        commands
    }
}

/// Private-channel accumulator. Bits stay set across ticks until the
/// flush drains them, so a slow flush never loses a change.
#[derive(Debug, Clone, Default)]
pub struct PrivateChanges {
    pub bits: u32,
    pub data: Vec<Value>,
}

pub type CitizenFsm = StateMachine<CitizenState, Citizen, TickFx>;

pub struct Citizen {
    pub sid: u64,
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Facing angle in radians, normalized to [0, TAU).
    pub direction: f32,
    pub health: i32,
    pub max_health: i32,
    pub weapon: Weapon,
    pub shield: Shield,
    pub team: u8,
    pub gender: Gender,
    pub growling: bool,
    pub moving: bool,
    pub stamina: f32,
    pub score: i64,
    pub inputs: Inputs,
    pub controller: Controller,
    /// Whether this citizen participates in symmetric separation.
    /// Cleared while rolling so dashes pass through bodies.
    pub move_out_collision: bool,
    /// Set until the first replication pass after admission; while set,
    /// the full property set is emitted instead of a delta.
    pub new: bool,
    pub pending: Vec<CitizenCommand>,
    pub fsm: CitizenFsm,
    pub private_changes: PrivateChanges,
    /// Wire values as of the last accumulator refresh. Comparing
    /// against these (not a start-of-step capture) catches mutations
    /// made from collision callbacks between refreshes.
    last_private: Vec<Value>,
}

impl Citizen {
    pub fn new(sid: u64, name: String, x: f32, y: f32, team: u8, controller: Controller) -> Self {
        let mut citizen = Self {
            sid,
            name,
            x,
            y,
            direction: 0.0,
            health: CITIZEN.max_health,
            max_health: CITIZEN.max_health,
            weapon: Weapon::Axe,
            shield: Shield::Wooden,
            team,
            gender: Gender::Female,
            growling: false,
            moving: false,
            stamina: 1.0,
            score: 0,
            inputs: Inputs::default(),
            controller,
            move_out_collision: true,
            new: true,
            pending: Vec::new(),
            fsm: StateMachine::new(&states::CITIZEN_STATES, CitizenState::Idle),
            private_changes: PrivateChanges::default(),
            last_private: Vec::new(),
        };
        citizen.last_private = schema::encode_with(schema::CITIZEN_PRIVATE_SCHEMA, &citizen);
        citizen
    }

    pub fn state(&self) -> CitizenState {
        self.fsm.state
    }

    pub fn alive(&self) -> bool {
        !matches!(self.state(), CitizenState::Dying | CitizenState::Dead)
    }

    /// Stages a mutation from outside the tick. Nothing is applied
    /// until this citizen's own step runs.
    pub fn queue(&mut self, command: CitizenCommand) {
        self.pending.push(command);
    }

    /// One simulation step: drain the deferred command queue, run the
    /// FSM, regenerate stamina, then refresh the private accumulator.
    pub fn step(&mut self, dt: f32, fx: &mut TickFx) {
        // The machine is Copy: lend it out so hooks can see both the
        // citizen and the machine, then write it back.
        let mut fsm = self.fsm;
        let commands: Vec<CitizenCommand> = self.pending.drain(..).collect();
        for command in commands {
            self.apply_command(command, &mut fsm, fx);
        }
        fsm.step(dt, self, fx);
        self.fsm = fsm;

        if self.alive() {
            if self.growling {
                self.stamina = (self.stamina - CITIZEN.growl_stamina_drain * dt).max(0.0);
                // Growling cannot run on empty lungs.
                if self.stamina == 0.0 {
                    self.growling = false;
                }
            } else if self.state() != CitizenState::Charging {
                self.stamina = (self.stamina + CITIZEN.stamina_regen * dt).min(1.0);
            }
        }

        let pending_bits = self.private_changes.bits;
        let current = schema::encode_with(schema::CITIZEN_PRIVATE_SCHEMA, self);
        let mut bits = 0u32;
        let mut data = Vec::new();
        for (i, value) in current.iter().enumerate() {
            let undelivered = (pending_bits >> i) & 1 == 1;
            if self.new || undelivered || self.last_private.get(i) != Some(value) {
                bits |= 1 << i;
                data.push(value.clone());
            }
        }
        self.private_changes = PrivateChanges { bits, data };
        self.last_private = current;
    }

    fn apply_command(&mut self, command: CitizenCommand, fsm: &mut CitizenFsm, fx: &mut TickFx) {
        match command {
            CitizenCommand::Pointer { x, y } => {
                self.inputs.look = Vec2::new(x, y);
                // Facing updates as soon as the command lands, so an
                // action later in the same queue swings along the new
                // aim rather than last tick's.
                if self.inputs.look != Vec2::ZERO {
                    self.direction = look_at(0.0, 0.0, x, y);
                }
            }
            CitizenCommand::Movement { x, y } => {
                self.inputs.movement = Vec2::new(x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0));
            }
            CitizenCommand::Growl { on } => {
                self.growling = on;
            }
            CitizenCommand::Action { action } => match action {
                ActionKind::Attack => fsm.set(CitizenState::Attack, self, fx),
                ActionKind::Block => fsm.set(CitizenState::Block, self, fx),
                ActionKind::Roll => fsm.set(CitizenState::Roll, self, fx),
                ActionKind::Spin => fsm.set(CitizenState::Spin, self, fx),
                ActionKind::ChargeStart => fsm.set(CitizenState::Charging, self, fx),
                ActionKind::ChargeStop => {
                    // Only a charge can be cancelled this way; Idle
                    // sits in other flows too.
                    if fsm.state == CitizenState::Charging {
                        fsm.set(CitizenState::Idle, self, fx);
                    }
                }
            },
        }
    }

    /// Forced transition from outside the FSM, e.g. damage pushing the
    /// citizen into stun or death.
    pub fn force_state(&mut self, next: CitizenState, fx: &mut TickFx) {
        let mut fsm = self.fsm;
        fsm.set_forced(next, self, fx);
        self.fsm = fsm;
    }

    /// Takes the accumulated private delta, zeroing the accumulator
    /// whether or not the caller manages to deliver it.
    pub fn drain_private(&mut self) -> Option<PrivateUpdate> {
        if self.private_changes.bits == 0 {
            return None;
        }
        let changes = std::mem::take(&mut self.private_changes);
        Some(PrivateUpdate {
            bits: changes.bits,
            values: changes.data,
        })
    }
}

/// Angle from `(x, y)` toward `(tx, ty)`, normalized to [0, TAU).
pub fn look_at(x: f32, y: f32, tx: f32, ty: f32) -> f32 {
    let mut angle = (ty - y).atan2(tx - x);
    if angle < 0.0 {
        angle += TAU;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citizen() -> Citizen {
        Citizen::new(1, "ada".to_string(), 100.0, 100.0, 0, Controller::Player)
    }

    #[test]
    fn queued_commands_apply_at_step_start() {
        let mut c = citizen();
        c.queue(CitizenCommand::Movement { x: 1.0, y: 0.0 });
        c.queue(CitizenCommand::Pointer { x: 200.0, y: 100.0 });
        assert_eq!(c.inputs.movement, Vec2::ZERO);

        let mut fx = TickFx::default();
        c.step(0.1, &mut fx);
        assert_eq!(c.inputs.movement, Vec2::new(1.0, 0.0));
        assert!(c.x > 100.0);
        assert!(c.moving);
    }

    #[test]
    fn movement_input_is_clamped() {
        let mut c = citizen();
        c.queue(CitizenCommand::Movement { x: 5.0, y: -7.0 });
        c.step(0.0, &mut TickFx::default());
        assert_eq!(c.inputs.movement, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn action_command_drives_the_fsm() {
        let mut c = citizen();
        c.queue(CitizenCommand::Action {
            action: ActionKind::Block,
        });
        c.step(0.01, &mut TickFx::default());
        assert_eq!(c.state(), CitizenState::Block);
    }

    #[test]
    fn private_bits_accumulate_until_drained() {
        let mut c = citizen();
        c.new = false;
        c.stamina = 0.5;

        let mut fx = TickFx::default();
        c.step(0.1, &mut fx);
        // Stamina regenerated, so its bit is set.
        assert_eq!(c.private_changes.bits & 0b1, 0b1);

        // Not drained: the bit survives a tick with no further change.
        let bits_before = c.private_changes.bits;
        c.stamina = 1.0;
        c.step(0.0, &mut fx);
        assert_eq!(c.private_changes.bits & bits_before, bits_before);

        let update = c.drain_private().expect("pending private data");
        assert_ne!(update.bits, 0);
        assert_eq!(c.private_changes.bits, 0);
        assert!(c.drain_private().is_none());
    }

    #[test]
    fn look_at_normalizes_to_full_turn() {
        let a = look_at(0.0, 0.0, 0.0, -1.0);
        assert!(a > std::f32::consts::PI);
        assert!(a < TAU);
    }

    #[test]
    fn facing_holds_until_pointer_input_arrives() {
        let mut c = citizen();
        c.step(0.1, &mut TickFx::default());
        c.step(0.1, &mut TickFx::default());
        assert_eq!(c.direction, 0.0);

        c.queue(CitizenCommand::Pointer { x: -1.0, y: 0.0 });
        c.step(0.1, &mut TickFx::default());
        assert!((c.direction - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn aim_applies_before_a_queued_attack_spawns() {
        use crate::world::object::ObjectSpawn;

        let mut c = citizen();
        // Pointer and attack arrive in the same queue: the slash must
        // face the fresh aim, not the pre-command facing of 0.
        c.queue(CitizenCommand::Pointer { x: 0.0, y: 30.0 });
        c.queue(CitizenCommand::Action {
            action: ActionKind::Attack,
        });

        let mut fx = TickFx::default();
        c.step(0.01, &mut fx);
        match &fx.spawns[0] {
            ObjectSpawn::Slash { direction, .. } => {
                assert!((direction - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
            }
            other => panic!("expected slash spawn, got {other:?}"),
        }
    }

    #[test]
    fn charge_runs_to_the_weapons_charged_state() {
        use crate::tuning::weapon;

        let mut c = citizen();
        c.queue(CitizenCommand::Action {
            action: ActionKind::ChargeStart,
        });

        let mut fx = TickFx::default();
        c.step(0.1, &mut fx);
        assert_eq!(c.state(), CitizenState::Charging);
        let before = c.stamina;

        c.step(weapon(c.weapon).charge_duration, &mut fx);
        assert_eq!(c.state(), weapon(c.weapon).on_charged);
        assert!(c.stamina < before);
        // The charged release spawned its swing volume.
        assert!(!fx.spawns.is_empty());
    }

    #[test]
    fn charge_stop_cancels_only_a_running_charge() {
        let mut c = citizen();
        c.queue(CitizenCommand::Action {
            action: ActionKind::ChargeStart,
        });
        c.step(0.05, &mut TickFx::default());
        assert_eq!(c.state(), CitizenState::Charging);

        c.queue(CitizenCommand::Action {
            action: ActionKind::ChargeStop,
        });
        c.step(0.05, &mut TickFx::default());
        assert_eq!(c.state(), CitizenState::Idle);

        // Stop while blocking must not cancel the block.
        c.queue(CitizenCommand::Action {
            action: ActionKind::Block,
        });
        c.step(0.05, &mut TickFx::default());
        c.queue(CitizenCommand::Action {
            action: ActionKind::ChargeStop,
        });
        c.step(0.05, &mut TickFx::default());
        assert_eq!(c.state(), CitizenState::Block);
    }

    #[test]
    fn growl_drains_stamina_and_stops_at_zero() {
        let mut c = citizen();
        c.stamina = 0.1;
        c.queue(CitizenCommand::Growl { on: true });

        c.step(0.5, &mut TickFx::default());
        assert!(c.growling);
        assert!(c.stamina < 0.1);

        c.step(0.5, &mut TickFx::default());
        assert_eq!(c.stamina, 0.0);
        assert!(!c.growling);
    }
}
