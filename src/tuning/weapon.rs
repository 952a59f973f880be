use crate::world::citizen::{CitizenState, Weapon};

/// Melee tuning per weapon kind.
#[derive(Debug, Clone, Copy)]
pub struct WeaponTuning {
    /// Radial reach of the swing beyond the wielder's body, in pixels.
    pub melee_range: f32,

    /// Angular extent of the swing, in radians.
    pub melee_arc: f32,

    /// How long the swing (and its hitbox) lasts, in seconds.
    pub attack_duration: f32,

    pub melee_damage: i32,

    /// Hold time before a charge releases.
    pub charge_duration: f32,

    /// State a fully held charge releases into.
    pub on_charged: CitizenState,
}

static AXE: WeaponTuning = WeaponTuning {
    melee_range: 36.0,
    melee_arc: std::f32::consts::PI * 0.9,
    attack_duration: 0.4,
    melee_damage: 25,
    charge_duration: 1.0,
    on_charged: CitizenState::Spin,
};

static SWORD: WeaponTuning = WeaponTuning {
    melee_range: 44.0,
    melee_arc: std::f32::consts::PI * 0.6,
    attack_duration: 0.3,
    melee_damage: 18,
    charge_duration: 0.7,
    on_charged: CitizenState::Attack,
};

pub fn weapon(kind: Weapon) -> &'static WeaponTuning {
    match kind {
        Weapon::Axe => &AXE,
        Weapon::Sword => &SWORD,
    }
}
