/// Gameplay tuning for citizens.
///
/// Keep this separate from runtime/server configuration (tick rates,
/// buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct CitizenTuning {
    /// Base walking speed in pixels per second.
    pub speed: f32,

    /// Speed multiplier while growling.
    pub growl_speed_factor: f32,

    /// Starting and maximum health.
    pub max_health: i32,

    /// World-space collision radius in pixels.
    pub radius: f32,

    /// Vertical squeeze of the collision circle (1.0 = round).
    pub squeeze: f32,

    /// Roll dash: speed, duration and stamina cost.
    pub roll_speed: f32,
    pub roll_duration: f32,
    pub roll_stamina_cost: f32,

    /// Spin attack: lunge speed, duration and stamina cost.
    pub spin_speed: f32,
    pub spin_duration: f32,
    pub spin_stamina_cost: f32,

    pub block_duration: f32,
    pub stun_duration: f32,

    /// Death animation: drift speed and time before the terminal state.
    pub dying_drift: f32,
    pub dying_duration: f32,

    /// Stamina regained per second while below full.
    pub stamina_regen: f32,

    /// Stamina burned per second while growling; growling stops on
    /// its own at zero.
    pub growl_stamina_drain: f32,

    /// Stamina burned per second while holding a charge.
    pub charge_stamina_drain: f32,

    /// Sight sensor radius for bot-controlled citizens.
    pub sight_radius: f32,
}

/// Shared by every citizen; state hooks are plain fn pointers, so the
/// table reaches tuning through this static rather than a context.
pub static CITIZEN: CitizenTuning = CitizenTuning {
    speed: 120.0,
    growl_speed_factor: 1.333,
    max_health: 100,
    radius: 14.0,
    squeeze: 0.8,
    roll_speed: 200.0,
    roll_duration: 0.8,
    roll_stamina_cost: 0.3,
    spin_speed: 150.0,
    spin_duration: 0.6,
    spin_stamina_cost: 0.4,
    block_duration: 1.0,
    stun_duration: 1.0,
    dying_drift: 100.0,
    dying_duration: 1.5,
    stamina_regen: 0.2,
    growl_stamina_drain: 0.15,
    charge_stamina_drain: 0.25,
    sight_radius: 100.0,
};
