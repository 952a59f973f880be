pub mod citizen;
pub mod weapon;

pub use citizen::CITIZEN;
pub use weapon::weapon;
