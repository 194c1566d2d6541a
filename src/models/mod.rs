pub mod delivery;
pub mod user;
