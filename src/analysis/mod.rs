pub mod dispersion;
pub mod movement;
pub mod ordering;
pub mod ranking;
