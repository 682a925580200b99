pub mod arbiter;
pub mod broadcast;
pub mod delivery;
pub mod earnings;
pub mod queue;
