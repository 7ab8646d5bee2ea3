//! Seed role: answers joins with the peers registered so far and drops
//! peers reported dead.
pub mod controller;
pub mod registry;

pub use controller::{SeedCommand, SeedController, SeedHandle, SeedNode, SeedStatus};
pub use registry::SeedRegistry;
