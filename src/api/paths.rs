//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
    pub const STATUS: &str = "/status";
}

pub mod seed {
    pub const PEERS: &str = "/peers";
}

pub mod peer {
    pub const MEMBERSHIP: &str = "/membership";
    pub const GOSSIP: &str = "/gossip";
}
