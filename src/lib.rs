pub mod api;
pub mod cli;
pub mod error;
pub mod node;
pub mod settings;
pub mod store;
pub mod transport;
