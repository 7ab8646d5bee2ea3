//! External collaborators of the protocol engines: registry persistence,
//! the event log and the shared seed list.
pub mod event_log;
pub mod registry;
pub mod seed_list;

pub use event_log::{EventLog, FileEventLog, MemoryEventLog, NullEventLog};
pub use registry::{FileRegistryStore, MemoryRegistryStore, RegistryStore};
pub use seed_list::SeedList;
