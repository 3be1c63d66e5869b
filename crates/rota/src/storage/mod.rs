pub mod backend;
pub mod fixture;
pub mod memory;
pub mod query;

pub use backend::{Row, StorageBackend};
pub use fixture::{Fixture, ScriptStep};
pub use memory::MemoryStore;
pub use query::{Embed, Projection, SelectQuery};
