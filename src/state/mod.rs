//! Lock document model, its persistence, and the per-context state machine.

pub mod lock;
pub mod model;
pub mod store;

pub use lock::{LockState, Resolution, check_expiry};
pub use model::{DeleteException, LockDocument, Profile, Status, Target};
pub use store::{ConfigStore, FileStore, MemoryStore};
