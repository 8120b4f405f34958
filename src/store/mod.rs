pub mod file;
pub mod traits;

pub use file::{load_profiles, parse_profiles, FileStore};
pub use traits::{Store, StoreStats};
