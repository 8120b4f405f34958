pub mod error;
pub mod is24;
pub mod traits;
pub mod types;
pub mod user_agents;

pub use error::SourceError;
pub use is24::Is24Source;
pub use traits::Source;
pub use types::{search_url, SearchParams};
