pub mod browser;
pub mod traits;

pub use browser::{BrowserSubmitter, HumanPacing};
pub use traits::Submitter;
