pub mod openai;
pub mod template;
pub mod traits;

pub use openai::OpenAiEnhancer;
pub use template::{generic_details, TemplateComposer};
pub use traits::{Composer, Enhancer};
