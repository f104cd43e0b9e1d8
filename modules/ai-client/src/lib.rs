pub mod error;
pub mod gemini;
pub mod traits;
pub mod util;

pub use error::AiError;
pub use gemini::Gemini;
pub use traits::{generate_json, TextGenerator};
pub use util::{strip_code_blocks, truncate_to_char_boundary};
