//! The closed tool catalog and its input validation (spec §4.8).

#![deny(missing_docs)]

mod dispatcher;
mod error;
mod models;
mod validate;

pub use dispatcher::ToolDispatcher;
pub use error::{invalid, ToolError};
pub use models::{ModelInfo, ModelRegistry};
pub use validate::{
    validate_array_len, validate_path, validate_paths, validate_stuck_points, validate_text_len,
    MAX_ARRAY_ITEMS, MAX_HYPOTHESIS_CHARS, MAX_STUCK_POINT_CHARS, MAX_TEXT_CHARS,
};
