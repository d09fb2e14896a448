//! Input validation shared by every tool (spec §4.8): path traversal
//! rejection, string length caps, array length caps.

use crate::error::{invalid, ToolError};
use std::path::{Component, Path};

/// Cap on a hypothesis statement or issue description's length.
pub const MAX_HYPOTHESIS_CHARS: usize = 2000;
/// Cap on an issue/approach free-text field's length.
pub const MAX_TEXT_CHARS: usize = 1000;
/// Cap on a single stuck-point string's length.
pub const MAX_STUCK_POINT_CHARS: usize = 200;
/// Default cap on array-valued fields.
pub const MAX_ARRAY_ITEMS: usize = 100;

/// Reject a path that is absolute, empty, contains a `..` traversal
/// segment, or resolves outside `root`. Returns the validated path
/// unchanged.
pub fn validate_path<'a>(field: &str, path: &'a str, root: &Path) -> Result<&'a str, ToolError> {
    if path.is_empty() {
        return Err(invalid(field, "path must not be empty"));
    }
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(invalid(field, "path must not be absolute"));
    }
    if candidate.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(invalid(field, "path must not contain a parent-directory segment"));
    }
    if !is_contained(root, candidate) {
        return Err(invalid(field, "path escapes the configured workspace root"));
    }
    Ok(path)
}

/// Whether `root.join(candidate)` stays inside `root`, resolving symlinks
/// when the joined path actually exists. Falls back to a lexical
/// component-wise check when it doesn't (the common case: tools reason
/// about files that may not exist yet or aren't visible from this
/// process's filesystem view).
fn is_contained(root: &Path, candidate: &Path) -> bool {
    let joined = root.join(candidate);
    match (root.canonicalize(), joined.canonicalize()) {
        (Ok(root), Ok(joined)) => joined.starts_with(root),
        _ => joined.components().all(|c| !matches!(c, Component::ParentDir)),
    }
}

/// Validate every path in a slice, reporting the first offender with an
/// indexed field path.
pub fn validate_paths(field: &str, paths: &[String], root: &Path) -> Result<(), ToolError> {
    validate_array_len(field, paths, MAX_ARRAY_ITEMS)?;
    for (i, path) in paths.iter().enumerate() {
        validate_path(&format!("{}[{}]", field, i), path, root)?;
    }
    Ok(())
}

/// Reject a string longer than `max_chars`.
pub fn validate_text_len(field: &str, text: &str, max_chars: usize) -> Result<(), ToolError> {
    if text.chars().count() > max_chars {
        return Err(invalid(
            field,
            format!("exceeds maximum length of {} characters", max_chars),
        ));
    }
    Ok(())
}

/// Reject an array longer than `max_items`.
pub fn validate_array_len<T>(field: &str, items: &[T], max_items: usize) -> Result<(), ToolError> {
    if items.len() > max_items {
        return Err(invalid(field, format!("exceeds maximum of {} items", max_items)));
    }
    Ok(())
}

/// Validate every stuck-point string against its per-item cap plus the
/// overall array cap.
pub fn validate_stuck_points(field: &str, points: &[String]) -> Result<(), ToolError> {
    validate_array_len(field, points, MAX_ARRAY_ITEMS)?;
    for (i, point) in points.iter().enumerate() {
        validate_text_len(&format!("{}[{}]", field, i), point, MAX_STUCK_POINT_CHARS)?;
    }
    Ok(())
}
