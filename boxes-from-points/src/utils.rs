//! Message formatting and storage key helpers.

use crate::common::*;

/// The default number of items rendered by [`format_sequence`].
pub const LIST_DISPLAY_THRESHOLD: usize = 5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Joins at most `max_items` items, appending "(and K more)" for the rest.
pub fn format_sequence<I>(items: I, max_items: usize, separator: &str) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let items: Vec<_> = items.into_iter().collect();
    let shown = items.iter().take(max_items).join(separator);
    let remainder = items.len().saturating_sub(max_items);

    if remainder > 0 {
        format!("{} (and {} more)", shown, remainder)
    } else {
        shown
    }
}

/// The storage key of an artifact produced by the run `run_id`.
pub fn compose_data_bucket_filename(run_id: &str, filename: &str) -> String {
    format!("{}/{}", run_id.trim_end_matches('/'), filename)
}

pub fn strip_bucket_prefix(filenames: Vec<String>, prefix: &str) -> Vec<String> {
    let prefix = prefix.trim_matches('/');
    filenames
        .into_iter()
        .map(|filename| {
            let trimmed = filename.trim_start_matches('/');
            if prefix.is_empty() {
                return trimmed.to_string();
            }
            trimmed
                .strip_prefix(prefix)
                .map(|rest| rest.trim_start_matches('/').to_string())
                .unwrap_or_else(|| trimmed.to_string())
        })
        .collect()
}

pub fn is_image(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn filter_image_files(filenames: Vec<String>) -> Vec<String> {
    filenames.into_iter().filter(|name| is_image(name)).collect()
}
