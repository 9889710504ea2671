pub mod labels;
pub mod profiles;
pub mod recipes;
pub mod users;

use std::path::Path;

use uuid::Uuid;

use crate::{
    constants::{IMAGE_EXTENSION_MAX_LENGTH, UPLOADS_DIR},
    error::ApiError,
};

/// Storage path for an uploaded image: `uploads/<kind>/<uuid><ext>`.
/// Only the extension of the client's file name is kept, and only when it is
/// short enough that the path fits the `image` column.
pub fn image_filepath(kind: &str, filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().count() <= IMAGE_EXTENSION_MAX_LENGTH)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!("{UPLOADS_DIR}/{kind}/{}{ext}", Uuid::new_v4())
}

/// Unwraps a value a full (non-partial) form has already checked for.
pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::invalid(field, crate::form::REQUIRED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_path_keeps_extension_only() {
        let path = image_filepath("recipe", "my photo.JPG");

        assert!(path.starts_with("uploads/recipe/"));
        assert!(path.ends_with(".JPG"));
        assert!(!path.contains("my photo"));

        let uuid = &path["uploads/recipe/".len()..path.len() - ".JPG".len()];
        assert!(Uuid::parse_str(uuid).is_ok());
    }

    #[test]
    fn image_path_without_extension() {
        let path = image_filepath("profile", "avatar");
        let uuid = &path["uploads/profile/".len()..];

        assert!(Uuid::parse_str(uuid).is_ok());
    }

    #[test]
    fn distinct_uploads_get_distinct_paths() {
        assert_ne!(
            image_filepath("profile", "a.png"),
            image_filepath("profile", "a.png")
        );
    }

    #[test]
    fn overlong_extension_is_dropped() {
        let filename = format!("a.{}", "x".repeat(220));
        let path = image_filepath("profile", &filename);

        assert!(path.len() <= 255);
        let uuid = &path["uploads/profile/".len()..];
        assert!(Uuid::parse_str(uuid).is_ok());
    }
}
