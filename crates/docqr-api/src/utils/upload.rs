//! Helpers for the multipart document upload.

use axum::extract::multipart::Field;
use docqr_core::AppError;

/// Reject files above the configured size, in the wording clients already expect.
pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File too large. Maximum size is {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Lowercased extension without the dot, or `None` for names without one.
pub fn file_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Check the extension against the allow-list and return it.
pub fn validate_file_extension(
    filename: &str,
    allowed_extensions: &[String],
) -> Result<Option<String>, AppError> {
    let extension = file_extension(filename);

    let allowed = extension
        .as_ref()
        .is_some_and(|ext| allowed_extensions.contains(ext));
    if !allowed {
        return Err(AppError::InvalidInput(format!(
            "File type not allowed. Allowed types: {}",
            allowed_extensions.join(", ")
        )));
    }

    Ok(extension)
}

/// Strip any client-side directory part and control characters from an uploaded name.
pub fn sanitize_filename(filename: &str) -> String {
    const MAX_FILENAME_LENGTH: usize = 255;

    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(MAX_FILENAME_LENGTH)
        .collect::<String>();

    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." {
        "file".to_string()
    } else {
        name.to_string()
    }
}

/// Text value of a non-file form field.
pub async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read form field: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["pdf", "docx", "png"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Report.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".env"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn disallowed_extension_lists_allowed_types() {
        let err = validate_file_extension("run.exe", &allowed()).unwrap_err();
        match err {
            AppError::InvalidInput(msg) => {
                assert!(msg.starts_with("File type not allowed"));
                assert!(msg.contains("pdf, docx, png"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(validate_file_extension("README", &allowed()).is_err());
        assert_eq!(
            validate_file_extension("scan.PNG", &allowed()).unwrap(),
            Some("png".to_string())
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(validate_file_size(10, 10).is_ok());
        assert!(matches!(
            validate_file_size(11, 10),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn sanitize_drops_directories_and_quotes() {
        assert_eq!(sanitize_filename("C:\\Users\\me\\q1.pdf"), "q1.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a\"b.txt"), "ab.txt");
        assert_eq!(sanitize_filename("  "), "file");
        assert_eq!(sanitize_filename("dir/.."), "file");
    }
}
