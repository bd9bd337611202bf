//! Data models for the application
//!
//! Each sub-module represents one domain area: documents (with tags), categories,
//! users, audit logs and statistics.

mod audit;
mod category;
mod document;
mod statistics;
mod user;

// Re-export all models for convenient imports
pub use audit::*;
pub use category::*;
pub use document::*;
pub use statistics::*;
pub use user::*;


/// Pagination bounds shared by list endpoints.
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// One page of a filtered listing plus the size of the whole filtered set.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    /// Row offset of `page`. Saturates; callers reject pages past [`MAX_PAGE`].
    pub fn offset(page: i64, limit: i64) -> i64 {
        (page.max(1) - 1).saturating_mul(limit)
    }
}

/// Highest page number accepted by list endpoints.
pub const MAX_PAGE: i64 = 1_000_000;

/// Normalize a tag list: trim, lowercase, drop empties and duplicates (first wins).
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_lowercased_and_deduped() {
        assert_eq!(normalize_tags(["a", "A", " a "]), vec!["a"]);
        assert_eq!(
            normalize_tags(["finance", " 2024", "", "  "]),
            vec!["finance", "2024"]
        );
    }

    #[test]
    fn offset_clamps_page() {
        assert_eq!(Page::<()>::offset(1, 20), 0);
        assert_eq!(Page::<()>::offset(3, 20), 40);
        assert_eq!(Page::<()>::offset(0, 20), 0);
        assert_eq!(Page::<()>::offset(i64::MAX / 2, 100), i64::MAX);
    }
}
