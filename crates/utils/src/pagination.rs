use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{ValidationErrors, Validator};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Query string accepted by every list endpoint.
///
/// The admin table sends the window it wants as offsets (`lower_bound` inclusive,
/// `upper_bound` exclusive) instead of page numbers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ListQuery {
    pub lower_bound: Option<i64>,
    pub upper_bound: Option<i64>,
    pub search: Option<String>,
}

/// A validated window plus the optional search term
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn page(&self, max_page_size: i64) -> Result<Page, ValidationErrors> {
        let lower = self.lower_bound.unwrap_or(0);
        let upper = self.upper_bound.unwrap_or(lower.saturating_add(DEFAULT_PAGE_SIZE));

        let mut v = Validator::new();
        if lower < 0 {
            v.add("lower_bound", "The lower_bound must be at least 0.");
        }
        if upper <= lower {
            v.add("upper_bound", "The upper_bound must be greater than lower_bound.");
        }
        v.finish()?;

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Page {
            offset: lower,
            limit: (upper - lower).min(max_page_size.max(1)),
            search,
        })
    }
}

impl Page {
    /// `LIKE` pattern for the search term, to be used with `ESCAPE '\'`.
    /// Matches everything when there is no search term.
    pub fn like_pattern(&self) -> String {
        match &self.search {
            Some(term) => {
                let escaped = term
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                format!("%{escaped}%")
            }
            None => "%".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(lower: Option<i64>, upper: Option<i64>, search: Option<&str>) -> ListQuery {
        ListQuery {
            lower_bound: lower,
            upper_bound: upper,
            search: search.map(str::to_string),
        }
    }

    #[test]
    fn defaults_to_first_ten_rows() {
        let page = ListQuery::default().page(100).unwrap();
        assert_eq!(page, Page { offset: 0, limit: 10, search: None });
    }

    #[test]
    fn window_is_upper_minus_lower() {
        let page = query(Some(20), Some(45), None).page(100).unwrap();
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, 25);
    }

    #[test]
    fn window_is_clamped() {
        let page = query(Some(0), Some(10_000), None).page(100).unwrap();
        assert_eq!(page.limit, 100);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = query(Some(10), Some(5), None).page(100).unwrap_err();
        assert!(err.fields().contains_key("upper_bound"));

        let err = query(Some(-1), Some(5), None).page(100).unwrap_err();
        assert!(err.fields().contains_key("lower_bound"));
    }

    #[test]
    fn huge_lower_bound_without_upper_does_not_overflow() {
        let page = query(Some(i64::MAX - 3), None, None).page(100).unwrap();
        assert_eq!(page.offset, i64::MAX - 3);
        assert_eq!(page.limit, 3);

        let err = query(Some(i64::MAX), None, None).page(100).unwrap_err();
        assert!(err.fields().contains_key("upper_bound"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let page = query(None, None, Some("   ")).page(100).unwrap();
        assert_eq!(page.search, None);
        assert_eq!(page.like_pattern(), "%");
    }

    #[test]
    fn search_wildcards_are_escaped() {
        let page = query(None, None, Some(" 50%_off ")).page(100).unwrap();
        assert_eq!(page.like_pattern(), "%50\\%\\_off%");
    }
}
