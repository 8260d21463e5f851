//! Offset pagination helpers shared by list endpoints.

use serde::Serialize;

/// Largest row offset a list query will use.
pub const MAX_OFFSET: i64 = 1_000_000_000;

/// Parse an opaque offset cursor. Anything that is not a plain
/// non-negative integer restarts from the beginning; values past
/// [`MAX_OFFSET`] are capped to it.
#[must_use]
pub fn parse_cursor(cursor: Option<&str>) -> i64 {
    cursor
        .map(str::trim)
        .filter(|c| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()))
        .map_or(0, |c| c.parse::<i64>().map_or(MAX_OFFSET, |n| n.min(MAX_OFFSET)))
}

/// Clamp a requested page size to `1..=max`, using `default` when absent.
#[must_use]
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}

/// Cursor for the following page, if any rows remain.
#[must_use]
pub fn next_cursor(offset: i64, limit: i64, total: i64) -> Option<String> {
    let next = offset.saturating_add(limit);
    (next < total).then(|| next.to_string())
}

/// Number of pages needed for `total` rows; at least one.
#[must_use]
pub fn page_count(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 1;
    }
    total / limit + i64::from(total % limit != 0)
}

/// Offset of a 1-based page number, capped at [`MAX_OFFSET`].
#[must_use]
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1)
        .saturating_mul(limit.max(0))
        .min(MAX_OFFSET)
}

/// A page of results in the `{items, total, page, pages, limit}` shape.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        Self {
            items,
            total,
            page: page.max(1),
            pages: page_count(total, limit),
            limit,
        }
    }
}
