//! Text and paging helpers shared by the core and the transport.

/// Items per page in browsable lists.
pub const PAGE_SIZE: usize = 8;

/// Truncate `s` to at most `max_chars` characters, respecting char
/// boundaries.
#[must_use]
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// One page of a list
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    /// Items on this page
    pub items: &'a [T],
    /// Zero-based page index, clamped to the last page
    pub index: usize,
    /// Number of pages, at least 1
    pub total_pages: usize,
}

impl<T> Page<'_, T> {
    /// Whether a previous page exists.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.index > 0
    }

    /// Whether a next page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.index + 1 < self.total_pages
    }
}

/// Slice `items` into page `index` of `per_page` items.
#[must_use]
pub fn paginate<T>(items: &[T], index: usize, per_page: usize) -> Page<'_, T> {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page).max(1);
    let index = index.min(total_pages - 1);
    let start = (index * per_page).min(items.len());
    let end = (start + per_page).min(items.len());
    Page {
        items: &items[start..end],
        index,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Canal Esportes Ação";
        assert_eq!(truncate_str(s, 17), "Canal Esportes Aç");
        assert_eq!(truncate_str(s, 50), s);
    }

    #[test]
    fn test_paginate_bounds() {
        let items: Vec<u32> = (0..20).collect();
        let first = paginate(&items, 0, PAGE_SIZE);
        assert_eq!(first.items, &items[0..8]);
        assert_eq!(first.total_pages, 3);
        assert!(!first.has_prev());
        assert!(first.has_next());

        let last = paginate(&items, 2, PAGE_SIZE);
        assert_eq!(last.items, &items[16..20]);
        assert!(!last.has_next());

        // Out of range clamps to the last page
        assert_eq!(paginate(&items, 99, PAGE_SIZE).index, 2);
    }

    #[test]
    fn test_paginate_empty() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, 0, PAGE_SIZE);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }
}
