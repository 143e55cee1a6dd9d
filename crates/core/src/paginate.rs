//! Fixed-budget pagination and heading-based table of contents.
//!
//! Pagination is a pure function of `(text, budget)`: the pages always
//! concatenate back to the input, and every TOC entry points at a real page.

use crate::document::{Page, Pagination, TocEntry};
use crate::heading;

/// Default page size, in characters of line content (terminators excluded).
pub const DEFAULT_PAGE_CHAR_BUDGET: usize = 1200;

/// A heading seen once the page is this full (percent) is filed under the next page.
const PULL_FORWARD_PERCENT: usize = 80;

/// Split `text` into pages of roughly `budget` characters and index its headings.
///
/// Lines accumulate until their summed length exceeds the budget, then the
/// page is flushed. A heading's page is decided when the heading line is
/// read: if the current page is already past 80% of the budget, the entry
/// targets the next page even if the heading itself lands on this one.
pub fn paginate(text: &str, budget: usize) -> Pagination {
    let budget = budget.max(1);

    let mut pages: Vec<Page> = Vec::new();
    let mut toc: Vec<TocEntry> = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0usize;

    for line in text.split_inclusive('\n') {
        let body = line_body(line);

        if let Some(h) = heading::detect(body) {
            let page_index = if chunk_len * 100 > budget * PULL_FORWARD_PERCENT {
                pages.len() + 1
            } else {
                pages.len()
            };
            toc.push(TocEntry {
                title: h.title,
                page_index,
                level: h.level,
            });
        }

        chunk.push_str(line);
        chunk_len += body.chars().count();

        if chunk_len > budget {
            pages.push(Page {
                ordinal: pages.len() + 1,
                content: std::mem::take(&mut chunk),
            });
            chunk_len = 0;
        }
    }

    if !chunk.is_empty() {
        match pages.last_mut() {
            // trailing blank lines stay with the last page
            Some(last) if chunk.trim().is_empty() => last.content.push_str(&chunk),
            _ => pages.push(Page {
                ordinal: pages.len() + 1,
                content: chunk,
            }),
        }
    }

    if pages.is_empty() {
        pages.push(Page {
            ordinal: 1,
            content: String::new(),
        });
    }

    // a pulled-forward heading at the very end has no next page to land on
    let last_index = pages.len() - 1;
    for entry in &mut toc {
        entry.page_index = entry.page_index.min(last_index);
    }

    tracing::debug!("Paginated {} chars into {} pages, {} headings", text.len(), pages.len(), toc.len());

    Pagination { pages, toc }
}

/// Line content without its `\n` / `\r\n` terminator.
fn line_body(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn line(c: char, n: usize) -> String {
        std::iter::repeat(c).take(n).collect()
    }

    #[test]
    fn test_empty_text_gets_placeholder_page() {
        let p = paginate("", DEFAULT_PAGE_CHAR_BUDGET);
        assert_eq!(p.pages, vec![Page { ordinal: 1, content: String::new() }]);
        assert!(p.toc.is_empty());
    }

    #[test]
    fn test_short_text_single_page() {
        let p = paginate("hello\nworld", DEFAULT_PAGE_CHAR_BUDGET);
        assert_eq!(p.len(), 1);
        assert_eq!(p.pages[0].content, "hello\nworld");
    }

    #[test]
    fn test_flush_when_budget_exceeded() {
        let text = format!("{}\n{}\n{}\n", line('a', 700), line('b', 700), line('c', 10));
        let p = paginate(&text, 1200);
        assert_eq!(p.len(), 2);
        assert_eq!(p.pages[0].content, format!("{}\n{}\n", line('a', 700), line('b', 700)));
        assert_eq!(p.pages[1].content, format!("{}\n", line('c', 10)));
        assert_eq!(p.pages[1].ordinal, 2);
    }

    #[test]
    fn test_exactly_budget_does_not_flush() {
        let text = format!("{}\n{}", line('a', 600), line('b', 600));
        assert_eq!(paginate(&text, 1200).len(), 1);
    }

    #[test]
    fn test_terminators_not_counted() {
        let text = format!("{}\r\n{}\r\n", line('a', 50), line('b', 50));
        assert_eq!(paginate(&text, 100).len(), 1);
    }

    #[test]
    fn test_heading_on_current_page() {
        let text = "# One\nbody\n## Two\nmore\n";
        let p = paginate(text, 1200);
        assert_eq!(
            p.toc,
            vec![
                TocEntry { title: "One".into(), page_index: 0, level: 1 },
                TocEntry { title: "Two".into(), page_index: 0, level: 2 },
            ]
        );
    }

    #[test]
    fn test_heading_pulled_forward_near_boundary() {
        // 90 of 100 is past 80%, so the heading targets page index 1
        // even though it is appended to page 0 before the flush
        let text = format!("{}\n# Next\n{}\n{}\n", line('x', 90), line('y', 10), line('z', 5));
        let p = paginate(&text, 100);
        assert_eq!(p.len(), 2);
        assert!(p.pages[0].content.contains("# Next"));
        assert_eq!(p.toc[0].page_index, 1);
    }

    #[test]
    fn test_heading_at_exactly_80_percent_not_pulled() {
        let text = format!("{}\n# Here\n", line('x', 80));
        let p = paginate(&text, 100);
        assert_eq!(p.toc[0].page_index, 0);
    }

    #[test]
    fn test_pulled_forward_heading_clamped_at_end() {
        let text = format!("{}\n# Tail\n", line('x', 90));
        let p = paginate(&text, 100);
        assert_eq!(p.len(), 1);
        assert_eq!(p.toc[0].page_index, 0);
    }

    #[test]
    fn test_trailing_blank_lines_join_last_page() {
        let text = format!("{}\n\n\n", line('a', 20));
        let p = paginate(&text, 10);
        assert_eq!(p.len(), 1);
        assert_eq!(p.text(), text);
    }

    #[test]
    fn test_blank_only_text_single_page() {
        let p = paginate("   \n\n", 1200);
        assert_eq!(p.len(), 1);
        assert_eq!(p.pages[0].content, "   \n\n");
    }

    #[test]
    fn test_cjk_and_chapter_headings() {
        let text = "第一章 开端\n正文\nChapter 2 Onward\n正文\n";
        let p = paginate(text, 1200);
        let titles: Vec<_> = p.toc.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["第一章 开端", "Chapter 2 Onward"]);
        assert!(p.toc.iter().all(|e| e.level == 1));
    }

    #[test]
    fn test_budget_counts_chars_not_bytes() {
        // 400 CJK chars are 1200 bytes but only 400 characters
        let text = format!("{}\n{}\n", line('中', 400), line('文', 400));
        assert_eq!(paginate(&text, 1200).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_pages_partition_text(
            text in "(#{0,3} ?[a-z第章一 ]{0,40}(\r?\n){0,2}){0,80}",
            budget in 1usize..300,
        ) {
            let p = paginate(&text, budget);
            prop_assert_eq!(p.text(), text);
            for (i, page) in p.pages.iter().enumerate() {
                prop_assert_eq!(page.ordinal, i + 1);
            }
        }

        #[test]
        fn prop_toc_indices_in_bounds(
            text in "((# |第一章|Chapter 1)?[a-z ]{0,50}\n){0,60}",
            budget in 1usize..200,
        ) {
            let p = paginate(&text, budget);
            for entry in &p.toc {
                prop_assert!(entry.page_index < p.pages.len());
                prop_assert!(entry.level >= 1);
            }
        }

        #[test]
        fn prop_idempotent(text in "\\PC{0,400}", budget in 1usize..500) {
            prop_assert_eq!(paginate(&text, budget), paginate(&text, budget));
        }
    }
}
