//! Line-oriented page accumulation with prefix/suffix wrapping.

use super::{MAX_PAGE_SIZE, Paginate, PaginationError};

/// Splits added lines into pages that never exceed `max_size` codepoints,
/// wrapping each page with an optional prefix and suffix.
///
/// All size arithmetic is in Unicode scalar values, matching the platform's
/// message length accounting.
#[derive(Debug, Clone)]
pub struct Paginator {
    prefix: Option<String>,
    suffix: Option<String>,
    max_size: usize,
    linesep: String,
    closed: Vec<String>,
    current: Vec<String>,
    count: usize,
}

impl Paginator {
    pub fn new() -> Self {
        let mut paginator = Self {
            prefix: Some("```".to_owned()),
            suffix: Some("```".to_owned()),
            max_size: MAX_PAGE_SIZE,
            linesep: "\n".to_owned(),
            closed: Vec::new(),
            current: Vec::new(),
            count: 0,
        };
        paginator.clear();
        paginator
    }

    /// Set the page prefix. Resets any buffered content.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self.clear();
        self
    }

    /// Remove the page prefix. Resets any buffered content.
    pub fn no_prefix(mut self) -> Self {
        self.prefix = None;
        self.clear();
        self
    }

    /// Set the page suffix. Resets any buffered content.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self.clear();
        self
    }

    /// Remove the page suffix. Resets any buffered content.
    pub fn no_suffix(mut self) -> Self {
        self.suffix = None;
        self.clear();
        self
    }

    /// Set the maximum page size in codepoints. Resets any buffered content.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self.clear();
        self
    }

    /// Set the line separator. Resets any buffered content.
    pub fn linesep(mut self, linesep: impl Into<String>) -> Self {
        self.linesep = linesep.into();
        self.clear();
        self
    }

    fn prefix_len(&self) -> usize {
        self.prefix.as_deref().map_or(0, char_len)
    }

    fn suffix_len(&self) -> usize {
        self.suffix.as_deref().map_or(0, char_len)
    }

    fn linesep_len(&self) -> usize {
        char_len(&self.linesep)
    }

    /// Usable capacity for a single line on an empty page.
    pub fn capacity(&self) -> usize {
        self.max_size
            .saturating_sub(self.capacity_overhead())
            .saturating_sub(2 * self.linesep_len())
    }

    /// Combined prefix and suffix length.
    pub(crate) fn capacity_overhead(&self) -> usize {
        self.prefix_len() + self.suffix_len()
    }

    pub fn max_page_size(&self) -> usize {
        self.max_size
    }

    /// Clear the paginator to have no pages.
    pub fn clear(&mut self) {
        self.closed.clear();
        self.reset_current();
    }

    fn reset_current(&mut self) {
        match &self.prefix {
            Some(prefix) => {
                self.current = vec![prefix.clone()];
                self.count = char_len(prefix) + self.linesep_len();
            }
            None => {
                self.current = Vec::new();
                self.count = 0;
            }
        }
    }

    /// Add a line to the current page.
    ///
    /// Closes the page first when the line would not fit; fails when the line
    /// alone exceeds the page capacity (content is never truncated).
    pub fn add_line(&mut self, line: &str) -> Result<(), PaginationError> {
        self.append_line(line, false)
    }

    /// Add a line followed by one blank line.
    pub fn add_line_empty(&mut self, line: &str) -> Result<(), PaginationError> {
        self.append_line(line, true)
    }

    pub(crate) fn append_line(
        &mut self,
        line: &str,
        trailing_blank: bool,
    ) -> Result<(), PaginationError> {
        let length = char_len(line);
        let capacity = self.capacity();

        if length > capacity {
            return Err(PaginationError::LineTooLong {
                length,
                max: capacity,
            });
        }

        if self.count + length + self.linesep_len() > self.max_size.saturating_sub(self.suffix_len())
        {
            self.close_page();
        }

        self.count += length + self.linesep_len();
        self.current.push(line.to_owned());

        if trailing_blank {
            self.current.push(String::new());
            self.count += self.linesep_len();
        }

        Ok(())
    }

    /// Prematurely terminate the current page.
    pub fn close_page(&mut self) {
        if let Some(suffix) = &self.suffix {
            self.current.push(suffix.clone());
        }
        self.closed.push(self.current.join(&self.linesep));
        self.reset_current();
    }

    /// Total buffered codepoints across closed pages and the open buffer.
    pub fn len(&self) -> usize {
        self.closed.iter().map(|page| char_len(page)).sum::<usize>() + self.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current_has_content(&self) -> bool {
        let threshold = usize::from(self.prefix.is_some());
        self.current.len() > threshold
    }

    /// Rendered pages. Closes a non-trivial open buffer first, so the result
    /// always reflects everything added so far.
    pub fn pages(&mut self) -> &[String] {
        if self.current_has_content() {
            self.close_page();
        }
        &self.closed
    }

    /// All pages including the open buffer, without closing it. Used by the
    /// live interface so content can keep growing.
    pub fn live_pages(&self) -> Vec<String> {
        let mut pages = self.closed.clone();

        if self.current_has_content() {
            let mut open = self.current.join(&self.linesep);
            open.push_str(&self.linesep);
            open.push_str(self.suffix.as_deref().unwrap_or(""));
            pages.push(open);
        }

        pages
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new()
    }
}

impl Paginate for Paginator {
    fn add_line(&mut self, line: &str) -> Result<(), PaginationError> {
        Self::add_line(self, line)
    }

    fn add_line_empty(&mut self, line: &str) -> Result<(), PaginationError> {
        Self::add_line_empty(self, line)
    }

    fn live_pages(&self) -> Vec<String> {
        Self::live_pages(self)
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstructs_lines_in_order() {
        let mut paginator = Paginator::new().max_size(30);
        let lines = ["alpha", "beta", "gamma", "delta", "epsilon"];

        for line in lines {
            paginator.add_line(line).unwrap();
        }

        let stripped: Vec<String> = paginator
            .pages()
            .iter()
            .map(|page| {
                page.trim_start_matches("```")
                    .trim_end_matches("```")
                    .trim_matches('\n')
                    .to_owned()
            })
            .collect();
        let rejoined = stripped.join("\n");
        let flattened: Vec<&str> = rejoined.lines().collect();

        assert_eq!(flattened, lines);
    }

    #[test]
    fn len_counts_closed_and_open_content() {
        let mut paginator = Paginator::new().max_size(20);
        paginator.add_line("abcdef").unwrap();
        paginator.add_line("ghijkl").unwrap();

        let closed: usize = paginator.pages().iter().map(|page| char_len(page)).sum();

        // after materialization the open buffer holds only the prefix + linesep
        assert_eq!(paginator.len(), closed + char_len("```") + 1);
    }

    #[test]
    fn line_at_capacity_boundary_is_accepted() {
        let mut paginator = Paginator::new().max_size(100);
        let capacity = paginator.capacity();

        paginator.add_line(&"x".repeat(capacity)).unwrap();
    }

    #[test]
    fn line_over_capacity_is_rejected() {
        let mut paginator = Paginator::new().max_size(100);
        let capacity = paginator.capacity();

        let err = paginator.add_line(&"x".repeat(capacity + 1)).unwrap_err();
        assert_eq!(
            err,
            PaginationError::LineTooLong {
                length: capacity + 1,
                max: capacity,
            }
        );
    }

    #[test]
    fn every_page_stays_within_max_size() {
        let mut paginator = Paginator::new().max_size(60);

        for index in 0..40 {
            paginator.add_line(&format!("line number {index}")).unwrap();
        }

        for page in paginator.pages() {
            assert!(char_len(page) <= 60, "page too long: {page:?}");
        }
    }

    #[test]
    fn pages_materialization_is_idempotent() {
        let mut paginator = Paginator::new();
        paginator.add_line("once").unwrap();

        let first = paginator.pages().to_vec();
        let second = paginator.pages().to_vec();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn empty_flag_inserts_blank_line() {
        let mut paginator = Paginator::new().no_prefix().no_suffix();
        paginator.add_line_empty("first").unwrap();
        paginator.add_line("second").unwrap();

        assert_eq!(paginator.pages(), ["first\n\nsecond"]);
    }

    #[test]
    fn size_arithmetic_uses_codepoints() {
        let mut paginator = Paginator::new().no_prefix().no_suffix().max_size(10);

        // Four three-byte codepoints, well within a ten-codepoint page.
        paginator.add_line("\u{3042}\u{3044}\u{3046}\u{3048}").unwrap();
        assert_eq!(paginator.pages().len(), 1);
    }

    #[test]
    fn live_pages_does_not_close_the_open_buffer() {
        let mut paginator = Paginator::new();
        paginator.add_line("still open").unwrap();

        let live = paginator.live_pages();
        assert_eq!(live.len(), 1);
        assert!(live[0].contains("still open"));

        // adding more content still lands on the same open page
        paginator.add_line("more").unwrap();
        assert_eq!(paginator.live_pages().len(), 1);
    }
}
