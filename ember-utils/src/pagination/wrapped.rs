//! Paginator variant that soft-wraps oversized lines on delimiters.

use super::paginator::{Paginator, char_len};
use super::{Paginate, PaginationError};

/// A [`Paginator`] that automatically wraps lines that would not fit.
///
/// Delimiters are tried in priority order; when none matches, the line is
/// hard-split at the size boundary if `force_wrap` is enabled, and rejected
/// otherwise.
#[derive(Debug, Clone)]
pub struct WrappedPaginator {
    inner: Paginator,
    wrap_on: Vec<String>,
    include_wrapped: bool,
    force_wrap: bool,
}

impl WrappedPaginator {
    pub fn new() -> Self {
        Self {
            inner: Paginator::new(),
            wrap_on: vec!["\n".to_owned(), " ".to_owned()],
            include_wrapped: true,
            force_wrap: false,
        }
    }

    /// Set the page prefix. Resets any buffered content.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner = self.inner.prefix(prefix);
        self
    }

    /// Remove the page prefix. Resets any buffered content.
    pub fn no_prefix(mut self) -> Self {
        self.inner = self.inner.no_prefix();
        self
    }

    /// Set the page suffix. Resets any buffered content.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.inner = self.inner.suffix(suffix);
        self
    }

    /// Remove the page suffix. Resets any buffered content.
    pub fn no_suffix(mut self) -> Self {
        self.inner = self.inner.no_suffix();
        self
    }

    /// Set the maximum page size in codepoints. Resets any buffered content.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.inner = self.inner.max_size(max_size);
        self
    }

    /// Set the wrapping delimiters, in priority order.
    pub fn wrap_on(mut self, delimiters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.wrap_on = delimiters.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the delimiter is kept at the start of the wrapped remainder.
    pub fn include_wrapped(mut self, include: bool) -> Self {
        self.include_wrapped = include;
        self
    }

    /// Whether to hard-split lines no delimiter can wrap.
    pub fn force_wrap(mut self, force: bool) -> Self {
        self.force_wrap = force;
        self
    }

    pub fn add_line(&mut self, line: &str) -> Result<(), PaginationError> {
        self.wrapped_add(line, false)
    }

    pub fn add_line_empty(&mut self, line: &str) -> Result<(), PaginationError> {
        self.wrapped_add(line, true)
    }

    fn wrapped_add(&mut self, line: &str, trailing_blank: bool) -> Result<(), PaginationError> {
        let true_max = self.true_max_size();
        let original_length = char_len(line);
        let mut rest = line;

        while char_len(rest) > true_max {
            if true_max <= 1 {
                return Err(PaginationError::Unwrappable {
                    length: original_length,
                    remaining: char_len(rest),
                    max: true_max,
                });
            }

            let cutoff = byte_index_at_char(rest, true_max - 1);
            let window = &rest[..cutoff];
            let mut wrapped = false;

            for delimiter in &self.wrap_on {
                let Some(position) = window.rfind(delimiter.as_str()) else {
                    continue;
                };
                if position == 0 {
                    continue;
                }

                self.inner.append_line(&rest[..position], trailing_blank)?;
                wrapped = true;

                rest = if self.include_wrapped {
                    &rest[position..]
                } else {
                    &rest[position + delimiter.len()..]
                };
                break;
            }

            if !wrapped {
                if !self.force_wrap {
                    return Err(PaginationError::Unwrappable {
                        length: original_length,
                        remaining: char_len(rest),
                        max: true_max,
                    });
                }

                self.inner.append_line(window, false)?;
                rest = &rest[cutoff..];
            }
        }

        self.inner.append_line(rest, trailing_blank)
    }

    /// Capacity a single un-wrapped line may occupy.
    fn true_max_size(&self) -> usize {
        // two codepoints of margin on top of the base reservation
        self.inner
            .max_page_size()
            .saturating_sub(self.inner.capacity_overhead())
            .saturating_sub(2)
    }

    pub fn close_page(&mut self) {
        self.inner.close_page();
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn pages(&mut self) -> &[String] {
        self.inner.pages()
    }

    pub fn live_pages(&self) -> Vec<String> {
        self.inner.live_pages()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for WrappedPaginator {
    fn default() -> Self {
        Self::new()
    }
}

impl Paginate for WrappedPaginator {
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
        self.inner.max_page_size()
    }
}

fn byte_index_at_char(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}
