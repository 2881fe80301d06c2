//! Stable facade for the pagination primitives and the reaction interface.

use thiserror::Error;

mod interface;
mod paginator;
mod wrapped;

pub use interface::PaginatorInterface;
pub use paginator::Paginator;
pub use wrapped::WrappedPaginator;

/// Hard platform ceiling for a single message, in codepoints.
pub const MAX_PAGE_SIZE: usize = 2000;

/// Default lifetime of an interactive paginator, in seconds.
pub const DEFAULT_INTERFACE_TIMEOUT_SECS: u64 = 7200;

/// Errors raised by the pagination components.
///
/// `LineTooLong` and `PageSizeExceeded` are caller configuration errors and
/// surface immediately; `Unwrappable` means no configured delimiter could
/// split an oversized line and hard wrapping was not enabled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("line of {length} characters exceeds maximum page capacity {max}")]
    LineTooLong { length: usize, max: usize },

    #[error(
        "line of length {length} had a sequence of {remaining} characters \
         (max is {max}) that could not be wrapped with the configured delimiters"
    )]
    Unwrappable {
        length: usize,
        remaining: usize,
        max: usize,
    },

    #[error("paginator page size is too large for this interface ({page_size} > {limit})")]
    PageSizeExceeded { page_size: usize, limit: usize },
}

/// The five reaction symbols driving an interactive paginator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiSet {
    pub start: String,
    pub back: String,
    pub forward: String,
    pub end: String,
    pub close: String,
}

impl Default for EmojiSet {
    fn default() -> Self {
        Self {
            start: "\u{23ee}".to_owned(),
            back: "\u{25c0}".to_owned(),
            forward: "\u{25b6}".to_owned(),
            end: "\u{23ed}".to_owned(),
            close: "\u{23f9}".to_owned(),
        }
    }
}

impl EmojiSet {
    pub fn contains(&self, emoji: &str) -> bool {
        self.all().contains(&emoji)
    }

    /// All five symbols, in navigation order.
    pub fn all(&self) -> [&str; 5] {
        [
            self.start.as_str(),
            self.back.as_str(),
            self.forward.as_str(),
            self.end.as_str(),
            self.close.as_str(),
        ]
    }

    /// The four paging symbols, excluding close.
    pub fn navigation(&self) -> [&str; 4] {
        [
            self.start.as_str(),
            self.back.as_str(),
            self.forward.as_str(),
            self.end.as_str(),
        ]
    }
}

/// Common surface of [`Paginator`] and [`WrappedPaginator`], so the
/// interface can drive either behind one object.
pub trait Paginate: Send {
    /// Add a line to the current page.
    fn add_line(&mut self, line: &str) -> Result<(), PaginationError>;

    /// Add a line followed by one blank line.
    fn add_line_empty(&mut self, line: &str) -> Result<(), PaginationError>;

    /// All pages including the open buffer, without closing it.
    fn live_pages(&self) -> Vec<String>;

    /// Configured maximum page size in codepoints.
    fn max_size(&self) -> usize;
}
