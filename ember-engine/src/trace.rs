//! Synthetic source bookkeeping so tracebacks can quote submitted snippets.
//!
//! Snippets have no file on disk; each execution is assigned a `<repl:N>`
//! name, and the source text is registered under that name when an error
//! occurs so the rendered traceback can show the offending line.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared registry mapping synthetic filenames to snippet source lines.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    sources: HashMap<String, Vec<String>>,
    next_id: usize,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next synthetic filename.
    pub fn allocate(&self) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        format!("<repl:{}>", inner.next_id)
    }

    /// Store a snippet's source under its synthetic filename.
    pub fn register(&self, name: &str, source: &str) {
        let lines = source.lines().map(str::to_owned).collect();
        self.lock().sources.insert(name.to_owned(), lines);
    }

    /// Fetch one source line (1-based) from a registered snippet.
    pub fn source_line(&self, name: &str, line: usize) -> Option<String> {
        let inner = self.lock();
        let lines = inner.sources.get(name)?;
        lines.get(line.checked_sub(1)?).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps byte offsets in a snippet to 1-based line numbers.
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (index, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(index + 1);
            }
        }

        Self { line_starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequential_names() {
        let registry = SourceRegistry::new();

        assert_eq!(registry.allocate(), "<repl:1>");
        assert_eq!(registry.allocate(), "<repl:2>");
    }

    #[test]
    fn registered_sources_resolve_lines() {
        let registry = SourceRegistry::new();
        registry.register("<repl:1>", "x = 5\nx + y");

        assert_eq!(registry.source_line("<repl:1>", 2).as_deref(), Some("x + y"));
        assert_eq!(registry.source_line("<repl:1>", 3), None);
        assert_eq!(registry.source_line("<repl:9>", 1), None);
    }

    #[test]
    fn line_index_maps_offsets() {
        let index = LineIndex::new("ab\ncd\nef");

        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 1);
        assert_eq!(index.line_of(3), 2);
        assert_eq!(index.line_of(6), 3);
    }
}
