//! Snippet execution engine for the interactive REPL.
//!
//! Snippets are a Python subset parsed with `rustpython-parser` and evaluated
//! by an in-process tree walker. Executions are driven one yielded value at a
//! time and persist their variable bindings into a shared [`Scope`].

mod builtins;
mod compile;
mod eval;

pub mod error;
pub mod executor;
pub mod scope;
pub mod trace;
pub mod value;

pub use error::{EvalError, ExecutionError};
pub use executor::{AsyncCodeExecutor, ExecutionStream};
pub use scope::Scope;
pub use trace::SourceRegistry;
pub use value::Value;
