//! Drives compiled snippets one yielded value at a time.
//!
//! A snippet containing yields runs as a generator: each yield surfaces one
//! value and suspends until the consumer asks for the next step (optionally
//! sending a value back in). A snippet without yields surfaces exactly one
//! `None` result after its body completes. Either way, the bindings the
//! snippet created are merged into the shared [`Scope`] when the execution
//! ends (on error and on cooperative cancellation too), so variables
//! persist across submissions.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::builtins::{self, OutputSink};
use crate::compile::{self, Program};
use crate::error::{EvalError, ExecutionError};
use crate::eval::{Interpreter, YieldPoint};
use crate::scope::Scope;
use crate::trace::{LineIndex, SourceRegistry};
use crate::value::Value;

/// Compiles a snippet and prepares it for execution against a [`Scope`].
pub struct AsyncCodeExecutor {
    source: String,
    program: Program,
    scope: Scope,
    args: Vec<(String, Value)>,
    registry: SourceRegistry,
    filename: String,
}

impl AsyncCodeExecutor {
    /// Compile a snippet. Syntax and unsupported-subset errors surface here,
    /// already annotated with their synthetic filename.
    pub fn new(
        source: &str,
        scope: Scope,
        registry: &SourceRegistry,
    ) -> Result<Self, ExecutionError> {
        let filename = registry.allocate();

        let program = match compile::compile(source) {
            Ok(program) => program,
            Err(error) => {
                registry.register(&filename, source);
                return Err(ExecutionError {
                    file: filename,
                    line: 0,
                    error,
                });
            }
        };

        Ok(Self {
            source: source.to_owned(),
            program,
            scope,
            args: Vec::new(),
            registry: registry.clone(),
            filename,
        })
    }

    /// Inject a context binding visible to the snippet.
    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.push((name.into(), value));
        self
    }

    /// The synthetic filename assigned to this snippet.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Spawn the execution and return the stream that drives it.
    pub fn stream(self) -> ExecutionStream {
        let (results_tx, results_rx) = mpsc::channel(1);
        let (replies_tx, replies_rx) = mpsc::channel(1);
        let stdout = OutputSink::new();

        let mut bindings = builtins::default_bindings();
        bindings.extend(self.scope.seed());
        bindings.extend(self.args);

        let worker = ExecutionWorker {
            source: self.source,
            program: self.program,
            scope: self.scope,
            registry: self.registry,
            filename: self.filename,
            bindings,
            stdout: stdout.clone(),
        };
        let handle = tokio::spawn(worker.run(YieldPoint::new(results_tx, replies_rx)));

        ExecutionStream {
            results: results_rx,
            replies: replies_tx,
            stdout,
            handle,
            awaiting_reply: false,
            finished: false,
        }
    }
}

struct ExecutionWorker {
    source: String,
    program: Program,
    scope: Scope,
    registry: SourceRegistry,
    filename: String,
    bindings: HashMap<String, Value>,
    stdout: OutputSink,
}

impl ExecutionWorker {
    async fn run(self, yields: YieldPoint) {
        let lines = LineIndex::new(&self.source);
        let mut interpreter = Interpreter::new(self.bindings, yields, self.stdout, lines);

        let result = interpreter.exec_suite(&self.program.statements).await;
        let failed_line = interpreter.current_line();
        let (bindings, yields) = interpreter.into_parts();

        // Bindings persist no matter how the body ended.
        self.scope.update_globals(bindings);

        let results = yields.into_sender();
        match result {
            Ok(_) if !self.program.is_generator => {
                let _ = results.send(Ok(Value::None)).await;
            }
            Ok(_) => {}
            Err(EvalError::Interrupted) => {}
            Err(error) => {
                self.registry.register(&self.filename, &self.source);
                let _ = results
                    .send(Err(ExecutionError {
                        file: self.filename.clone(),
                        line: failed_line,
                        error,
                    }))
                    .await;
            }
        }
    }
}

/// Consumer handle for a running execution.
///
/// Dropping the stream cancels the execution cooperatively at its next
/// suspension point; the snippet's bindings still persist.
pub struct ExecutionStream {
    results: mpsc::Receiver<Result<Value, ExecutionError>>,
    replies: mpsc::Sender<Value>,
    stdout: OutputSink,
    handle: JoinHandle<()>,
    awaiting_reply: bool,
    finished: bool,
}

impl ExecutionStream {
    /// Advance to the next result. Returns `None` once the execution ends.
    pub async fn next(&mut self) -> Option<Result<Value, ExecutionError>> {
        self.step(Value::None).await
    }

    /// Advance like [`next`](Self::next), passing a value back into the
    /// suspended yield expression.
    pub async fn send(&mut self, value: Value) -> Option<Result<Value, ExecutionError>> {
        self.step(value).await
    }

    async fn step(&mut self, reply: Value) -> Option<Result<Value, ExecutionError>> {
        if self.finished {
            return None;
        }

        if self.awaiting_reply {
            self.awaiting_reply = false;
            let _ = self.replies.send(reply).await;
        }

        match self.results.recv().await {
            Some(Ok(value)) => {
                self.awaiting_reply = true;
                Some(Ok(value))
            }
            Some(Err(error)) => {
                self.finished = true;
                Some(Err(error))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Everything the snippet printed so far.
    pub fn stdout(&self) -> String {
        self.stdout.snapshot()
    }

    /// Whether the spawned execution has fully finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
