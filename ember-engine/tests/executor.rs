use ember_engine::{AsyncCodeExecutor, EvalError, Scope, SourceRegistry, Value};

fn executor(source: &str, scope: &Scope, registry: &SourceRegistry) -> AsyncCodeExecutor {
    AsyncCodeExecutor::new(source, scope.clone(), registry).expect("snippet should compile")
}

async fn run_all(source: &str, scope: &Scope, registry: &SourceRegistry) -> Vec<Value> {
    let mut stream = executor(source, scope, registry).stream();
    let mut values = Vec::new();

    while let Some(result) = stream.next().await {
        values.push(result.expect("snippet should not raise"));
    }

    values
}

#[tokio::test]
async fn plain_snippet_yields_a_single_none() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let values = run_all("x = 5", &scope, &registry).await;

    assert_eq!(values, vec![Value::None]);
}

#[tokio::test]
async fn scope_persists_across_submissions() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let first = run_all("x = 5", &scope, &registry).await;
    assert_eq!(first, vec![Value::None]);

    let second = run_all("x + 1", &scope, &registry).await;
    assert_eq!(second, vec![Value::Int(6)]);
}

#[tokio::test]
async fn trailing_expression_is_echoed() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let values = run_all("1 + 2", &scope, &registry).await;

    assert_eq!(values, vec![Value::Int(3)]);
}

#[tokio::test]
async fn generator_yields_each_value_lazily() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let values = run_all("yield 1\nyield 2\nyield 3", &scope, &registry).await;

    assert_eq!(values, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[tokio::test]
async fn yields_inside_a_loop_stream_out() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let values = run_all("for i in range(4):\n    yield i * i", &scope, &registry).await;

    assert_eq!(
        values,
        vec![Value::Int(0), Value::Int(1), Value::Int(4), Value::Int(9)]
    );
}

#[tokio::test]
async fn values_delivered_before_an_error_still_arrive() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let source = "n = 0\nwhile True:\n    n = n + 1\n    if n > 2:\n        raise ValueError('boom')\n    yield n";
    let mut stream = executor(source, &scope, &registry).stream();

    assert_eq!(stream.next().await.unwrap().unwrap(), Value::Int(1));
    assert_eq!(stream.next().await.unwrap().unwrap(), Value::Int(2));

    let error = stream.next().await.unwrap().unwrap_err();
    assert_eq!(
        error.error,
        EvalError::Raised {
            kind: "ValueError".to_owned(),
            message: "boom".to_owned(),
        }
    );

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn bindings_persist_even_when_the_snippet_raises() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let mut stream = executor("x = 41\nraise RuntimeError('mid-body')", &scope, &registry).stream();
    let result = stream.next().await.unwrap();
    assert!(result.is_err());
    while stream.next().await.is_some() {}

    let values = run_all("x + 1", &scope, &registry).await;
    assert_eq!(values, vec![Value::Int(42)]);
}

#[tokio::test]
async fn send_drives_two_way_communication() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let mut stream = executor("a = yield 1\nyield a + 10", &scope, &registry).stream();

    assert_eq!(stream.next().await.unwrap().unwrap(), Value::Int(1));
    assert_eq!(
        stream.send(Value::Int(5)).await.unwrap().unwrap(),
        Value::Int(15)
    );
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn tracebacks_reference_the_submitted_source() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let mut stream = executor("x = 5\nx + y", &scope, &registry).stream();
    let error = stream.next().await.unwrap().unwrap_err();

    assert_eq!(error.line, 2);
    let traceback = error.traceback(&registry);
    assert!(traceback.contains("line 2"), "traceback: {traceback}");
    assert!(traceback.contains("x + y"), "traceback: {traceback}");
    assert!(
        traceback.contains("NameError: name 'y' is not defined"),
        "traceback: {traceback}"
    );
}

#[tokio::test]
async fn compile_errors_surface_before_streaming() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let error = AsyncCodeExecutor::new("def broken(:", scope, &registry).unwrap_err();

    assert!(matches!(error.error, EvalError::Syntax(_)));
}

#[tokio::test]
async fn injected_args_are_visible_and_persist() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let mut stream = executor("channel_id + 1", &scope, &registry)
        .arg("channel_id", Value::Int(41))
        .stream();

    assert_eq!(stream.next().await.unwrap().unwrap(), Value::Int(42));
    while stream.next().await.is_some() {}

    // injected bindings merge back into the scope like any other variable
    assert_eq!(scope.get("channel_id"), Some(Value::Int(41)));
}

#[tokio::test]
async fn print_output_is_captured_separately() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let mut stream = executor("print('hello')\nprint('world')", &scope, &registry).stream();
    while stream.next().await.is_some() {}

    assert_eq!(stream.stdout(), "hello\nworld\n");
}

#[tokio::test]
async fn dropping_the_stream_cancels_but_keeps_bindings() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let mut stream = executor("x = 7\nyield 1\nx = 99\nyield 2", &scope, &registry).stream();
    assert_eq!(stream.next().await.unwrap().unwrap(), Value::Int(1));
    drop(stream);

    // give the cancelled task a moment to merge and exit
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(scope.get("x"), Some(Value::Int(7)));
}

#[tokio::test]
async fn defined_functions_are_callable_and_persist() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let values = run_all(
        "def double(n):\n    return n * 2\ndouble(21)",
        &scope,
        &registry,
    )
    .await;
    assert_eq!(values, vec![Value::Int(42)]);

    let again = run_all("double(5)", &scope, &registry).await;
    assert_eq!(again, vec![Value::Int(10)]);
}

#[tokio::test]
async fn imports_bind_preloaded_modules() {
    let scope = Scope::new();
    let registry = SourceRegistry::new();

    let values = run_all("from math import sqrt\nsqrt(16.0)", &scope, &registry).await;
    assert_eq!(values, vec![Value::Float(4.0)]);

    let error_values = executor("import os", &scope, &registry)
        .stream()
        .next()
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(
        error_values.error,
        EvalError::Raised {
            kind: "ModuleNotFoundError".to_owned(),
            message: "No module named 'os'".to_owned(),
        }
    );
}
