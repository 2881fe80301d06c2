//! Tree-walking evaluator for the snippet subset.
//!
//! Statement execution is async so a top-level `yield` can suspend anywhere
//! in control flow; recursion is boxed to keep the futures finite. Expression
//! evaluation never suspends.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use rustpython_parser::ast::{self, Ranged};
use tokio::sync::mpsc;

use crate::builtins::{self, OutputSink};
use crate::error::{EvalError, ExecutionError};
use crate::trace::LineIndex;
use crate::value::{FuncDef, Value, compare_values, values_equal};

type EvalResult<T> = Result<T, EvalError>;
type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Control flow produced by statement execution.
pub(crate) enum Flow {
    Continue,
    Break,
    ContinueLoop,
    Return(Value),
}

/// The suspension channel pair for one execution: yielded values flow out,
/// consumer-sent values flow back in.
pub(crate) struct YieldPoint {
    results: mpsc::Sender<Result<Value, ExecutionError>>,
    replies: mpsc::Receiver<Value>,
}

impl YieldPoint {
    pub(crate) fn new(
        results: mpsc::Sender<Result<Value, ExecutionError>>,
        replies: mpsc::Receiver<Value>,
    ) -> Self {
        Self { results, replies }
    }

    /// Surface one value and suspend until the consumer replies or goes away.
    async fn emit(&mut self, value: Value) -> EvalResult<Value> {
        if self.results.send(Ok(value)).await.is_err() {
            return Err(EvalError::Interrupted);
        }

        self.replies.recv().await.ok_or(EvalError::Interrupted)
    }

    pub(crate) fn into_sender(self) -> mpsc::Sender<Result<Value, ExecutionError>> {
        self.results
    }
}

/// Flat global bindings plus a call-frame stack for `def` bodies.
pub(crate) struct Env {
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
}

impl Env {
    fn new(globals: HashMap<String, Value>) -> Self {
        Self {
            globals,
            frames: Vec::new(),
        }
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some(frame) = self.frames.last()
            && let Some(value) = frame.get(name)
        {
            return Some(value.clone());
        }

        self.globals.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.to_owned(), value);
            }
            None => {
                self.globals.insert(name.to_owned(), value);
            }
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        if let Some(frame) = self.frames.last_mut()
            && frame.remove(name).is_some()
        {
            return true;
        }

        self.globals.remove(name).is_some()
    }

    fn push_frame(&mut self, frame: HashMap<String, Value>) {
        self.frames.push(frame);
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
    }

    fn into_globals(self) -> HashMap<String, Value> {
        self.globals
    }
}

pub(crate) struct Interpreter {
    env: Env,
    yields: YieldPoint,
    stdout: OutputSink,
    lines: LineIndex,
    current_line: usize,
}

impl Interpreter {
    pub(crate) fn new(
        bindings: HashMap<String, Value>,
        yields: YieldPoint,
        stdout: OutputSink,
        lines: LineIndex,
    ) -> Self {
        Self {
            env: Env::new(bindings),
            yields,
            stdout,
            lines,
            current_line: 0,
        }
    }

    pub(crate) fn current_line(&self) -> usize {
        self.current_line
    }

    pub(crate) fn into_parts(self) -> (HashMap<String, Value>, YieldPoint) {
        (self.env.into_globals(), self.yields)
    }

    pub(crate) fn exec_suite<'a>(&'a mut self, stmts: &'a [ast::Stmt]) -> BoxFut<'a, EvalResult<Flow>> {
        Box::pin(async move {
            for stmt in stmts {
                match self.exec_stmt(stmt).await? {
                    Flow::Continue => {}
                    other => return Ok(other),
                }
            }
            Ok(Flow::Continue)
        })
    }

    fn exec_stmt<'a>(&'a mut self, stmt: &'a ast::Stmt) -> BoxFut<'a, EvalResult<Flow>> {
        Box::pin(async move {
            self.current_line = self.lines.line_of(u32::from(stmt.range().start()) as usize);

            match stmt {
                ast::Stmt::Expr(s) => {
                    match s.value.as_ref() {
                        ast::Expr::Yield(yield_expr) => {
                            let value = self.eval_yield_operand(yield_expr).await?;
                            let _sent = self.yields.emit(value).await?;
                        }
                        other => {
                            self.eval_expr(other).await?;
                        }
                    }
                    Ok(Flow::Continue)
                }
                ast::Stmt::Assign(s) => {
                    let value = match s.value.as_ref() {
                        ast::Expr::Yield(yield_expr) => {
                            let operand = self.eval_yield_operand(yield_expr).await?;
                            self.yields.emit(operand).await?
                        }
                        other => self.eval_expr(other).await?,
                    };

                    for target in &s.targets {
                        self.bind_target(target, value.clone())?;
                    }
                    Ok(Flow::Continue)
                }
                ast::Stmt::AugAssign(s) => {
                    let ast::Expr::Name(name) = s.target.as_ref() else {
                        return Err(EvalError::Unsupported(
                            "augmented assignment target".to_owned(),
                        ));
                    };

                    let left = self
                        .env
                        .get(name.id.as_str())
                        .ok_or_else(|| EvalError::Name(name.id.to_string()))?;
                    let right = self.eval_expr(&s.value).await?;
                    let result = binary_op(s.op, left, right)?;

                    self.env.set(name.id.as_str(), result);
                    Ok(Flow::Continue)
                }
                ast::Stmt::If(s) => {
                    if self.eval_expr(&s.test).await?.truthy() {
                        self.exec_suite(&s.body).await
                    } else {
                        self.exec_suite(&s.orelse).await
                    }
                }
                ast::Stmt::While(s) => {
                    while self.eval_expr(&s.test).await?.truthy() {
                        match self.exec_suite(&s.body).await? {
                            Flow::Continue | Flow::ContinueLoop => {}
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                        }
                    }
                    Ok(Flow::Continue)
                }
                ast::Stmt::For(s) => {
                    let iterable = self.eval_expr(&s.iter).await?;
                    for item in iterate(iterable)? {
                        self.bind_target(&s.target, item)?;
                        match self.exec_suite(&s.body).await? {
                            Flow::Continue | Flow::ContinueLoop => {}
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                        }
                    }
                    Ok(Flow::Continue)
                }
                ast::Stmt::Break(_) => Ok(Flow::Break),
                ast::Stmt::Continue(_) => Ok(Flow::ContinueLoop),
                ast::Stmt::Pass(_) => Ok(Flow::Continue),
                ast::Stmt::FunctionDef(s) => {
                    let params = s
                        .args
                        .args
                        .iter()
                        .map(|arg| arg.def.arg.to_string())
                        .collect();
                    let func = FuncDef {
                        name: s.name.to_string(),
                        params,
                        body: s.body.clone(),
                    };

                    self.env.set(s.name.as_str(), Value::Func(func));
                    Ok(Flow::Continue)
                }
                ast::Stmt::Return(s) => {
                    let value = match &s.value {
                        Some(expr) => self.eval_expr(expr).await?,
                        None => Value::None,
                    };
                    Ok(Flow::Return(value))
                }
                ast::Stmt::Try(s) => match self.exec_suite(&s.body).await {
                    Ok(flow) => Ok(flow),
                    Err(EvalError::Interrupted) => Err(EvalError::Interrupted),
                    Err(error) => match s.handlers.first() {
                        Some(ast::ExceptHandler::ExceptHandler(handler)) => {
                            self.exec_suite(&handler.body).await
                        }
                        None => Err(error),
                    },
                },
                ast::Stmt::Raise(s) => Err(self.build_raise(s).await?),
                ast::Stmt::Import(s) => {
                    for alias in &s.names {
                        let module_name = alias.name.as_str();
                        let Some(value) = builtins::module(module_name) else {
                            return Err(EvalError::Raised {
                                kind: "ModuleNotFoundError".to_owned(),
                                message: format!("No module named '{module_name}'"),
                            });
                        };

                        let bind_name =
                            alias.asname.as_ref().map_or(module_name, |name| name.as_str());
                        self.env.set(bind_name, value);
                    }
                    Ok(Flow::Continue)
                }
                ast::Stmt::ImportFrom(s) => {
                    if s.level.is_some_and(|level| level.to_u32() != 0) {
                        return Err(EvalError::Unsupported("relative imports".to_owned()));
                    }
                    let Some(module) = &s.module else {
                        return Err(EvalError::Unsupported("relative imports".to_owned()));
                    };
                    let module_name = module.as_str();

                    if builtins::module(module_name).is_none() {
                        return Err(EvalError::Raised {
                            kind: "ModuleNotFoundError".to_owned(),
                            message: format!("No module named '{module_name}'"),
                        });
                    }

                    for alias in &s.names {
                        let name = alias.name.as_str();
                        if name == "*" {
                            return Err(EvalError::Unsupported("wildcard imports".to_owned()));
                        }

                        let Some(value) = builtins::module_attr(module_name, name) else {
                            return Err(EvalError::Raised {
                                kind: "ImportError".to_owned(),
                                message: format!(
                                    "cannot import name '{name}' from '{module_name}'"
                                ),
                            });
                        };

                        let bind_name = alias.asname.as_ref().map_or(name, |n| n.as_str());
                        self.env.set(bind_name, value);
                    }
                    Ok(Flow::Continue)
                }
                ast::Stmt::Delete(s) => {
                    for target in &s.targets {
                        let ast::Expr::Name(name) = target else {
                            return Err(EvalError::Unsupported("del target".to_owned()));
                        };
                        if !self.env.remove(name.id.as_str()) {
                            return Err(EvalError::Name(name.id.to_string()));
                        }
                    }
                    Ok(Flow::Continue)
                }
                _ => Err(EvalError::Unsupported("this statement".to_owned())),
            }
        })
    }

    async fn eval_yield_operand(&mut self, yield_expr: &ast::ExprYield) -> EvalResult<Value> {
        match &yield_expr.value {
            Some(inner) => self.eval_expr(inner).await,
            None => Ok(Value::None),
        }
    }

    async fn build_raise(&mut self, raise: &ast::StmtRaise) -> EvalResult<EvalError> {
        let Some(exc) = &raise.exc else {
            return Ok(EvalError::Raised {
                kind: "RuntimeError".to_owned(),
                message: "No active exception to reraise".to_owned(),
            });
        };

        match exc.as_ref() {
            ast::Expr::Name(name) => Ok(EvalError::Raised {
                kind: name.id.to_string(),
                message: String::new(),
            }),
            ast::Expr::Call(call) => {
                let ast::Expr::Name(name) = call.func.as_ref() else {
                    return Err(EvalError::Unsupported("raise expression".to_owned()));
                };

                let message = match call.args.first() {
                    Some(arg) => self.eval_expr(arg).await?.display_str(),
                    None => String::new(),
                };

                Ok(EvalError::Raised {
                    kind: name.id.to_string(),
                    message,
                })
            }
            _ => Err(EvalError::Unsupported("raise expression".to_owned())),
        }
    }

    fn bind_target(&mut self, target: &ast::Expr, value: Value) -> EvalResult<()> {
        match target {
            ast::Expr::Name(name) => {
                self.env.set(name.id.as_str(), value);
                Ok(())
            }
            ast::Expr::Tuple(tuple) => {
                let Value::List(items) = value else {
                    return Err(EvalError::Type(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_name()
                    )));
                };

                if items.len() != tuple.elts.len() {
                    return Err(EvalError::Value(format!(
                        "not enough values to unpack (expected {}, got {})",
                        tuple.elts.len(),
                        items.len()
                    )));
                }

                for (element, item) in tuple.elts.iter().zip(items) {
                    self.bind_target(element, item)?;
                }
                Ok(())
            }
            _ => Err(EvalError::Unsupported("assignment target".to_owned())),
        }
    }

    fn eval_expr<'a>(&'a mut self, expr: &'a ast::Expr) -> BoxFut<'a, EvalResult<Value>> {
        Box::pin(async move {
            match expr {
                ast::Expr::Constant(c) => constant_value(&c.value),
                ast::Expr::Name(n) => self
                    .env
                    .get(n.id.as_str())
                    .ok_or_else(|| EvalError::Name(n.id.to_string())),
                ast::Expr::BinOp(e) => {
                    let left = self.eval_expr(&e.left).await?;
                    let right = self.eval_expr(&e.right).await?;
                    binary_op(e.op, left, right)
                }
                ast::Expr::UnaryOp(e) => {
                    let operand = self.eval_expr(&e.operand).await?;
                    unary_op(e.op, operand)
                }
                ast::Expr::BoolOp(e) => {
                    // Python semantics: the deciding operand is the result
                    let mut last = Value::Bool(matches!(e.op, ast::BoolOp::And));
                    for operand in &e.values {
                        last = self.eval_expr(operand).await?;
                        match e.op {
                            ast::BoolOp::And if !last.truthy() => return Ok(last),
                            ast::BoolOp::Or if last.truthy() => return Ok(last),
                            _ => {}
                        }
                    }
                    Ok(last)
                }
                ast::Expr::Compare(e) => {
                    let mut left = self.eval_expr(&e.left).await?;
                    for (op, right_expr) in e.ops.iter().zip(&e.comparators) {
                        let right = self.eval_expr(right_expr).await?;
                        if !compare_once(*op, &left, &right)? {
                            return Ok(Value::Bool(false));
                        }
                        left = right;
                    }
                    Ok(Value::Bool(true))
                }
                ast::Expr::IfExp(e) => {
                    if self.eval_expr(&e.test).await?.truthy() {
                        self.eval_expr(&e.body).await
                    } else {
                        self.eval_expr(&e.orelse).await
                    }
                }
                ast::Expr::Call(e) => self.eval_call(e).await,
                ast::Expr::Attribute(e) => {
                    let base = self.eval_expr(&e.value).await?;
                    match base {
                        Value::Module(name) => builtins::module_attr(name, e.attr.as_str())
                            .ok_or_else(|| EvalError::Raised {
                                kind: "AttributeError".to_owned(),
                                message: format!(
                                    "module '{name}' has no attribute '{}'",
                                    e.attr.as_str()
                                ),
                            }),
                        other => Err(EvalError::Raised {
                            kind: "AttributeError".to_owned(),
                            message: format!(
                                "'{}' object has no attribute '{}'",
                                other.type_name(),
                                e.attr.as_str()
                            ),
                        }),
                    }
                }
                ast::Expr::Subscript(e) => {
                    let base = self.eval_expr(&e.value).await?;
                    match e.slice.as_ref() {
                        ast::Expr::Slice(slice) => {
                            let lower = match &slice.lower {
                                Some(expr) => Some(as_index(self.eval_expr(expr).await?)?),
                                None => None,
                            };
                            let upper = match &slice.upper {
                                Some(expr) => Some(as_index(self.eval_expr(expr).await?)?),
                                None => None,
                            };
                            slice_value(base, lower, upper)
                        }
                        index_expr => {
                            let index = self.eval_expr(index_expr).await?;
                            subscript_value(base, index)
                        }
                    }
                }
                ast::Expr::List(e) => {
                    let mut items = Vec::with_capacity(e.elts.len());
                    for element in &e.elts {
                        items.push(self.eval_expr(element).await?);
                    }
                    Ok(Value::List(items))
                }
                ast::Expr::Tuple(e) => {
                    let mut items = Vec::with_capacity(e.elts.len());
                    for element in &e.elts {
                        items.push(self.eval_expr(element).await?);
                    }
                    Ok(Value::List(items))
                }
                ast::Expr::Dict(e) => {
                    let mut map = std::collections::BTreeMap::new();
                    for (key, value) in e.keys.iter().zip(&e.values) {
                        let Some(key_expr) = key else {
                            return Err(EvalError::Unsupported("dict unpacking".to_owned()));
                        };
                        let key = match self.eval_expr(key_expr).await? {
                            Value::Str(key) => key,
                            other => {
                                return Err(EvalError::Type(format!(
                                    "dict keys must be strings, not '{}'",
                                    other.type_name()
                                )));
                            }
                        };
                        map.insert(key, self.eval_expr(value).await?);
                    }
                    Ok(Value::Dict(map))
                }
                ast::Expr::ListComp(e) => self.eval_listcomp(e).await,
                _ => Err(EvalError::Unsupported("this expression".to_owned())),
            }
        })
    }

    async fn eval_listcomp(&mut self, comp: &ast::ExprListComp) -> EvalResult<Value> {
        let generator = &comp.generators[0];
        let iterable = self.eval_expr(&generator.iter).await?;
        let items = iterate(iterable)?;

        // the loop variable must not leak out of the comprehension
        let saved: Vec<(String, Option<Value>)> = target_names(&generator.target)
            .into_iter()
            .map(|name| {
                let previous = self.env.get(&name);
                (name, previous)
            })
            .collect();

        let mut out = Vec::new();
        let mut failure = None;

        'items: for item in items {
            if let Err(err) = self.bind_target(&generator.target, item) {
                failure = Some(err);
                break;
            }

            for if_expr in &generator.ifs {
                match self.eval_expr(if_expr).await {
                    Ok(condition) if !condition.truthy() => continue 'items,
                    Ok(_) => {}
                    Err(err) => {
                        failure = Some(err);
                        break 'items;
                    }
                }
            }

            match self.eval_expr(&comp.elt).await {
                Ok(value) => out.push(value),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        for (name, previous) in saved {
            match previous {
                Some(value) => self.env.set(&name, value),
                None => {
                    self.env.remove(&name);
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(Value::List(out)),
        }
    }

    async fn eval_call(&mut self, call: &ast::ExprCall) -> EvalResult<Value> {
        if let ast::Expr::Attribute(attr) = call.func.as_ref() {
            return self.eval_method_call(attr, &call.args).await;
        }

        let callee = self.eval_expr(&call.func).await?;
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval_expr(arg).await?);
        }

        self.apply(callee, args).await
    }

    async fn apply(&mut self, callee: Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Builtin(builtin) => builtins::call(builtin, args, &self.stdout),
            Value::Func(func) => {
                if args.len() != func.params.len() {
                    return Err(EvalError::Type(format!(
                        "{}() takes {} positional argument(s) but {} were given",
                        func.name,
                        func.params.len(),
                        args.len()
                    )));
                }

                let mut frame = HashMap::new();
                for (param, arg) in func.params.iter().zip(args) {
                    frame.insert(param.clone(), arg);
                }

                self.env.push_frame(frame);
                let result = self.exec_suite(&func.body).await;
                self.env.pop_frame();

                match result? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::None),
                }
            }
            other => Err(EvalError::Type(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    async fn eval_method_call(
        &mut self,
        attr: &ast::ExprAttribute,
        arg_exprs: &[ast::Expr],
    ) -> EvalResult<Value> {
        // in-place list append on a named target
        if attr.attr.as_str() == "append"
            && let ast::Expr::Name(name) = attr.value.as_ref()
            && matches!(self.env.get(name.id.as_str()), Some(Value::List(_)))
        {
            if arg_exprs.len() != 1 {
                return Err(EvalError::Type(
                    "append() takes exactly one argument".to_owned(),
                ));
            }

            let item = self.eval_expr(&arg_exprs[0]).await?;
            let Some(Value::List(mut items)) = self.env.get(name.id.as_str()) else {
                return Err(EvalError::Name(name.id.to_string()));
            };
            items.push(item);
            self.env.set(name.id.as_str(), Value::List(items));
            return Ok(Value::None);
        }

        let base = self.eval_expr(&attr.value).await?;
        let mut args = Vec::with_capacity(arg_exprs.len());
        for arg in arg_exprs {
            args.push(self.eval_expr(arg).await?);
        }

        if let Value::Module(module) = base {
            let func = builtins::module_attr(module, attr.attr.as_str()).ok_or_else(|| {
                EvalError::Raised {
                    kind: "AttributeError".to_owned(),
                    message: format!("module '{module}' has no attribute '{}'", attr.attr.as_str()),
                }
            })?;
            return self.apply(func, args).await;
        }

        call_method(base, attr.attr.as_str(), args)
    }
}

fn target_names(target: &ast::Expr) -> Vec<String> {
    match target {
        ast::Expr::Name(name) => vec![name.id.to_string()],
        ast::Expr::Tuple(tuple) => tuple
            .elts
            .iter()
            .filter_map(|element| match element {
                ast::Expr::Name(name) => Some(name.id.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn constant_value(constant: &ast::Constant) -> EvalResult<Value> {
    match constant {
        ast::Constant::None => Ok(Value::None),
        ast::Constant::Bool(b) => Ok(Value::Bool(*b)),
        ast::Constant::Str(s) => Ok(Value::Str(s.clone())),
        ast::Constant::Float(f) => Ok(Value::Float(*f)),
        ast::Constant::Int(i) => i
            .to_string()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::Value("integer literal out of range".to_owned())),
        _ => Err(EvalError::Unsupported("this literal".to_owned())),
    }
}

fn iterate(value: Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::Str(s) => Ok(s.chars().map(|ch| Value::Str(ch.to_string())).collect()),
        Value::List(items) => Ok(items),
        Value::Dict(map) => Ok(map.keys().cloned().map(Value::Str).collect()),
        other => Err(EvalError::Type(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn binary_op(op: ast::Operator, left: Value, right: Value) -> EvalResult<Value> {
    use ast::Operator;

    let type_error = |symbol: &str, left: &Value, right: &Value| {
        EvalError::Type(format!(
            "unsupported operand type(s) for {symbol}: '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))
    };

    match op {
        Operator::Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(type_error("+", &left, &right)),
            },
        },
        Operator::Sub => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a - b)),
                _ => Err(type_error("-", &left, &right)),
            },
        },
        Operator::Mult => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                Ok(Value::Str(s.repeat(n.max(0) as usize)))
            }
            (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                let mut out = Vec::new();
                for _ in 0..n.max(0) {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::List(out))
            }
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a * b)),
                _ => Err(type_error("*", &left, &right)),
            },
        },
        Operator::Div => match (left.as_f64(), right.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => {
                Err(EvalError::ZeroDivision("division by zero".to_owned()))
            }
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Err(type_error("/", &left, &right)),
        },
        Operator::FloorDiv => match (left, right) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::ZeroDivision(
                "integer division or modulo by zero".to_owned(),
            )),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.div_euclid(b))),
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(_), Some(b)) if b == 0.0 => {
                    Err(EvalError::ZeroDivision("float floor division by zero".to_owned()))
                }
                (Some(a), Some(b)) => Ok(Value::Float((a / b).floor())),
                _ => Err(type_error("//", &left, &right)),
            },
        },
        Operator::Mod => match (left, right) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::ZeroDivision(
                "integer division or modulo by zero".to_owned(),
            )),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(((a % b) + b) % b)),
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(_), Some(b)) if b == 0.0 => {
                    Err(EvalError::ZeroDivision("float modulo".to_owned()))
                }
                (Some(a), Some(b)) => Ok(Value::Float(a - b * (a / b).floor())),
                _ => Err(type_error("%", &left, &right)),
            },
        },
        Operator::Pow => match (left, right) {
            (Value::Int(a), Value::Int(b)) if (0..=u32::MAX as i64).contains(&b) => a
                .checked_pow(b as u32)
                .map(Value::Int)
                .ok_or_else(|| EvalError::Value("integer overflow in **".to_owned())),
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a.powf(b))),
                _ => Err(type_error("**", &left, &right)),
            },
        },
        Operator::BitOr => int_bitop(left, right, "|", |a, b| a | b),
        Operator::BitAnd => int_bitop(left, right, "&", |a, b| a & b),
        Operator::BitXor => int_bitop(left, right, "^", |a, b| a ^ b),
        _ => Err(EvalError::Unsupported("this operator".to_owned())),
    }
}

fn int_bitop(
    left: Value,
    right: Value,
    symbol: &str,
    apply: fn(i64, i64) -> i64,
) -> EvalResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(apply(a, b))),
        (left, right) => Err(EvalError::Type(format!(
            "unsupported operand type(s) for {symbol}: '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn unary_op(op: ast::UnaryOp, operand: Value) -> EvalResult<Value> {
    match op {
        ast::UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        ast::UnaryOp::USub => match operand {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(EvalError::Type(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
        ast::UnaryOp::UAdd => match operand {
            Value::Int(_) | Value::Float(_) => Ok(operand),
            other => Err(EvalError::Type(format!(
                "bad operand type for unary +: '{}'",
                other.type_name()
            ))),
        },
        ast::UnaryOp::Invert => match operand {
            Value::Int(i) => Ok(Value::Int(!i)),
            other => Err(EvalError::Type(format!(
                "bad operand type for unary ~: '{}'",
                other.type_name()
            ))),
        },
    }
}

fn compare_once(op: ast::CmpOp, left: &Value, right: &Value) -> EvalResult<bool> {
    use ast::CmpOp;

    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::NotEq => Ok(!values_equal(left, right)),
        CmpOp::Is => Ok(is_same(left, right)),
        CmpOp::IsNot => Ok(!is_same(left, right)),
        CmpOp::In => contains(left, right),
        CmpOp::NotIn => contains(left, right).map(|found| !found),
        CmpOp::Lt => Ok(compare_values(left, right)? == std::cmp::Ordering::Less),
        CmpOp::LtE => Ok(compare_values(left, right)? != std::cmp::Ordering::Greater),
        CmpOp::Gt => Ok(compare_values(left, right)? == std::cmp::Ordering::Greater),
        CmpOp::GtE => Ok(compare_values(left, right)? != std::cmp::Ordering::Less),
    }
}

fn is_same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn contains(needle: &Value, haystack: &Value) -> EvalResult<bool> {
    match haystack {
        Value::Str(text) => match needle {
            Value::Str(part) => Ok(text.contains(part.as_str())),
            other => Err(EvalError::Type(format!(
                "'in <string>' requires string as left operand, not '{}'",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
        Value::Dict(map) => match needle {
            Value::Str(key) => Ok(map.contains_key(key)),
            _ => Ok(false),
        },
        other => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn as_index(value: Value) -> EvalResult<i64> {
    match value {
        Value::Int(i) => Ok(i),
        other => Err(EvalError::Type(format!(
            "indices must be integers, not '{}'",
            other.type_name()
        ))),
    }
}

fn subscript_value(base: Value, index: Value) -> EvalResult<Value> {
    match base {
        Value::List(items) => {
            let position = resolve_index(items.len(), as_index(index)?)
                .ok_or_else(|| EvalError::Index("list index out of range".to_owned()))?;
            Ok(items[position].clone())
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let position = resolve_index(chars.len(), as_index(index)?)
                .ok_or_else(|| EvalError::Index("string index out of range".to_owned()))?;
            Ok(Value::Str(chars[position].to_string()))
        }
        Value::Dict(map) => match index {
            Value::Str(key) => map
                .get(&key)
                .cloned()
                .ok_or_else(|| EvalError::Key(format!("'{key}'"))),
            other => Err(EvalError::Key(other.repr_str())),
        },
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let length = len as i64;
    let resolved = if index < 0 { length + index } else { index };

    (0..length).contains(&resolved).then_some(resolved as usize)
}

fn slice_value(base: Value, lower: Option<i64>, upper: Option<i64>) -> EvalResult<Value> {
    match base {
        Value::List(items) => {
            let (start, end) = slice_bounds(items.len(), lower, upper);
            Ok(Value::List(items[start..end].to_vec()))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let (start, end) = slice_bounds(chars.len(), lower, upper);
            Ok(Value::Str(chars[start..end].iter().collect()))
        }
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice_bounds(len: usize, lower: Option<i64>, upper: Option<i64>) -> (usize, usize) {
    let length = len as i64;
    let resolve = |bound: i64| {
        if bound < 0 {
            (length + bound).clamp(0, length)
        } else {
            bound.clamp(0, length)
        }
    };

    let start = lower.map_or(0, resolve) as usize;
    let end = upper.map_or(length, resolve) as usize;

    (start.min(len), end.max(start).min(len))
}

fn call_method(base: Value, method: &str, args: Vec<Value>) -> EvalResult<Value> {
    let attribute_error = |base: &Value| EvalError::Raised {
        kind: "AttributeError".to_owned(),
        message: format!("'{}' object has no attribute '{method}'", base.type_name()),
    };

    match (&base, method) {
        (Value::Str(s), "upper") => no_args(method, &args).map(|()| Value::Str(s.to_uppercase())),
        (Value::Str(s), "lower") => no_args(method, &args).map(|()| Value::Str(s.to_lowercase())),
        (Value::Str(s), "strip") => no_args(method, &args).map(|()| Value::Str(s.trim().to_owned())),
        (Value::Str(s), "split") => match args.as_slice() {
            [] => Ok(Value::List(
                s.split_whitespace()
                    .map(|part| Value::Str(part.to_owned()))
                    .collect(),
            )),
            [Value::Str(sep)] => Ok(Value::List(
                s.split(sep.as_str())
                    .map(|part| Value::Str(part.to_owned()))
                    .collect(),
            )),
            _ => Err(EvalError::Type("split() expects an optional string separator".to_owned())),
        },
        (Value::Str(sep), "join") => match args.as_slice() {
            [Value::List(items)] => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Str(part) => parts.push(part.clone()),
                        other => {
                            return Err(EvalError::Type(format!(
                                "sequence item: expected str instance, '{}' found",
                                other.type_name()
                            )));
                        }
                    }
                }
                Ok(Value::Str(parts.join(sep)))
            }
            _ => Err(EvalError::Type("join() expects a list of strings".to_owned())),
        },
        (Value::Str(s), "replace") => match args.as_slice() {
            [Value::Str(from), Value::Str(to)] => {
                Ok(Value::Str(s.replace(from.as_str(), to.as_str())))
            }
            _ => Err(EvalError::Type("replace() expects two strings".to_owned())),
        },
        (Value::Str(s), "startswith") => match args.as_slice() {
            [Value::Str(part)] => Ok(Value::Bool(s.starts_with(part.as_str()))),
            _ => Err(EvalError::Type("startswith() expects a string".to_owned())),
        },
        (Value::Str(s), "endswith") => match args.as_slice() {
            [Value::Str(part)] => Ok(Value::Bool(s.ends_with(part.as_str()))),
            _ => Err(EvalError::Type("endswith() expects a string".to_owned())),
        },
        (Value::Dict(map), "keys") => {
            no_args(method, &args).map(|()| Value::List(map.keys().cloned().map(Value::Str).collect()))
        }
        (Value::Dict(map), "values") => {
            no_args(method, &args).map(|()| Value::List(map.values().cloned().collect()))
        }
        (Value::Dict(map), "get") => match args.as_slice() {
            [Value::Str(key)] => Ok(map.get(key).cloned().unwrap_or(Value::None)),
            [Value::Str(key), default] => Ok(map.get(key).cloned().unwrap_or_else(|| default.clone())),
            _ => Err(EvalError::Type("get() expects a string key".to_owned())),
        },
        _ => Err(attribute_error(&base)),
    }
}

fn no_args(method: &str, args: &[Value]) -> EvalResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(EvalError::Type(format!(
            "{method}() takes no arguments ({} given)",
            args.len()
        )))
    }
}
