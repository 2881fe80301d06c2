//! Snippet compilation: parse, validate the supported subset, and rewrite a
//! trailing bare expression into a yield so the REPL echoes its value.

use rustpython_parser::{Parse, ast};

use crate::error::EvalError;

/// A validated, rewritten snippet ready for execution.
pub struct Program {
    pub statements: Vec<ast::Stmt>,
    /// Whether any yield survives after rewriting; decides between generator
    /// and single-result execution.
    pub is_generator: bool,
}

pub fn compile(source: &str) -> Result<Program, EvalError> {
    let mut statements = ast::Suite::parse(source, "<repl>")
        .map_err(|source| EvalError::Syntax(source.to_string()))?;

    check_suite(&statements, false)?;
    rewrite_trailing_expression(&mut statements);
    let is_generator = suite_contains_yield(&statements);

    Ok(Program {
        statements,
        is_generator,
    })
}

/// If the final statement is a bare expression that is not already a yield,
/// wrap it in one. Any other trailing statement is left alone.
fn rewrite_trailing_expression(statements: &mut [ast::Stmt]) {
    let Some(ast::Stmt::Expr(stmt)) = statements.last_mut() else {
        return;
    };

    if matches!(stmt.value.as_ref(), ast::Expr::Yield(_)) {
        return;
    }

    let range = stmt.range;
    let placeholder = ast::Expr::Constant(ast::ExprConstant {
        range,
        value: ast::Constant::None,
        kind: None,
    });
    let value = std::mem::replace(&mut stmt.value, Box::new(placeholder));

    stmt.value = Box::new(ast::Expr::Yield(ast::ExprYield {
        range,
        value: Some(value),
    }));
}

fn suite_contains_yield(statements: &[ast::Stmt]) -> bool {
    statements.iter().any(|stmt| match stmt {
        ast::Stmt::Expr(s) => matches!(s.value.as_ref(), ast::Expr::Yield(_)),
        ast::Stmt::Assign(s) => matches!(s.value.as_ref(), ast::Expr::Yield(_)),
        ast::Stmt::If(s) => suite_contains_yield(&s.body) || suite_contains_yield(&s.orelse),
        ast::Stmt::While(s) => suite_contains_yield(&s.body),
        ast::Stmt::For(s) => suite_contains_yield(&s.body),
        ast::Stmt::Try(s) => {
            suite_contains_yield(&s.body)
                || s.handlers.iter().any(|handler| {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    suite_contains_yield(&handler.body)
                })
        }
        _ => false,
    })
}

fn check_suite(statements: &[ast::Stmt], in_function: bool) -> Result<(), EvalError> {
    for stmt in statements {
        check_stmt(stmt, in_function)?;
    }
    Ok(())
}

fn check_stmt(stmt: &ast::Stmt, in_function: bool) -> Result<(), EvalError> {
    match stmt {
        ast::Stmt::Expr(s) => check_value_position(&s.value, in_function),
        ast::Stmt::Assign(s) => {
            for target in &s.targets {
                check_bind_target(target)?;
            }
            check_value_position(&s.value, in_function)
        }
        ast::Stmt::AugAssign(s) => {
            if !matches!(s.target.as_ref(), ast::Expr::Name(_)) {
                return Err(EvalError::Unsupported(
                    "augmented assignment target".to_owned(),
                ));
            }
            check_expr(&s.value)
        }
        ast::Stmt::If(s) => {
            check_expr(&s.test)?;
            check_suite(&s.body, in_function)?;
            check_suite(&s.orelse, in_function)
        }
        ast::Stmt::While(s) => {
            if !s.orelse.is_empty() {
                return Err(EvalError::Unsupported("while-else".to_owned()));
            }
            check_expr(&s.test)?;
            check_suite(&s.body, in_function)
        }
        ast::Stmt::For(s) => {
            if !s.orelse.is_empty() {
                return Err(EvalError::Unsupported("for-else".to_owned()));
            }
            check_bind_target(&s.target)?;
            check_expr(&s.iter)?;
            check_suite(&s.body, in_function)
        }
        ast::Stmt::Break(_) | ast::Stmt::Continue(_) | ast::Stmt::Pass(_) => Ok(()),
        ast::Stmt::FunctionDef(s) => {
            if !s.decorator_list.is_empty() {
                return Err(EvalError::Unsupported("decorators".to_owned()));
            }
            let args = &s.args;
            if !args.posonlyargs.is_empty()
                || !args.kwonlyargs.is_empty()
                || args.vararg.is_some()
                || args.kwarg.is_some()
                || args.args.iter().any(|arg| arg.default.is_some())
            {
                return Err(EvalError::Unsupported(
                    "only plain positional parameters are supported".to_owned(),
                ));
            }
            check_suite(&s.body, true)
        }
        ast::Stmt::Return(s) => {
            if !in_function {
                return Err(EvalError::Syntax("'return' outside function".to_owned()));
            }
            match &s.value {
                Some(value) => check_expr(value),
                None => Ok(()),
            }
        }
        ast::Stmt::Try(s) => {
            if !s.orelse.is_empty() || !s.finalbody.is_empty() {
                return Err(EvalError::Unsupported("try-else and try-finally".to_owned()));
            }
            check_suite(&s.body, in_function)?;
            for handler in &s.handlers {
                let ast::ExceptHandler::ExceptHandler(handler) = handler;
                check_suite(&handler.body, in_function)?;
            }
            Ok(())
        }
        ast::Stmt::Raise(s) => {
            if let Some(exc) = &s.exc {
                check_expr(exc)?;
            }
            Ok(())
        }
        ast::Stmt::Import(_) | ast::Stmt::ImportFrom(_) => Ok(()),
        ast::Stmt::Delete(s) => {
            for target in &s.targets {
                if !matches!(target, ast::Expr::Name(_)) {
                    return Err(EvalError::Unsupported("del target".to_owned()));
                }
            }
            Ok(())
        }
        other => Err(EvalError::Unsupported(stmt_kind(other).to_owned())),
    }
}

/// Check an expression in a position where a top-level yield is legal.
fn check_value_position(expr: &ast::Expr, in_function: bool) -> Result<(), EvalError> {
    if let ast::Expr::Yield(yield_expr) = expr {
        if in_function {
            return Err(EvalError::Unsupported(
                "'yield' inside def".to_owned(),
            ));
        }
        return match &yield_expr.value {
            Some(inner) => check_expr(inner),
            None => Ok(()),
        };
    }

    check_expr(expr)
}

fn check_bind_target(target: &ast::Expr) -> Result<(), EvalError> {
    match target {
        ast::Expr::Name(_) => Ok(()),
        ast::Expr::Tuple(tuple) => {
            for element in &tuple.elts {
                if !matches!(element, ast::Expr::Name(_)) {
                    return Err(EvalError::Unsupported("assignment target".to_owned()));
                }
            }
            Ok(())
        }
        _ => Err(EvalError::Unsupported("assignment target".to_owned())),
    }
}

fn check_expr(expr: &ast::Expr) -> Result<(), EvalError> {
    match expr {
        ast::Expr::Constant(_) | ast::Expr::Name(_) => Ok(()),
        ast::Expr::BinOp(e) => {
            check_expr(&e.left)?;
            check_expr(&e.right)
        }
        ast::Expr::UnaryOp(e) => check_expr(&e.operand),
        ast::Expr::BoolOp(e) => {
            for value in &e.values {
                check_expr(value)?;
            }
            Ok(())
        }
        ast::Expr::Compare(e) => {
            check_expr(&e.left)?;
            for comparator in &e.comparators {
                check_expr(comparator)?;
            }
            Ok(())
        }
        ast::Expr::IfExp(e) => {
            check_expr(&e.test)?;
            check_expr(&e.body)?;
            check_expr(&e.orelse)
        }
        ast::Expr::Call(e) => {
            if !e.keywords.is_empty() {
                return Err(EvalError::Unsupported("keyword arguments".to_owned()));
            }
            check_expr(&e.func)?;
            for arg in &e.args {
                check_expr(arg)?;
            }
            Ok(())
        }
        ast::Expr::Attribute(e) => check_expr(&e.value),
        ast::Expr::Subscript(e) => {
            check_expr(&e.value)?;
            match e.slice.as_ref() {
                ast::Expr::Slice(slice) => {
                    if slice.step.is_some() {
                        return Err(EvalError::Unsupported("slice step".to_owned()));
                    }
                    if let Some(lower) = &slice.lower {
                        check_expr(lower)?;
                    }
                    if let Some(upper) = &slice.upper {
                        check_expr(upper)?;
                    }
                    Ok(())
                }
                other => check_expr(other),
            }
        }
        ast::Expr::List(e) => {
            for element in &e.elts {
                check_expr(element)?;
            }
            Ok(())
        }
        ast::Expr::Tuple(e) => {
            for element in &e.elts {
                check_expr(element)?;
            }
            Ok(())
        }
        ast::Expr::Dict(e) => {
            for key in &e.keys {
                match key {
                    Some(key) => check_expr(key)?,
                    None => {
                        return Err(EvalError::Unsupported("dict unpacking".to_owned()));
                    }
                }
            }
            for value in &e.values {
                check_expr(value)?;
            }
            Ok(())
        }
        ast::Expr::ListComp(e) => {
            if e.generators.len() != 1 {
                return Err(EvalError::Unsupported(
                    "multiple comprehension generators".to_owned(),
                ));
            }
            let generator = &e.generators[0];
            if generator.is_async {
                return Err(EvalError::Unsupported("async comprehension".to_owned()));
            }
            check_bind_target(&generator.target)?;
            check_expr(&generator.iter)?;
            for if_expr in &generator.ifs {
                check_expr(if_expr)?;
            }
            check_expr(&e.elt)
        }
        ast::Expr::Yield(_) => Err(EvalError::Unsupported(
            "'yield' is only allowed as a statement or assignment value".to_owned(),
        )),
        ast::Expr::JoinedStr(_) => Err(EvalError::Unsupported("f-strings".to_owned())),
        ast::Expr::Lambda(_) => Err(EvalError::Unsupported("lambda".to_owned())),
        other => Err(EvalError::Unsupported(expr_kind(other).to_owned())),
    }
}

fn stmt_kind(stmt: &ast::Stmt) -> &'static str {
    match stmt {
        ast::Stmt::ClassDef(_) => "class definitions",
        ast::Stmt::AsyncFunctionDef(_) => "async def",
        ast::Stmt::With(_) | ast::Stmt::AsyncWith(_) => "with blocks",
        ast::Stmt::Match(_) => "match statements",
        ast::Stmt::Global(_) | ast::Stmt::Nonlocal(_) => "global/nonlocal declarations",
        ast::Stmt::AnnAssign(_) => "annotated assignment",
        ast::Stmt::Assert(_) => "assert statements",
        _ => "this statement",
    }
}

fn expr_kind(expr: &ast::Expr) -> &'static str {
    match expr {
        ast::Expr::Await(_) => "await expressions",
        ast::Expr::NamedExpr(_) => "walrus assignment",
        ast::Expr::GeneratorExp(_) => "generator expressions",
        ast::Expr::SetComp(_) | ast::Expr::DictComp(_) => "set/dict comprehensions",
        ast::Expr::Starred(_) => "starred expressions",
        ast::Expr::YieldFrom(_) => "yield from",
        _ => "this expression",
    }
}
