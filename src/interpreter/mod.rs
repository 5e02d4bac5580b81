use std::collections::HashMap;

use crate::ast::*;
use crate::host::Host;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Nil,
    List(Vec<Value>),
    /// A host-namespace function referenced by name.
    Builtin(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::List(_) => "list",
            Value::Builtin(_) => "function",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => {
                if *n == (*n as i64) as f64 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Builtin(name) => write!(f, "<function {}>", name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Runtime error: {message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(msg: impl Into<String>) -> Self {
        RuntimeError { message: msg.into() }
    }
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// The evaluation environment: an ordered chain of variable scopes consulted
/// innermost-first, then the host namespace.
pub struct Env<'h> {
    scopes: Vec<HashMap<String, Value>>,
    host: &'h mut Host,
}

impl<'h> Env<'h> {
    pub fn new(host: &'h mut Host) -> Self {
        Env {
            scopes: vec![HashMap::new()],
            host,
        }
    }

    fn set(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(val) = scope.get(name) {
                return Ok(val.clone());
            }
        }
        if self.host.contains(name) {
            return Ok(Value::Builtin(name.to_string()));
        }
        Err(RuntimeError::new(format!("undefined name: {}", name)))
    }
}

/// Execute a statement sequence for effect.
pub fn exec_stmts(env: &mut Env, stmts: &[Stmt]) -> Result<()> {
    for stmt in stmts {
        exec_stmt(env, stmt)?;
    }
    Ok(())
}

fn exec_stmt(env: &mut Env, stmt: &Stmt) -> Result<()> {
    match stmt {
        Stmt::Assign { name, value } => {
            let val = eval_expr(env, value)?;
            env.set(name, val);
            Ok(())
        }
        Stmt::If { condition, then_body, else_body } => {
            let cond = eval_expr(env, condition)?;
            if is_truthy(&cond) {
                exec_stmts(env, then_body)
            } else {
                exec_stmts(env, else_body)
            }
        }
        Stmt::While { condition, body } => {
            while is_truthy(&eval_expr(env, condition)?) {
                exec_stmts(env, body)?;
            }
            Ok(())
        }
        Stmt::Expr(expr) => {
            eval_expr(env, expr)?;
            Ok(())
        }
    }
}

pub fn eval_expr(env: &mut Env, expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(eval_literal(lit)),
        Expr::Ref(name) => env.lookup(name),
        Expr::List(items) => {
            let mut vals = Vec::new();
            for item in items {
                vals.push(eval_expr(env, item)?);
            }
            Ok(Value::List(vals))
        }
        Expr::Index { object, index } => {
            let obj = eval_expr(env, object)?;
            let idx = eval_expr(env, index)?;
            index_value(&obj, &idx)
        }
        Expr::Call { callee, args } => {
            let target = eval_expr(env, callee)?;
            let mut arg_vals = Vec::new();
            for arg in args {
                arg_vals.push(eval_expr(env, arg)?);
            }
            match target {
                Value::Builtin(name) => env.host.call(&name, &arg_vals),
                other => Err(RuntimeError::new(format!("{} is not callable", other.type_name()))),
            }
        }
        Expr::BinOp { op, left, right } => {
            // Short-circuit for logical ops
            if *op == BinOp::And {
                let l = eval_expr(env, left)?;
                return if !is_truthy(&l) { Ok(l) } else { eval_expr(env, right) };
            }
            if *op == BinOp::Or {
                let l = eval_expr(env, left)?;
                return if is_truthy(&l) { Ok(l) } else { eval_expr(env, right) };
            }
            let l = eval_expr(env, left)?;
            let r = eval_expr(env, right)?;
            eval_binop(op, &l, &r)
        }
        Expr::UnaryOp { op, operand } => {
            let val = eval_expr(env, operand)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!is_truthy(&val))),
                UnaryOp::Negate => match val {
                    Value::Number(n) => Ok(Value::Number(-n)),
                    other => Err(RuntimeError::new(format!("cannot negate {}", other.type_name()))),
                },
            }
        }
    }
}

fn eval_literal(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => Value::Number(*n),
        Literal::Text(s) => Value::Text(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Nil => Value::Nil,
    }
}

fn index_value(obj: &Value, idx: &Value) -> Result<Value> {
    let Value::Number(n) = idx else {
        return Err(RuntimeError::new(format!("index must be a number, got {}", idx.type_name())));
    };
    if n.fract() != 0.0 || *n < 0.0 {
        return Err(RuntimeError::new(format!("index must be a non-negative integer, got {}", n)));
    }
    let i = *n as usize;
    match obj {
        Value::List(items) => items
            .get(i)
            .cloned()
            .ok_or_else(|| RuntimeError::new(format!("index {} out of range (len {})", i, items.len()))),
        Value::Text(s) => s
            .chars()
            .nth(i)
            .map(|c| Value::Text(c.to_string()))
            .ok_or_else(|| RuntimeError::new(format!("index {} out of range (len {})", i, s.chars().count()))),
        other => Err(RuntimeError::new(format!("cannot index {}", other.type_name()))),
    }
}

fn eval_binop(op: &BinOp, left: &Value, right: &Value) -> Result<Value> {
    match (op, left, right) {
        // Numeric ops
        (BinOp::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (BinOp::Subtract, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        (BinOp::Multiply, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (BinOp::Divide, Value::Number(a), Value::Number(b)) => {
            if *b == 0.0 {
                Err(RuntimeError::new("division by zero"))
            } else {
                Ok(Value::Number(a / b))
            }
        }
        (BinOp::Modulo, Value::Number(a), Value::Number(b)) => {
            if *b == 0.0 {
                Err(RuntimeError::new("modulo by zero"))
            } else {
                Ok(Value::Number(a % b))
            }
        }
        // String concatenation with +
        (BinOp::Add, Value::Text(a), Value::Text(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::Text(out))
        }
        // List concatenation with +
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(Value::List(out))
        }
        // Comparisons on numbers
        (BinOp::GreaterThan, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
        (BinOp::LessThan, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
        (BinOp::GreaterOrEqual, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
        (BinOp::LessOrEqual, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
        // Comparisons on text (lexicographic)
        (BinOp::GreaterThan, Value::Text(a), Value::Text(b)) => Ok(Value::Bool(a > b)),
        (BinOp::LessThan, Value::Text(a), Value::Text(b)) => Ok(Value::Bool(a < b)),
        (BinOp::GreaterOrEqual, Value::Text(a), Value::Text(b)) => Ok(Value::Bool(a >= b)),
        (BinOp::LessOrEqual, Value::Text(a), Value::Text(b)) => Ok(Value::Bool(a <= b)),
        // Equality
        (BinOp::Equals, a, b) => Ok(Value::Bool(values_equal(a, b))),
        (BinOp::NotEquals, a, b) => Ok(Value::Bool(!values_equal(a, b))),
        _ => Err(RuntimeError::new(format!(
            "unsupported operation: {:?} on {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Nil, Value::Nil) => true,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => false,
    }
}

fn is_truthy(val: &Value) -> bool {
    match val {
        Value::Bool(b) => *b,
        Value::Nil => false,
        Value::Number(n) => *n != 0.0,
        Value::Text(s) => !s.is_empty(),
        Value::List(l) => !l.is_empty(),
        Value::Builtin(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::lexer;
    use crate::parser;

    fn spanned(source: &str) -> Vec<(lexer::Token, Span)> {
        lexer::lex(source)
            .unwrap()
            .into_iter()
            .map(|(t, r)| (t, Span { start: r.start, end: r.end }))
            .collect()
    }

    fn eval_str(source: &str) -> Result<Value> {
        let expr = parser::parse_expression(spanned(source)).unwrap();
        let mut host = Host::with_helpers();
        let mut env = Env::new(&mut host);
        eval_expr(&mut env, &expr)
    }

    fn exec_str(source: &str, host: &mut Host) -> Result<()> {
        let stmts = parser::parse_statements(spanned(source)).unwrap();
        let mut env = Env::new(host);
        exec_stmts(&mut env, &stmts)
    }

    #[test]
    fn eval_arithmetic() {
        assert_eq!(eval_str("1+1").unwrap(), Value::Number(2.0));
        assert_eq!(eval_str("2 + 3 * 4").unwrap(), Value::Number(14.0));
        assert_eq!(eval_str("(2 + 3) * 4").unwrap(), Value::Number(20.0));
        assert_eq!(eval_str("7 % 4").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn eval_string_concat() {
        assert_eq!(
            eval_str(r#""foo" + "bar""#).unwrap(),
            Value::Text("foobar".to_string())
        );
    }

    #[test]
    fn eval_comparison_and_logic() {
        assert_eq!(eval_str("1 < 2 and 2 < 3").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("1 > 2 or 3 == 3").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("not true").unwrap(), Value::Bool(false));
    }

    #[test]
    fn short_circuit_skips_right_side() {
        // The right operand would fail at runtime; short-circuit avoids it.
        assert_eq!(eval_str("false and missing_name").unwrap(), Value::Bool(false));
        assert_eq!(eval_str("true or missing_name").unwrap(), Value::Bool(true));
    }

    #[test]
    fn undefined_name_is_runtime_error() {
        let err = eval_str("undefined_name").unwrap_err();
        assert!(err.to_string().contains("undefined name"));
    }

    #[test]
    fn division_by_zero() {
        assert!(eval_str("1 / 0").is_err());
        assert!(eval_str("1 % 0").is_err());
    }

    #[test]
    fn list_index() {
        assert_eq!(eval_str("[10, 20, 30][1]").unwrap(), Value::Number(20.0));
        assert!(eval_str("[1][5]").is_err());
        assert!(eval_str("[1][0.5]").is_err());
    }

    #[test]
    fn text_index() {
        assert_eq!(eval_str(r#""abc"[2]"#).unwrap(), Value::Text("c".to_string()));
    }

    #[test]
    fn host_function_call() {
        assert_eq!(eval_str("len(\"hello\")").unwrap(), Value::Number(5.0));
        assert_eq!(eval_str("min(3, 1, 2)").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn bare_host_name_resolves_to_builtin() {
        assert_eq!(eval_str("len").unwrap(), Value::Builtin("len".to_string()));
    }

    #[test]
    fn number_is_not_callable() {
        let err = eval_str("3(1)").unwrap_err();
        assert!(err.to_string().contains("not callable"));
    }

    #[test]
    fn exec_assignment_and_use() {
        let mut host = Host::with_helpers();
        exec_str("a = 1\nb = a + 1\nb", &mut host).unwrap();
    }

    #[test]
    fn exec_while_loop() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut host = Host::with_helpers();
        host.register("echo", move |args| {
            sink.borrow_mut().push(crate::host::join_for_echo(args));
            Ok(Value::Nil)
        });

        exec_str("total = 0\ni = 1\nwhile i <= 4 { total = total + i; i = i + 1 }\necho(total)", &mut host).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["10"]);
    }

    #[test]
    fn exec_if_else() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut host = Host::with_helpers();
        host.register("echo", move |args| {
            sink.borrow_mut().push(crate::host::join_for_echo(args));
            Ok(Value::Nil)
        });

        exec_str(r#"x = 3
if x > 5 { echo("big") } else if x > 1 { echo("mid") } else { echo("small") }"#, &mut host).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["mid"]);
    }

    #[test]
    fn display_integral_numbers_without_fraction() {
        assert_eq!(Value::Number(2.0).to_string(), "2");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(
            Value::List(vec![Value::Number(1.0), Value::Text("a".into())]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn runtime_error_in_statement_propagates() {
        let mut host = Host::with_helpers();
        let err = exec_str("a = 1\nb = a / 0", &mut host).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }
}
