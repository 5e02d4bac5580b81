use std::collections::HashMap;

use crate::interpreter::{RuntimeError, Value};

/// A function injected into the evaluation environment by the embedding host.
pub type NativeFn = Box<dyn FnMut(&[Value]) -> Result<Value, RuntimeError>>;

/// The externally supplied namespace of named functions that evaluated code
/// can call. Name resolution falls back to this table after the variable
/// scopes have been searched.
pub struct Host {
    functions: HashMap<String, NativeFn>,
}

impl Host {
    pub fn new() -> Self {
        Host {
            functions: HashMap::new(),
        }
    }

    /// The host used by the CLI binary: `echo` writes one line to stderr,
    /// plus the usual small helpers.
    pub fn with_stderr_echo() -> Self {
        let mut host = Self::with_helpers();
        host.register("echo", |args| {
            eprintln!("{}", join_for_echo(args));
            Ok(Value::Nil)
        });
        host
    }

    /// Helper functions only, no `echo`. Embedders that route output
    /// elsewhere start from this and register their own.
    pub fn with_helpers() -> Self {
        let mut host = Self::new();

        host.register("len", |args| {
            let [arg] = args else {
                return Err(RuntimeError::new(format!("len: expected 1 arg, got {}", args.len())));
            };
            match arg {
                Value::Text(s) => Ok(Value::Number(s.chars().count() as f64)),
                Value::List(l) => Ok(Value::Number(l.len() as f64)),
                other => Err(RuntimeError::new(format!("len: expected text or list, got {}", other.type_name()))),
            }
        });

        host.register("str", |args| {
            let [arg] = args else {
                return Err(RuntimeError::new(format!("str: expected 1 arg, got {}", args.len())));
            };
            Ok(Value::Text(arg.to_string()))
        });

        host.register("num", |args| {
            let [arg] = args else {
                return Err(RuntimeError::new(format!("num: expected 1 arg, got {}", args.len())));
            };
            match arg {
                Value::Number(n) => Ok(Value::Number(*n)),
                Value::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Number)
                    .map_err(|_| RuntimeError::new(format!("num: cannot parse '{}'", s))),
                other => Err(RuntimeError::new(format!("num: expected text or number, got {}", other.type_name()))),
            }
        });

        host.register("abs", |args| {
            match args {
                [Value::Number(n)] => Ok(Value::Number(n.abs())),
                [other] => Err(RuntimeError::new(format!("abs: expected number, got {}", other.type_name()))),
                _ => Err(RuntimeError::new(format!("abs: expected 1 arg, got {}", args.len()))),
            }
        });

        host.register("min", |args| fold_numeric("min", args, f64::min));
        host.register("max", |args| fold_numeric("max", args, f64::max));

        host
    }

    pub fn register(
        &mut self,
        name: &str,
        f: impl FnMut(&[Value]) -> Result<Value, RuntimeError> + 'static,
    ) {
        self.functions.insert(name.to_string(), Box::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        match self.functions.get_mut(name) {
            Some(f) => f(args),
            None => Err(RuntimeError::new(format!("undefined function: {}", name))),
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

fn fold_numeric(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    if args.is_empty() {
        return Err(RuntimeError::new(format!("{}: expected at least 1 arg, got 0", name)));
    }
    let mut acc: Option<f64> = None;
    for arg in args {
        match arg {
            Value::Number(n) => acc = Some(acc.map_or(*n, |a| f(a, *n))),
            other => return Err(RuntimeError::new(format!("{}: expected number, got {}", name, other.type_name()))),
        }
    }
    Ok(Value::Number(acc.unwrap_or(0.0)))
}

/// `echo` joins its arguments with single spaces, like a print call.
pub fn join_for_echo(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
