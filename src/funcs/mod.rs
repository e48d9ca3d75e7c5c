//! 模板函数注册表

pub mod builtins;
pub mod stdlib;

use crate::error::BoxError;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type FuncResult = Result<Value, BoxError>;

/// A function callable from a template by name.
///
/// Arguments arrive already evaluated; a value piped in from the previous
/// pipeline stage is the last argument.
pub trait Function: Send + Sync {
    fn call(&self, args: &[Value]) -> FuncResult;
}

impl<F> Function for F
where
    F: Fn(&[Value]) -> FuncResult + Send + Sync,
{
    fn call(&self, args: &[Value]) -> FuncResult {
        self(args)
    }
}

/// Outcome of a registry lookup.
pub enum Lookup<'a> {
    Bound(&'a Arc<dyn Function>),
    /// Declared without an implementation.
    Unbound,
    Missing,
}

/// 名称到函数的映射，模板工厂持有一份
///
/// A name may be declared with no implementation; parsing accepts it, and
/// calling it is an execution error.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    funcs: HashMap<String, Option<Arc<dyn Function>>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.funcs.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("names", &names).finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the core functions (`and`, `len`, `printf`, ...).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, f: impl Function + 'static) -> &mut Self {
        self.funcs.insert(name.to_string(), Some(Arc::new(f)));
        self
    }

    pub fn register_arc(&mut self, name: &str, f: Arc<dyn Function>) -> &mut Self {
        self.funcs.insert(name.to_string(), Some(f));
        self
    }

    /// Makes `name` known without an implementation.
    pub fn declare(&mut self, name: &str) -> &mut Self {
        self.funcs.insert(name.to_string(), None);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.funcs.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        match self.funcs.get(name) {
            Some(Some(f)) => Lookup::Bound(f),
            Some(None) => Lookup::Unbound,
            None => Lookup::Missing,
        }
    }

    /// Copies every entry of `other`, replacing same-named entries.
    pub fn extend(&mut self, other: &FunctionRegistry) {
        for (name, f) in &other.funcs {
            self.funcs.insert(name.clone(), f.clone());
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

// argument helpers shared by the function sets

pub(crate) fn arity(name: &str, args: &[Value], n: usize) -> Result<(), BoxError> {
    if args.len() != n {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            n,
            args.len()
        )
        .into());
    }
    Ok(())
}

pub(crate) fn min_arity(name: &str, args: &[Value], n: usize) -> Result<(), BoxError> {
    if args.len() < n {
        return Err(format!(
            "wrong number of args for {}: want at least {} got {}",
            name,
            n,
            args.len()
        )
        .into());
    }
    Ok(())
}

/// String form used by string functions: strings as-is, nil as empty,
/// anything else in its printed form.
pub(crate) fn to_str(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        other => other.to_string(),
    }
}

pub(crate) fn to_int(name: &str, v: &Value) -> Result<i64, BoxError> {
    match v {
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("{}: can't convert {:?} to int", name, s).into()),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Null => Ok(0),
        Value::F64(f) => Ok(*f as i64),
        other => other
            .as_i64()
            .ok_or_else(|| format!("{}: expected integer, got {}", name, other.type_name()).into()),
    }
}

pub(crate) fn to_float(name: &str, v: &Value) -> Result<f64, BoxError> {
    match v {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("{}: can't convert {:?} to float", name, s).into()),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        other => other
            .as_f64()
            .ok_or_else(|| format!("{}: expected number, got {}", name, other.type_name()).into()),
    }
}
