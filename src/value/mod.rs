pub mod descriptor;
pub mod serializer;

use crate::error::BoxError;
use crate::value::descriptor::TypeDescriptor;
use chrono::{DateTime, Utc};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use serializer::to_value;

/// 模板数据模型
///
/// 列表、映射与记录放在 `Arc` 里，执行器在 range / with 重新绑定上下文时只做引用计数拷贝。
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Complex(f64, f64),
    Str(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    List(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),
    Record(Arc<Record>),
    Object(Arc<dyn Object>),
}

/// A host value exposing named fields through explicit registration.
///
/// The field set is enumerated once per `type_name` and memoised in the
/// introspection cache; `field` is only called with names that appear in
/// `field_names`. An `Err` from `field` is a hard execution error.
pub trait Object: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    fn field_names(&self) -> &'static [&'static str];

    fn field(&self, name: &str) -> Result<Value, BoxError>;
}

/// 由 serde 结构体转换而来的类型化记录
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    descriptor: Arc<TypeDescriptor>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(type_name: &'static str, fields: Vec<(&'static str, Value)>) -> Self {
        let (names, values): (Vec<_>, Vec<_>) = fields.into_iter().unzip();
        Self {
            descriptor: descriptor::describe(type_name, &names),
            values,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name()
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// 按模板标识符查找字段（精确匹配或 PascalCase 形式）
    pub fn get(&self, ident: &str) -> Option<&Value> {
        self.descriptor.resolve(ident).and_then(|i| self.values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.descriptor.fields().iter().copied().zip(self.values.iter())
    }
}

impl Value {
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(Arc::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<String>, I: IntoIterator<Item = (K, Value)>>(entries: I) -> Self {
        Value::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn object(obj: impl Object + 'static) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by `if`, `with`, `and`, `or`, `not`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::I64(v) => *v != 0,
            Value::U64(v) => *v != 0,
            Value::F64(v) => *v != 0.0,
            Value::Complex(re, im) => *re != 0.0 || *im != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::DateTime(_) | Value::Record(_) | Value::Object(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nil",
            Value::Bool(_) => "bool",
            Value::I64(_) => "int",
            Value::U64(_) => "uint",
            Value::F64(_) => "float",
            Value::Complex(..) => "complex",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "time",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Record(r) => r.type_name(),
            Value::Object(o) => o.type_name(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 整数视图；浮点数只有在没有小数部分时才转换
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::F64(v) if v.fract() == 0.0 && v.abs() < 9.2e18 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::I64(_) | Value::U64(_) | Value::F64(_) | Value::Complex(..)
        )
    }

    /// Length of strings (bytes), byte slices, lists, maps and records.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.len()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.is_truthy()
    }
}

/// Shortest float representation, switching to an exponent outside
/// `1e-4 <= |f| < 1e21` (`1e+21`, `1e-05`).
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e21).contains(&abs) {
        let s = format!("{:e}", f);
        if let Some((mantissa, exp)) = s.split_once('e') {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            return format!("{}e{}{:02}", mantissa, sign, exp.abs());
        }
        return s;
    }
    format!("{}", f)
}

pub(crate) fn format_complex(re: f64, im: f64) -> String {
    let im_str = format_float(im);
    let sign = if im_str.starts_with('-') || im_str.starts_with('+') {
        ""
    } else {
        "+"
    };
    format!("({}{}{}i)", format_float(re), sign, im_str)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F64(v) => f.write_str(&format_float(*v)),
            Value::Complex(re, im) => f.write_str(&format_complex(*re, *im)),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(b) => {
                f.write_str("[")?;
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", byte)?;
                }
                f.write_str("]")
            }
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f %z %Z")),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
            Value::Record(r) => {
                f.write_str("{")?;
                for (i, (_, v)) in r.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("}")
            }
            Value::Object(o) => write!(f, "[object {}]", o.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::I64(a), Value::U64(b)) | (Value::U64(b), Value::I64(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Complex(a, b), Value::Complex(c, d)) => a == c && b == d,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Complex(re, im) => serializer.serialize_str(&format_complex(*re, *im)),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.values.len()))?;
                for (k, v) in r.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Object(o) => {
                let names = o.field_names();
                let mut map = serializer.serialize_map(Some(names.len()))?;
                for name in names {
                    let v = o.field(name).map_err(S::Error::custom)?;
                    map.serialize_entry(name, &v)?;
                }
                map.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}
impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::I64(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(Arc::new(v))
    }
}
impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(v))
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
