//! Go 风格的文本模板引擎
//!
//! ```ignore
//! let mut factory = utpl::TemplateFactory::new();
//! factory.parse("Hello {{.Name | default \"stranger\"}}!")?;
//! let out = factory.render(&serde_json::json!({"Name": "Ann"}))?;
//! ```

pub mod error;
pub mod funcs;
pub mod loader;
pub mod provider;
pub mod tpl;
pub mod value;

pub use error::{BoxError, ParseError, Result, TemplateError};
pub use funcs::{FuncResult, Function, FunctionRegistry};
pub use tpl::engine::{MissingKey, Template, TemplateFactory, TemplateOptions};
pub use utpl_macros::embed_templates;
pub use value::{Object, Record, Value, to_value};
