use crate::error::{ParseError, Result, TemplateError};
use crate::funcs::{Function, FunctionRegistry, stdlib};
use crate::tpl::ast::ListNode;
use crate::tpl::cache::ParseCache;
use crate::tpl::lexer::Delimiters;
use crate::tpl::parser::ParsedTemplate;
use crate::tpl::render::Renderer;
use crate::value::{Value, to_value};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// 未命名模板的默认名称
pub const DEFAULT_NAME: &str = "default";
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// What a field lookup on a map does when the key is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingKey {
    /// Evaluates to nil.
    #[default]
    Default,
    /// Fails the execution.
    Error,
}

/// 模板引擎配置
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    delimiters: Delimiters,
    keep_comments: bool,
    missing_key: MissingKey,
    max_depth: usize,
    stdlib: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        TemplateOptions {
            delimiters: Delimiters::default(),
            keep_comments: false,
            missing_key: MissingKey::Default,
            max_depth: DEFAULT_MAX_DEPTH,
            stdlib: true,
        }
    }
}

impl TemplateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delims(mut self, left: &str, right: &str) -> Self {
        let comments = self.delimiters;
        self.delimiters = Delimiters::new(left, right).comments(&comments.left_comment, &comments.right_comment);
        self
    }

    pub fn comments(mut self, left: &str, right: &str) -> Self {
        self.delimiters = self.delimiters.comments(left, right);
        self
    }

    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    pub fn missing_key(mut self, missing_key: MissingKey) -> Self {
        self.missing_key = missing_key;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 是否注册扩展函数集，内置函数总是注册
    pub fn stdlib(mut self, enabled: bool) -> Self {
        self.stdlib = enabled;
        self
    }
}

/// 模板工厂：持有已解析的模板与函数表
///
/// Parsing needs `&mut self`; executing only needs `&self`, so a fully
/// loaded factory can be shared between threads and executed concurrently.
/// Each execution gets its own variable scope.
#[derive(Debug)]
pub struct TemplateFactory {
    options: TemplateOptions,
    funcs: FunctionRegistry,
    roots: HashMap<String, Arc<ListNode>>,
    default_name: Option<String>,
    cache: ParseCache,
}

impl Default for TemplateFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateFactory {
    pub fn new() -> Self {
        Self::with_options(TemplateOptions::default())
    }

    pub fn with_options(options: TemplateOptions) -> Self {
        let mut funcs = FunctionRegistry::with_builtins();
        if options.stdlib {
            stdlib::register(&mut funcs);
        }
        TemplateFactory {
            options,
            funcs,
            roots: HashMap::new(),
            default_name: None,
            cache: ParseCache::default(),
        }
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// Registers `f` under `name`, replacing any function of that name.
    pub fn register_function(&mut self, name: &str, f: impl Function + 'static) -> &mut Self {
        self.funcs.register(name, f);
        self
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.funcs
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.funcs
    }

    /// Parses an unnamed source; it becomes the default template.
    pub fn parse(&mut self, source: &str) -> Result<()> {
        self.parse_named(DEFAULT_NAME, source)?;
        self.default_name = Some(DEFAULT_NAME.to_string());
        Ok(())
    }

    /// Parses `source` under `name`, together with every template it
    /// defines. The first template parsed becomes the default one.
    ///
    /// Either the whole source is installed or, on error, nothing changes.
    pub fn parse_named(&mut self, name: &str, source: &str) -> Result<()> {
        let parsed = self.parse_source(name, source)?;
        self.install(name, &parsed, true);
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        Ok(())
    }

    /// Adds only the templates `source` defines; the default template and
    /// any top-level text of `source` are left alone.
    pub fn parse_merge(&mut self, source: &str) -> Result<()> {
        let name = self.default_name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string());
        let parsed = self.parse_source(&name, source)?;
        self.install(&name, &parsed, false);
        Ok(())
    }

    fn parse_source(&self, name: &str, source: &str) -> std::result::Result<Arc<ParsedTemplate>, ParseError> {
        let start = Instant::now();
        let parsed = self.cache.get_parsed(
            name,
            source,
            &self.options.delimiters,
            self.options.keep_comments,
        );
        match &parsed {
            Ok(p) => debug!(
                "parse template: name={}, definitions={}, elapsed_ms={}",
                name,
                p.definitions.len(),
                start.elapsed().as_millis()
            ),
            Err(e) => debug!("parse template failed: name={}, error={}", name, e),
        }
        parsed
    }

    fn install(&mut self, name: &str, parsed: &ParsedTemplate, with_root: bool) {
        let root = with_root.then(|| (name.to_string(), parsed.root.clone()));
        for (n, list) in parsed.definitions.iter().cloned().chain(root) {
            if list.is_empty_tree() && self.roots.contains_key(&n) {
                debug!("ignore empty redefinition: name={}", n);
                continue;
            }
            self.roots.insert(n, Arc::new(list));
        }
    }

    /// Drops `name` from this factory.
    pub fn remove_template(&mut self, name: &str) -> bool {
        self.cache.remove(name);
        if self.default_name.as_deref() == Some(name) {
            self.default_name = None;
        }
        self.roots.remove(name).is_some()
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.roots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn default_template_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    pub fn template(&self, name: &str) -> Option<Template<'_>> {
        self.roots.get_key_value(name).map(|(name, tree)| Template {
            factory: self,
            name,
            tree,
        })
    }

    fn default_or_not_found(&self) -> Result<&str> {
        self.default_name
            .as_deref()
            .ok_or_else(|| TemplateError::NotFound(DEFAULT_NAME.to_string()))
    }

    /// Executes the default template.
    pub fn execute<T: Serialize + ?Sized>(&self, data: &T, out: &mut dyn Write) -> Result<()> {
        let name = self.default_or_not_found()?;
        self.execute_named(name, data, out)
    }

    pub fn execute_named<T: Serialize + ?Sized>(
        &self,
        name: &str,
        data: &T,
        out: &mut dyn Write,
    ) -> Result<()> {
        let value = to_value(data).map_err(|e| TemplateError::Execution {
            template: name.to_string(),
            line: 0,
            message: format!("can't convert data: {}", e),
            source: Some(Box::new(e)),
        })?;
        self.execute_value(name, &value, out)
    }

    /// Executes `name` against an already converted value.
    ///
    /// Output written before a failure stays in `out`.
    pub fn execute_value(&self, name: &str, data: &Value, out: &mut dyn Write) -> Result<()> {
        if !self.roots.contains_key(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        let start = Instant::now();
        let mut sink = CountingWriter { inner: out, written: 0 };
        let result = {
            let mut renderer = Renderer::new(
                &self.roots,
                &self.funcs,
                self.options.missing_key,
                self.options.max_depth,
                &mut sink,
            );
            panic::catch_unwind(AssertUnwindSafe(|| renderer.execute(name, data)))
                .unwrap_or_else(|payload| Err(renderer.internal_error(payload.as_ref())))
        };
        match &result {
            Ok(()) => debug!(
                "execute template: name={}, bytes={}, elapsed_ms={}",
                name,
                sink.written,
                start.elapsed().as_millis()
            ),
            Err(e) => debug!(
                "execute template failed: name={}, bytes={}, error={}",
                name, sink.written, e
            ),
        }
        result
    }

    /// Renders the default template to a string.
    pub fn render<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let name = self.default_or_not_found()?;
        self.render_named(name, data)
    }

    pub fn render_named<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String> {
        let mut buf = Vec::new();
        self.execute_named(name, data, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// 指向工厂中某个已解析模板的句柄
#[derive(Debug, Clone, Copy)]
pub struct Template<'f> {
    factory: &'f TemplateFactory,
    name: &'f str,
    tree: &'f ListNode,
}

impl<'f> Template<'f> {
    pub fn name(&self) -> &'f str {
        self.name
    }

    pub fn tree(&self) -> &'f ListNode {
        self.tree
    }

    /// Template source reconstructed from the tree.
    pub fn source(&self) -> String {
        self.tree.to_string()
    }

    pub fn execute<T: Serialize + ?Sized>(&self, data: &T, out: &mut dyn Write) -> Result<()> {
        self.factory.execute_named(self.name, data, out)
    }

    pub fn render<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        self.factory.render_named(self.name, data)
    }
}

struct CountingWriter<'w> {
    inner: &'w mut dyn Write,
    written: usize,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Letter {
        name: String,
        attended: bool,
    }

    #[test]
    fn test_render_struct() {
        let mut factory = TemplateFactory::new();
        factory.parse("Dear {{.Name}}{{if .Attended}}, thanks{{end}}.").unwrap();
        let letter = Letter {
            name: "Ann".to_string(),
            attended: true,
        };
        assert_eq!(factory.render(&letter).unwrap(), "Dear Ann, thanks.");
    }

    #[test]
    fn test_parse_is_atomic() {
        let mut factory = TemplateFactory::new();
        factory.parse_named("a", "A").unwrap();
        let err = factory
            .parse_named("b", "{{define \"x\"}}X{{end}}{{if}}")
            .unwrap_err();
        assert!(err.is_parse());
        assert_eq!(factory.template_names(), vec!["a"]);
    }

    #[test]
    fn test_parse_merge_keeps_default() {
        let mut factory = TemplateFactory::new();
        factory.parse("main:{{template \"part\" .}}").unwrap();
        factory
            .parse_merge("ignored text{{define \"part\"}}[{{.}}]{{end}}")
            .unwrap();
        assert_eq!(factory.render(&1).unwrap(), "main:[1]");
        assert_eq!(factory.default_template_name(), Some(DEFAULT_NAME));
    }

    #[test]
    fn test_empty_body_does_not_replace() {
        let mut factory = TemplateFactory::new();
        factory.parse_named("page", "{{define \"page\"}}body{{end}}").unwrap();
        assert_eq!(factory.render_named("page", &()).unwrap(), "body");
        factory.parse_named("page", "  \n").unwrap();
        assert_eq!(factory.render_named("page", &()).unwrap(), "body");
    }

    #[derive(Debug)]
    struct Ledger;

    impl crate::value::Object for Ledger {
        fn type_name(&self) -> &'static str {
            "EngineTestLedger"
        }
        fn field_names(&self) -> &'static [&'static str] {
            &["rows"]
        }
        fn field(&self, _name: &str) -> std::result::Result<Value, crate::BoxError> {
            let rows: Vec<i64> = Vec::new();
            Ok(Value::from(rows[3]))
        }
    }

    #[test]
    fn test_panic_outside_functions_is_execution_error() {
        let mut factory = TemplateFactory::new();
        factory
            .parse("{{define \"rows\"}}\n{{.Rows}}{{end}}ok {{template \"rows\" .}}")
            .unwrap();
        let mut out = Vec::new();
        let err = factory
            .execute_value(DEFAULT_NAME, &Value::object(Ledger), &mut out)
            .unwrap_err();
        assert!(err.is_execution());
        let TemplateError::Execution { template, line, message, .. } = &err else {
            panic!("Expected execution error");
        };
        assert_eq!(template, "rows");
        assert_eq!(*line, 2);
        assert!(message.starts_with("internal error: index out of bounds"));
        assert_eq!(out, b"ok ");

        // the factory stays usable after the fault
        factory.parse_named("plain", "fine").unwrap();
        assert_eq!(factory.render_named("plain", &()).unwrap(), "fine");
    }

    #[test]
    fn test_not_found() {
        let factory = TemplateFactory::new();
        assert!(factory.render(&()).unwrap_err().is_not_found());
        let err = factory.render_named("nope", &()).unwrap_err();
        assert_eq!(err.to_string(), "template: no template named \"nope\"");
    }

    #[test]
    fn test_options() {
        let options = TemplateOptions::new()
            .delims("<%", "%>")
            .missing_key(MissingKey::Error)
            .stdlib(false);
        let mut factory = TemplateFactory::with_options(options);
        assert!(!factory.functions().contains("upper"));
        assert!(factory.functions().contains("printf"));
        factory.parse("<% .a %>{{.a}}").unwrap();
        let data: BTreeMap<&str, i32> = BTreeMap::from([("a", 1)]);
        assert_eq!(factory.render(&data).unwrap(), "1{{.a}}");
        let err = factory.render(&BTreeMap::<&str, i32>::new()).unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn test_keep_comments_round_trip() {
        let mut factory = TemplateFactory::with_options(TemplateOptions::new().keep_comments(true));
        factory.parse("a{{/* note */}}b").unwrap();
        let template = factory.template(DEFAULT_NAME).unwrap();
        assert_eq!(template.source(), "a{{/* note */}}b");
        assert_eq!(template.render(&()).unwrap(), "ab");
    }

    #[test]
    fn test_register_function() {
        let mut factory = TemplateFactory::new();
        factory.register_function("twice", |args: &[Value]| -> crate::funcs::FuncResult {
            Ok(Value::from(format!("{0}{0}", args[0])))
        });
        factory.parse("{{twice \"ab\"}}|{{\"x\" | twice}}").unwrap();
        assert_eq!(factory.render(&()).unwrap(), "abab|xx");
    }

    #[test]
    fn test_remove_template() {
        let mut factory = TemplateFactory::new();
        factory.parse_named("gone", "x").unwrap();
        assert!(factory.remove_template("gone"));
        assert!(!factory.has_template("gone"));
        assert_eq!(factory.default_template_name(), None);
        assert_eq!(factory.cache.len(), 0);
    }

    #[test]
    fn test_factories_do_not_share_parses() {
        let mut first = TemplateFactory::new();
        let mut second = TemplateFactory::with_options(TemplateOptions::new().delims("[[", "]]"));
        first.parse("[[.]] {{.}}").unwrap();
        second.parse("[[.]] {{.}}").unwrap();
        assert_eq!(first.render(&1).unwrap(), "[[.]] 1");
        assert_eq!(second.render(&1).unwrap(), "1 {{.}}");

        first.parse("changed {{.}}").unwrap();
        assert_eq!(first.render(&2).unwrap(), "changed 2");
        assert_eq!(second.render(&2).unwrap(), "2 {{.}}");
    }

    #[test]
    fn test_max_depth_option() {
        let mut factory = TemplateFactory::with_options(TemplateOptions::new().max_depth(2));
        factory
            .parse("{{define \"r\"}}.{{template \"r\"}}{{end}}{{template \"r\"}}")
            .unwrap();
        let mut out = Vec::new();
        let err = factory.execute(&(), &mut out).unwrap_err();
        assert!(err.to_string().contains("exceeded maximum template depth (2)"));
        assert_eq!(out, b"..");
    }
}
