use crate::error::{BoxError, Result, TemplateError};
use crate::funcs::{FunctionRegistry, Lookup};
use crate::tpl::ast::{BranchNode, CommandNode, ListNode, Node, Operand, PipeNode, TemplateNode, VariableNode};
use crate::tpl::engine::MissingKey;
use crate::tpl::literal;
use crate::tpl::render_context::Scope;
use crate::value::{Value, descriptor};
use std::any::Any;
use std::collections::HashMap;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// 单次执行的状态
///
/// One renderer per `execute` call. The variable scope is owned here and
/// never shared; the roots and functions are borrowed read-only from the
/// factory.
pub(crate) struct Renderer<'a> {
    roots: &'a HashMap<String, Arc<ListNode>>,
    funcs: &'a FunctionRegistry,
    missing_key: MissingKey,
    max_depth: usize,
    scope: Scope,
    /// Template currently being walked, for error messages.
    template: String,
    line: usize,
    depth: usize,
    out: &'a mut dyn Write,
}

impl<'a> Renderer<'a> {
    pub fn new(
        roots: &'a HashMap<String, Arc<ListNode>>,
        funcs: &'a FunctionRegistry,
        missing_key: MissingKey,
        max_depth: usize,
        out: &'a mut dyn Write,
    ) -> Self {
        Self {
            roots,
            funcs,
            missing_key,
            max_depth,
            scope: Scope::default(),
            template: String::new(),
            line: 0,
            depth: 0,
            out,
        }
    }

    /// Renders the root `name` with `data` as both `.` and `$`.
    pub fn execute(&mut self, name: &str, data: &Value) -> Result<()> {
        let roots = self.roots;
        let list = roots
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        self.template = name.to_string();
        self.scope = Scope::new(data.clone());
        self.walk_list(list, data)
    }

    /// Reports a panic that escaped the walk at the position reached so far.
    pub fn internal_error(&self, payload: &(dyn Any + Send)) -> TemplateError {
        self.error(format!("internal error: {}", panic_message(payload)))
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::execution(&self.template, self.line, message)
    }

    fn error_with(&self, message: String, source: BoxError) -> TemplateError {
        TemplateError::Execution {
            template: self.template.clone(),
            line: self.line,
            message,
            source: Some(source),
        }
    }

    fn walk_list(&mut self, list: &ListNode, dot: &Value) -> Result<()> {
        for node in &list.nodes {
            self.walk(node, dot)?;
        }
        Ok(())
    }

    fn walk(&mut self, node: &Node, dot: &Value) -> Result<()> {
        match node {
            Node::Text(t) => self.out.write_all(t.text.as_bytes())?,
            Node::Comment(_) => {}
            Node::Action(a) => {
                self.line = a.line;
                let value = self.eval_pipeline(&a.pipe, dot)?;
                if a.pipe.decl.is_empty() {
                    self.print_value(&value)?;
                }
            }
            Node::If(b) => self.walk_scoped(b, |r| r.walk_if_or_with(b, dot, false))?,
            Node::With(b) => self.walk_scoped(b, |r| r.walk_if_or_with(b, dot, true))?,
            Node::Range(b) => self.walk_scoped(b, |r| r.walk_range(b, dot))?,
            Node::Template(t) => self.walk_template(t, dot)?,
        }
        Ok(())
    }

    /// Variables declared by a control pipeline live until its `{{end}}`.
    fn walk_scoped(
        &mut self,
        b: &BranchNode,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let saved = self.scope.save(b.pipe.decl.iter().map(VariableNode::name));
        let result = f(self);
        self.scope.restore(saved);
        result
    }

    fn walk_if_or_with(&mut self, b: &BranchNode, dot: &Value, rebind: bool) -> Result<()> {
        self.line = b.line;
        let value = self.eval_pipeline(&b.pipe, dot)?;
        if value.is_truthy() {
            let inner = if rebind { &value } else { dot };
            self.walk_list(&b.list, inner)
        } else if let Some(else_list) = &b.else_list {
            self.walk_list(else_list, dot)
        } else {
            Ok(())
        }
    }

    fn walk_range(&mut self, b: &BranchNode, dot: &Value) -> Result<()> {
        self.line = b.line;
        let value = self.eval_pipeline_raw(&b.pipe, dot)?;
        match &value {
            Value::List(items) if !items.is_empty() => {
                for (i, elem) in items.iter().enumerate() {
                    self.range_iteration(b, Value::from(i), elem)?;
                }
            }
            Value::Map(m) if !m.is_empty() => {
                for (key, elem) in m.iter() {
                    self.range_iteration(b, Value::from(key.as_str()), elem)?;
                }
            }
            Value::List(_) | Value::Map(_) | Value::Null => {
                if let Some(else_list) = &b.else_list {
                    self.walk_list(else_list, dot)?;
                }
            }
            other => {
                return Err(self.error(format!("range can't iterate over {}", other)));
            }
        }
        Ok(())
    }

    fn range_iteration(&mut self, b: &BranchNode, key: Value, elem: &Value) -> Result<()> {
        match b.pipe.decl.as_slice() {
            [] => {}
            [v] => self.bind(v, elem.clone(), b.pipe.is_assign)?,
            [k, v] => {
                self.bind(k, key, b.pipe.is_assign)?;
                self.bind(v, elem.clone(), b.pipe.is_assign)?;
            }
            _ => return Err(self.error("too many declarations in range")),
        }
        self.walk_list(&b.list, elem)
    }

    fn walk_template(&mut self, t: &TemplateNode, dot: &Value) -> Result<()> {
        self.line = t.line;
        let roots = self.roots;
        let Some(list) = roots.get(&t.name) else {
            return Err(self.error(format!("no such template {:?}", t.name)));
        };
        if self.depth >= self.max_depth {
            return Err(self.error(format!(
                "exceeded maximum template depth ({})",
                self.max_depth
            )));
        }
        let new_dot = match &t.pipe {
            Some(pipe) => self.eval_pipeline(pipe, dot)?,
            None => dot.clone(),
        };

        // the invoked template sees only `$`, bound to its own data
        let outer_scope = std::mem::replace(&mut self.scope, Scope::new(new_dot.clone()));
        let outer_template = std::mem::replace(&mut self.template, t.name.clone());
        self.depth += 1;
        let result = self.walk_list(list, &new_dot);
        self.depth -= 1;
        self.scope = outer_scope;
        self.template = outer_template;
        self.line = t.line;
        result
    }

    fn bind(&mut self, var: &VariableNode, value: Value, is_assign: bool) -> Result<()> {
        if !is_assign {
            self.scope.declare(var.name(), value);
        } else if !self.scope.assign(var.name(), value) {
            return Err(self.error(format!("undefined variable: {}", var.name())));
        }
        Ok(())
    }

    /// Evaluates the pipeline and performs its declarations.
    fn eval_pipeline(&mut self, pipe: &PipeNode, dot: &Value) -> Result<Value> {
        let value = self.eval_pipeline_raw(pipe, dot)?;
        for var in &pipe.decl {
            self.bind(var, value.clone(), pipe.is_assign)?;
        }
        Ok(value)
    }

    fn eval_pipeline_raw(&mut self, pipe: &PipeNode, dot: &Value) -> Result<Value> {
        let mut value: Option<Value> = None;
        for cmd in &pipe.commands {
            let chained = value.take().filter(|v| !v.is_null());
            value = Some(self.eval_command(cmd, dot, chained)?);
        }
        Ok(value.unwrap_or_default())
    }

    fn eval_command(
        &mut self,
        cmd: &CommandNode,
        dot: &Value,
        chained: Option<Value>,
    ) -> Result<Value> {
        self.line = cmd.line;
        let Some(first) = cmd.args.first() else {
            return Err(self.error("empty command"));
        };
        match first {
            Operand::Identifier(id) => return self.eval_function(&id.name, &cmd.args[1..], dot, chained),
            Operand::Nil => return Err(self.error("nil is not a command")),
            _ => {}
        }
        if cmd.args.len() > 1 || chained.is_some() {
            return Err(self.error(format!("can't give argument to non-function {}", first)));
        }
        self.eval_arg(first, dot)
    }

    fn eval_arg(&mut self, op: &Operand, dot: &Value) -> Result<Value> {
        match op {
            Operand::Dot => Ok(dot.clone()),
            Operand::Nil => Ok(Value::Null),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            Operand::String(s) => Ok(Value::from(s.text.as_str())),
            Operand::Number(n) => Ok(n.constant()),
            Operand::Field(f) => self.eval_fields(dot.clone(), &f.idents),
            Operand::Variable(v) => {
                let base = self.variable(v.name())?;
                self.eval_fields(base, &v.idents[1..])
            }
            Operand::Chain(c) => {
                let base = self.eval_arg(&c.node, dot)?;
                self.eval_fields(base, &c.fields)
            }
            Operand::Pipe(p) => self.eval_pipeline(p, dot),
            // niladic call
            Operand::Identifier(id) => self.eval_function(&id.name, &[], dot, None),
        }
    }

    fn variable(&self, name: &str) -> Result<Value> {
        self.scope
            .get(name)
            .cloned()
            .ok_or_else(|| self.error(format!("undefined variable: {}", name)))
    }

    fn eval_fields(&self, mut value: Value, idents: &[String]) -> Result<Value> {
        for ident in idents {
            value = self.eval_field(&value, ident)?;
        }
        Ok(value)
    }

    fn eval_field(&self, receiver: &Value, name: &str) -> Result<Value> {
        match receiver {
            Value::Map(m) => match m.get(name) {
                Some(v) => Ok(v.clone()),
                None if self.missing_key == MissingKey::Error => {
                    Err(self.error(format!("map has no entry for key {:?}", name)))
                }
                None => Ok(Value::Null),
            },
            Value::Record(r) => Ok(r.get(name).cloned().unwrap_or_default()),
            Value::Object(o) => match descriptor::describe_object(o.as_ref()).canonical(name) {
                Some(field) => o
                    .field(field)
                    .map_err(|e| self.error_with(format!("error reading field {}: {}", name, e), e)),
                None => Ok(Value::Null),
            },
            Value::Null => Ok(Value::Null),
            other => Err(self.error(format!(
                "can't evaluate field {} in type {}",
                name,
                other.type_name()
            ))),
        }
    }

    fn eval_function(
        &mut self,
        name: &str,
        args: &[Operand],
        dot: &Value,
        chained: Option<Value>,
    ) -> Result<Value> {
        let funcs = self.funcs;
        let f = match funcs.lookup(name) {
            Lookup::Bound(f) => f,
            Lookup::Unbound => {
                return Err(self.error(format!("function {} has no implementation", name)));
            }
            Lookup::Missing => return Err(self.error(format!("{} is not a defined function", name))),
        };
        let mut values = Vec::with_capacity(args.len() + 1);
        for arg in args {
            values.push(self.eval_arg(arg, dot)?);
        }
        values.extend(chained);

        match panic::catch_unwind(AssertUnwindSafe(|| f.call(&values))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.error_with(format!("error calling {}: {}", name, e), e)),
            Err(payload) => Err(self.error(format!(
                "error calling {}: internal error: {}",
                name,
                panic_message(payload.as_ref())
            ))),
        }
    }

    fn print_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => {}
            Value::Str(s) => self.out.write_all(literal::unescape(s).as_bytes())?,
            Value::Bool(_)
            | Value::I64(_)
            | Value::U64(_)
            | Value::F64(_)
            | Value::Complex(..)
            | Value::DateTime(_) => write!(self.out, "{}", value)?,
            other => write!(self.out, "[object {}]", other.type_name())?,
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
