use crate::tpl::literal::{NumberValue, is_hex_int};
use crate::value::Value;
use std::fmt;

/// 模板语法树节点
///
/// Body-level nodes. Everything that can appear as a command argument lives
/// in [`Operand`]. `Display` renders a node back as template source.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Comment(CommentNode),
    Action(ActionNode),
    If(BranchNode),
    Range(BranchNode),
    With(BranchNode),
    Template(TemplateNode),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListNode {
    pub nodes: Vec<Node>,
}

impl ListNode {
    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn pop(&mut self) -> Option<Node> {
        self.nodes.pop()
    }

    /// Whitespace and comments only. Such a body never replaces an existing
    /// definition of the same name.
    pub fn is_empty_tree(&self) -> bool {
        self.nodes.iter().all(|n| match n {
            Node::Text(t) => t.text.trim().is_empty(),
            Node::Comment(_) => true,
            _ => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub text: String,
}

/// `{{pipeline}}`
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    pub line: usize,
    pub pipe: PipeNode,
}

/// Shared shape of `if`, `range` and `with`.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub line: usize,
    pub pipe: PipeNode,
    pub list: ListNode,
    pub else_list: Option<ListNode>,
}

/// `{{template "name" pipeline}}`
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub line: usize,
    pub name: String,
    pub pipe: Option<PipeNode>,
}

/// Commands joined by `|`, optionally preceded by variable declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeNode {
    pub line: usize,
    /// What the pipeline belongs to: `command`, `if`, `range`, ...
    pub context: &'static str,
    /// `=` rather than `:=`.
    pub is_assign: bool,
    pub decl: Vec<VariableNode>,
    pub commands: Vec<CommandNode>,
}

impl PipeNode {
    pub fn new(line: usize, context: &'static str) -> Self {
        Self {
            line,
            context,
            is_assign: false,
            decl: Vec::new(),
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandNode {
    pub line: usize,
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.A.B`
    Field(FieldNode),
    /// `$x.A`
    Variable(VariableNode),
    /// Function name.
    Identifier(IdentifierNode),
    /// `(pipeline).A` and similar field access on a non-field term.
    Chain(ChainNode),
    /// Parenthesized pipeline.
    Pipe(PipeNode),
    String(StringNode),
    Number(NumberNode),
    Bool(bool),
    Nil,
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub idents: Vec<String>,
}

/// `idents[0]` is the variable name including `$`; the rest are fields.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub idents: Vec<String>,
}

impl VariableNode {
    pub fn new(name: &str) -> Self {
        Self {
            idents: vec![name.to_string()],
        }
    }

    pub fn name(&self) -> &str {
        self.idents.first().map(String::as_str).unwrap_or("$")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainNode {
    pub node: Box<Operand>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringNode {
    /// As written, quotes included.
    pub quoted: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberNode {
    pub text: String,
    pub value: NumberValue,
}

impl NumberNode {
    pub fn is_int(&self) -> bool {
        self.value.int.is_some()
    }

    pub fn is_float(&self) -> bool {
        self.value.float.is_some()
    }

    pub fn is_complex(&self) -> bool {
        self.value.complex.is_some()
    }

    /// The value a literal takes when used as an argument: complex if
    /// written as complex, float if written with a fraction or exponent,
    /// otherwise an integer.
    pub fn constant(&self) -> Value {
        let v = &self.value;
        if let Some((re, im)) = v.complex {
            return Value::Complex(re, im);
        }
        if let Some(f) = v.float {
            if !is_hex_int(&self.text)
                && !self.text.starts_with('\'')
                && self.text.contains(['.', 'e', 'E', 'p', 'P'])
            {
                return Value::F64(f);
            }
        }
        match (v.int, v.uint, v.float) {
            (Some(i), _, _) => Value::I64(i),
            (None, Some(u), _) => Value::U64(u),
            (None, None, Some(f)) => Value::F64(f),
            _ => Value::Null,
        }
    }
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for ListNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(t) => f.write_str(&t.text),
            Node::Comment(c) => write!(f, "{{{{{}}}}}", c.text),
            Node::Action(a) => write!(f, "{{{{{}}}}}", a.pipe),
            Node::If(b) => fmt_branch(f, "if", b),
            Node::Range(b) => fmt_branch(f, "range", b),
            Node::With(b) => fmt_branch(f, "with", b),
            Node::Template(t) => match &t.pipe {
                Some(pipe) => write!(f, "{{{{template {:?} {}}}}}", t.name, pipe),
                None => write!(f, "{{{{template {:?}}}}}", t.name),
            },
        }
    }
}

fn fmt_branch(f: &mut fmt::Formatter<'_>, keyword: &str, b: &BranchNode) -> fmt::Result {
    write!(f, "{{{{{} {}}}}}{}", keyword, b.pipe, b.list)?;
    if let Some(else_list) = &b.else_list {
        write!(f, "{{{{else}}}}{}", else_list)?;
    }
    f.write_str("{{end}}")
}

impl fmt::Display for PipeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            join(f, &self.decl, ", ")?;
            f.write_str(if self.is_assign { " = " } else { " := " })?;
        }
        join(f, &self.commands, " | ")
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, &self.args, " ")
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(n) => {
                for ident in &n.idents {
                    write!(f, ".{}", ident)?;
                }
                Ok(())
            }
            Operand::Variable(v) => write!(f, "{}", v),
            Operand::Identifier(id) => f.write_str(&id.name),
            Operand::Chain(c) => {
                match c.node.as_ref() {
                    Operand::Pipe(p) => write!(f, "({})", p)?,
                    other => write!(f, "{}", other)?,
                }
                for field in &c.fields {
                    write!(f, ".{}", field)?;
                }
                Ok(())
            }
            Operand::Pipe(p) => write!(f, "({})", p),
            Operand::String(s) => f.write_str(&s.quoted),
            Operand::Number(n) => f.write_str(&n.text),
            Operand::Bool(b) => write!(f, "{}", b),
            Operand::Nil => f.write_str("nil"),
            Operand::Dot => f.write_str("."),
        }
    }
}

impl fmt::Display for VariableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, &self.idents, ".")
    }
}
