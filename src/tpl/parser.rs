//! 递归下降语法分析
//!
//! Turns a token stream into the primary [`ListNode`] plus every template
//! introduced with `define` or `block`, in source order.

use crate::error::ParseError;
use crate::tpl::ast::*;
use crate::tpl::literal::{parse_char_constant, parse_complex, parse_number, unquote, unquote_raw};
use crate::tpl::token::{Token, TokenKind};

/// Nesting limit shared by pipelines and control-block bodies.
const MAX_EXPRESSION_DEPTH: usize = 128;

/// Result of parsing one source text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTemplate {
    /// Top-level body.
    pub root: ListNode,
    /// `define` / `block` bodies in source order; a later entry with the
    /// same name wins.
    pub definitions: Vec<(String, ListNode)>,
}

/// How an item list was closed.
enum Terminator {
    End,
    Else,
}

/// What `text_or_action` produced.
enum Item {
    Node(Node),
    End(usize),
    Else(usize),
}

pub fn parse(name: &str, tokens: &[Token]) -> Result<ParsedTemplate, ParseError> {
    // lexical errors are always the final token
    match tokens.last() {
        Some(t) if t.kind == TokenKind::Error => {
            return Err(ParseError::new(name, t.line, t.text.clone()));
        }
        Some(t) if t.kind == TokenKind::Eof => {}
        _ => return Err(ParseError::new(name, 1, "token stream is not terminated")),
    }
    let mut parser = Parser {
        name,
        tokens,
        index: 0,
        action_line: 1,
        depth: 0,
        definitions: Vec::new(),
    };
    let root = parser.parse_top()?;
    Ok(ParsedTemplate {
        root,
        definitions: parser.definitions,
    })
}

struct Parser<'t> {
    name: &'t str,
    tokens: &'t [Token],
    index: usize,
    /// Line of the left delimiter of the action being parsed.
    action_line: usize,
    /// Open pipelines and item lists.
    depth: usize,
    definitions: Vec<(String, ListNode)>,
}

impl<'t> Parser<'t> {
    fn next(&mut self) -> &'t Token {
        let tokens = self.tokens;
        let token = &tokens[self.index.min(tokens.len() - 1)];
        self.index += 1;
        token
    }

    fn backup(&mut self) {
        self.index -= 1;
    }

    fn peek(&mut self) -> &'t Token {
        let token = self.next();
        self.backup();
        token
    }

    fn next_non_space(&mut self) -> &'t Token {
        loop {
            let token = self.next();
            if token.kind != TokenKind::Space {
                return token;
            }
        }
    }

    /// Skips spaces and returns the next token without consuming it.
    fn peek_non_space(&mut self) -> &'t Token {
        let token = self.next_non_space();
        self.backup();
        token
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(self.name, line, message)
    }

    fn enter(&mut self, line: usize) -> Result<(), ParseError> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(self.error(line, "max expression depth exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn unexpected(&self, token: &Token, context: &str) -> ParseError {
        self.error(token.line, format!("unexpected {} in {}", token, context))
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<&'t Token, ParseError> {
        let token = self.next_non_space();
        if token.kind != kind {
            return Err(self.unexpected(token, context));
        }
        Ok(token)
    }

    fn parse_top(&mut self) -> Result<ListNode, ParseError> {
        let mut root = ListNode::default();
        while self.peek().kind != TokenKind::Eof {
            if self.peek().kind == TokenKind::LeftDelim {
                let mark = self.index;
                let delim = self.next();
                if self.next_non_space().kind == TokenKind::Define {
                    self.action_line = delim.line;
                    self.parse_definition()?;
                    continue;
                }
                self.index = mark;
            }
            match self.text_or_action()? {
                Item::Node(node) => root.push(node),
                Item::End(line) => return Err(self.error(line, "unmatched {{end}}")),
                Item::Else(line) => return Err(self.error(line, "unmatched {{else}}")),
            }
        }
        Ok(root)
    }

    /// `{{define "name"}}...{{end}}`, the left delimiter and keyword consumed.
    fn parse_definition(&mut self) -> Result<(), ParseError> {
        let line = self.action_line;
        let token = self.next_non_space();
        let name = self.template_name(token, "define clause")?;
        self.expect(TokenKind::RightDelim, "define clause")?;
        let (list, terminator) = self.item_list("define", line)?;
        if let Terminator::Else = terminator {
            return Err(self.error(line, "unexpected {{else}} in define clause"));
        }
        self.definitions.push((name, list));
        Ok(())
    }

    /// Items up to the matching `{{end}}` or `{{else}}`.
    fn item_list(
        &mut self,
        context: &str,
        open_line: usize,
    ) -> Result<(ListNode, Terminator), ParseError> {
        self.enter(open_line)?;
        let items = self.items(context, open_line);
        self.leave();
        items
    }

    fn items(
        &mut self,
        context: &str,
        open_line: usize,
    ) -> Result<(ListNode, Terminator), ParseError> {
        let mut list = ListNode::default();
        loop {
            let token = self.peek_non_space();
            if token.kind == TokenKind::Eof {
                return Err(self.error(
                    token.line,
                    format!(
                        "unexpected end of input: unclosed {{{{{}}}}} opened at line {}",
                        context, open_line
                    ),
                ));
            }
            match self.text_or_action()? {
                Item::Node(node) => list.push(node),
                Item::End(_) => return Ok((list, Terminator::End)),
                Item::Else(_) => return Ok((list, Terminator::Else)),
            }
        }
    }

    fn text_or_action(&mut self) -> Result<Item, ParseError> {
        let token = self.next_non_space();
        match token.kind {
            TokenKind::Text => Ok(Item::Node(Node::Text(TextNode {
                text: token.text.clone(),
            }))),
            TokenKind::Comment => Ok(Item::Node(Node::Comment(CommentNode {
                text: token.text.clone(),
            }))),
            TokenKind::LeftDelim => {
                self.action_line = token.line;
                self.action()
            }
            _ => Err(self.unexpected(token, "input")),
        }
    }

    /// Control structures and plain pipelines; the left delimiter is consumed.
    fn action(&mut self) -> Result<Item, ParseError> {
        let token = self.next_non_space();
        let line = self.action_line;
        let node = match token.kind {
            TokenKind::Block => self.block_control()?,
            TokenKind::Else => return self.else_control().map(|_| Item::Else(line)),
            TokenKind::End => {
                self.expect(TokenKind::RightDelim, "end")?;
                return Ok(Item::End(line));
            }
            TokenKind::If => Node::If(self.parse_control("if")?),
            TokenKind::Range => Node::Range(self.parse_control("range")?),
            TokenKind::With => Node::With(self.parse_control("with")?),
            TokenKind::Template => self.template_control()?,
            TokenKind::Define => {
                return Err(self.error(line, "{{define}} must appear at the top level"));
            }
            _ => {
                self.backup();
                Node::Action(ActionNode {
                    line,
                    pipe: self.pipeline("command", TokenKind::RightDelim)?,
                })
            }
        };
        Ok(Item::Node(node))
    }

    /// After `{{else`: either `}}`, or `if` / `with` for a chained branch,
    /// which is left unconsumed for the enclosing control.
    fn else_control(&mut self) -> Result<(), ParseError> {
        let token = self.peek_non_space();
        if matches!(token.kind, TokenKind::If | TokenKind::With) {
            return Ok(());
        }
        self.expect(TokenKind::RightDelim, "else")?;
        Ok(())
    }

    fn parse_control(&mut self, context: &'static str) -> Result<BranchNode, ParseError> {
        let line = self.action_line;
        let pipe = self.pipeline(context, TokenKind::RightDelim)?;
        let (list, terminator) = self.item_list(context, line)?;
        let else_list = match terminator {
            Terminator::End => None,
            Terminator::Else => Some(self.else_branch(context, line)?),
        };
        Ok(BranchNode {
            line,
            pipe,
            list,
            else_list,
        })
    }

    /// Body after `{{else}}`. `{{else if ...}}` and `{{else with ...}}` nest a
    /// new branch that shares the outer `{{end}}`.
    fn else_branch(&mut self, context: &'static str, line: usize) -> Result<ListNode, ParseError> {
        let chained = match (context, self.peek().kind) {
            ("if", TokenKind::If) => Some(("if", Node::If as fn(BranchNode) -> Node)),
            ("with", TokenKind::With) => Some(("with", Node::With as fn(BranchNode) -> Node)),
            _ => None,
        };
        let mut list = ListNode::default();
        if let Some((ctx, wrap)) = chained {
            self.next();
            // each `else if` nests one level deeper
            self.enter(self.action_line)?;
            let branch = self.parse_control(ctx);
            self.leave();
            list.push(wrap(branch?));
            return Ok(list);
        }
        let (body, terminator) = self.item_list(context, line)?;
        if let Terminator::Else = terminator {
            return Err(self.error(
                self.action_line,
                format!("expected {{{{end}}}}; found {{{{else}}}} in {}", context),
            ));
        }
        list.nodes = body.nodes;
        Ok(list)
    }

    fn template_control(&mut self) -> Result<Node, ParseError> {
        let line = self.action_line;
        let token = self.next_non_space();
        let name = self.template_name(token, "template clause")?;
        let pipe = if self.next_non_space().kind == TokenKind::RightDelim {
            None
        } else {
            self.backup();
            Some(self.pipeline("template clause", TokenKind::RightDelim)?)
        };
        Ok(Node::Template(TemplateNode { line, name, pipe }))
    }

    /// `{{block "name" pipeline}}body{{end}}` defines `name` and invokes it.
    fn block_control(&mut self) -> Result<Node, ParseError> {
        let line = self.action_line;
        let token = self.next_non_space();
        let name = self.template_name(token, "block clause")?;
        let pipe = self.pipeline("block clause", TokenKind::RightDelim)?;
        let (list, terminator) = self.item_list("block", line)?;
        if let Terminator::Else = terminator {
            return Err(self.error(line, "unexpected {{else}} in block clause"));
        }
        self.definitions.push((name.clone(), list));
        Ok(Node::Template(TemplateNode {
            line,
            name,
            pipe: Some(pipe),
        }))
    }

    fn template_name(&self, token: &Token, context: &str) -> Result<String, ParseError> {
        let decoded = match token.kind {
            TokenKind::String => unquote(&token.text),
            TokenKind::RawString => unquote_raw(&token.text),
            _ => return Err(self.unexpected(token, context)),
        };
        decoded.map_err(|e| self.error(token.line, e))
    }

    /// Pipeline up to `end`, with optional leading declarations.
    fn pipeline(&mut self, context: &'static str, end: TokenKind) -> Result<PipeNode, ParseError> {
        let line = self.peek_non_space().line;
        self.enter(line)?;
        let pipe = self.commands(line, context, end);
        self.leave();
        pipe
    }

    fn commands(
        &mut self,
        line: usize,
        context: &'static str,
        end: TokenKind,
    ) -> Result<PipeNode, ParseError> {
        let mut pipe = PipeNode::new(line, context);
        self.declarations(&mut pipe)?;

        let mut after_pipe = false;
        loop {
            let token = self.next_non_space();
            match token.kind {
                k if k == end => {
                    if after_pipe {
                        return Err(self.error(token.line, format!("missing command after | in {}", context)));
                    }
                    self.check_pipeline(&pipe)?;
                    return Ok(pipe);
                }
                TokenKind::Bool
                | TokenKind::CharConstant
                | TokenKind::Complex
                | TokenKind::Dot
                | TokenKind::Field
                | TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::Nil
                | TokenKind::RawString
                | TokenKind::String
                | TokenKind::Variable
                | TokenKind::LeftParen => {
                    self.backup();
                    let (command, piped) = self.command()?;
                    pipe.commands.push(command);
                    after_pipe = piped;
                }
                _ => return Err(self.unexpected(token, context)),
            }
        }
    }

    /// `$x :=`, `$x =`, and in `range` also `$i, $e :=`.
    fn declarations(&mut self, pipe: &mut PipeNode) -> Result<(), ParseError> {
        loop {
            let token = self.peek_non_space();
            if token.kind != TokenKind::Variable {
                break;
            }
            let mark = self.index;
            self.next();
            let after = self.peek_non_space();
            match after.kind {
                TokenKind::Assign | TokenKind::Declare => {
                    self.next();
                    pipe.is_assign = after.kind == TokenKind::Assign;
                    pipe.decl.push(VariableNode::new(&token.text));
                    return Ok(());
                }
                TokenKind::Char if after.text == "," => {
                    self.next();
                    pipe.decl.push(VariableNode::new(&token.text));
                    if pipe.context == "range" && pipe.decl.len() < 2 {
                        if self.peek_non_space().kind == TokenKind::Variable {
                            continue;
                        }
                        return Err(self.error(after.line, "range can only initialize variables"));
                    }
                    return Err(self.error(
                        after.line,
                        format!("too many declarations in {}", pipe.context),
                    ));
                }
                _ => {
                    self.index = mark;
                    if !pipe.decl.is_empty() {
                        return Err(self.error(token.line, "range can only initialize variables"));
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Every stage after the first receives the previous result, so it must
    /// be something that can run: a function, field, variable or pipeline.
    fn check_pipeline(&self, pipe: &PipeNode) -> Result<(), ParseError> {
        if pipe.commands.is_empty() {
            return Err(self.error(pipe.line, format!("missing value for {}", pipe.context)));
        }
        for (i, command) in pipe.commands.iter().enumerate().skip(1) {
            match command.args.first() {
                Some(
                    Operand::Field(_)
                    | Operand::Variable(_)
                    | Operand::Identifier(_)
                    | Operand::Chain(_)
                    | Operand::Pipe(_),
                ) => {}
                Some(first) => {
                    return Err(self.error(
                        command.line,
                        format!(
                            "non executable command in pipeline stage {}: {}",
                            i + 1,
                            first
                        ),
                    ));
                }
                None => return Err(self.error(command.line, "empty command")),
            }
        }
        Ok(())
    }

    /// Operands separated by spaces. The flag reports whether the command
    /// ended with `|`.
    fn command(&mut self) -> Result<(CommandNode, bool), ParseError> {
        let line = self.peek_non_space().line;
        let mut command = CommandNode {
            line,
            args: Vec::new(),
        };
        let mut piped = false;
        loop {
            self.peek_non_space();
            if let Some(operand) = self.operand()? {
                command.args.push(operand);
            }
            let token = self.next();
            match token.kind {
                TokenKind::Space => continue,
                TokenKind::RightDelim | TokenKind::RightParen => self.backup(),
                TokenKind::Pipe => piped = true,
                _ => return Err(self.unexpected(token, "operand")),
            }
            break;
        }
        if command.args.is_empty() {
            return Err(self.error(line, "empty command"));
        }
        Ok((command, piped))
    }

    /// A term followed by any number of `.Field` selectors.
    fn operand(&mut self) -> Result<Option<Operand>, ParseError> {
        let Some(term) = self.term()? else {
            return Ok(None);
        };
        if self.peek().kind != TokenKind::Field {
            return Ok(Some(term));
        }
        let line = self.peek().line;
        let mut fields = Vec::new();
        while self.peek().kind == TokenKind::Field {
            fields.push(self.next().text[1..].to_string());
        }
        let operand = match term {
            Operand::Field(mut f) => {
                f.idents.extend(fields);
                Operand::Field(f)
            }
            Operand::Variable(mut v) => {
                v.idents.extend(fields);
                Operand::Variable(v)
            }
            Operand::Bool(_)
            | Operand::String(_)
            | Operand::Number(_)
            | Operand::Nil
            | Operand::Dot => {
                return Err(self.error(line, format!("unexpected . after term {:?}", term.to_string())));
            }
            other => Operand::Chain(ChainNode {
                node: Box::new(other),
                fields,
            }),
        };
        Ok(Some(operand))
    }

    fn term(&mut self) -> Result<Option<Operand>, ParseError> {
        let token = self.next_non_space();
        let operand = match token.kind {
            TokenKind::Identifier => Operand::Identifier(IdentifierNode {
                name: token.text.clone(),
            }),
            TokenKind::Dot => Operand::Dot,
            TokenKind::Nil => Operand::Nil,
            TokenKind::Variable => Operand::Variable(VariableNode::new(&token.text)),
            TokenKind::Field => Operand::Field(FieldNode {
                idents: vec![token.text[1..].to_string()],
            }),
            TokenKind::Bool => Operand::Bool(token.text == "true"),
            TokenKind::CharConstant | TokenKind::Complex | TokenKind::Number => {
                let value = match token.kind {
                    TokenKind::CharConstant => parse_char_constant(&token.text),
                    TokenKind::Complex => parse_complex(&token.text),
                    _ => parse_number(&token.text),
                }
                .map_err(|e| self.error(token.line, e))?;
                Operand::Number(NumberNode {
                    text: token.text.clone(),
                    value,
                })
            }
            TokenKind::LeftParen => {
                Operand::Pipe(self.pipeline("parenthesized pipeline", TokenKind::RightParen)?)
            }
            TokenKind::String | TokenKind::RawString => {
                let text = if token.kind == TokenKind::String {
                    unquote(&token.text)
                } else {
                    unquote_raw(&token.text)
                }
                .map_err(|e| self.error(token.line, e))?;
                Operand::String(StringNode {
                    quoted: token.text.clone(),
                    text,
                })
            }
            _ => {
                self.backup();
                return Ok(None);
            }
        };
        Ok(Some(operand))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpl::lexer::lex;

    fn parse_str(src: &str) -> Result<ParsedTemplate, ParseError> {
        parse("test", &lex(src))
    }

    fn round_trip(src: &str) -> String {
        parse_str(src).unwrap().root.to_string()
    }

    #[test]
    fn test_plain_text() {
        let parsed = parse_str("hello").unwrap();
        assert_eq!(
            parsed.root.nodes,
            vec![Node::Text(TextNode {
                text: "hello".into()
            })]
        );
    }

    #[test]
    fn test_action_pipeline() {
        let parsed = parse_str("{{.Name | printf \"%s!\" | upper}}").unwrap();
        let Node::Action(action) = &parsed.root.nodes[0] else {
            panic!("Expected action");
        };
        assert_eq!(action.pipe.commands.len(), 3);
        assert_eq!(
            action.pipe.commands[0].args,
            vec![Operand::Field(FieldNode {
                idents: vec!["Name".into()]
            })]
        );
        assert_eq!(action.pipe.commands[1].args.len(), 2);
    }

    #[test]
    fn test_round_trip() {
        for src in [
            "{{if .a}}A{{else if .b}}B{{else}}C{{end}}",
            "{{range $i, $e := .Items}}{{$i}}={{$e.Name}}{{else}}none{{end}}",
            "{{with $x := .User}}{{$x.Name}}{{end}}",
            "{{template \"row\" .}}",
            "{{(index .M \"k\").Field}}",
            "{{$x = 3}}{{printf \"%d %v\" 1 (len .L)}}",
            "{{1+2i}} {{0x1A}} {{'a'}} {{nil}} {{true}}",
        ] {
            let once = round_trip(src);
            let twice = round_trip(&once);
            assert_eq!(once, twice, "source: {}", src);
        }
        assert_eq!(
            round_trip("{{if .a}}A{{else}}B{{end}}"),
            "{{if .a}}A{{else}}B{{end}}"
        );
    }

    #[test]
    fn test_else_if_nests() {
        let parsed = parse_str("{{if .a}}A{{else if .b}}B{{end}}").unwrap();
        let Node::If(branch) = &parsed.root.nodes[0] else {
            panic!("Expected if");
        };
        let else_list = branch.else_list.as_ref().unwrap();
        assert!(matches!(else_list.nodes[0], Node::If(_)));
    }

    #[test]
    fn test_define_and_block() {
        let parsed =
            parse_str("{{define \"a\"}}A{{end}}x{{block \"b\" .}}B{{end}}").unwrap();
        let names: Vec<_> = parsed.definitions.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(parsed.root.to_string(), "x{{template \"b\" .}}");
    }

    #[test]
    fn test_define_must_be_top_level() {
        let err = parse_str("{{if .a}}{{define \"x\"}}{{end}}{{end}}").unwrap_err();
        assert!(err.message.contains("top level"));
    }

    #[test]
    fn test_unclosed_if_reports_open_line() {
        let err = parse_str("\n{{if .a}}\nbody").unwrap_err();
        assert_eq!(
            err.message,
            "unexpected end of input: unclosed {{if}} opened at line 2"
        );
    }

    #[test]
    fn test_unmatched_end() {
        let err = parse_str("a{{end}}").unwrap_err();
        assert_eq!(err.message, "unmatched {{end}}");
        let err = parse_str("{{else}}").unwrap_err();
        assert_eq!(err.message, "unmatched {{else}}");
    }

    #[test]
    fn test_lexer_error_surfaces() {
        let err = parse_str("{{\"abc}}").unwrap_err();
        assert!(err.message.starts_with("unterminated quoted string"));
        assert_eq!(err.to_string(), format!("test:1: {}", err.message));
    }

    #[test]
    fn test_missing_value() {
        let err = parse_str("{{if}}x{{end}}").unwrap_err();
        assert_eq!(err.message, "missing value for if");
        let err = parse_str("a{{}}b").unwrap_err();
        assert_eq!(err.message, "missing value for command");
        let err = parse_str("{{$x := }}").unwrap_err();
        assert_eq!(err.message, "missing value for command");
        let err = parse_str("{{()}}").unwrap_err();
        assert_eq!(err.message, "missing value for parenthesized pipeline");
        let err = parse_str("{{if .a}}{{else if}}{{end}}").unwrap_err();
        assert_eq!(err.message, "missing value for if");
        let err = parse_str("{{block \"b\"}}x{{end}}").unwrap_err();
        assert_eq!(err.message, "missing value for block clause");
    }

    #[test]
    fn test_deeply_nested_parens() {
        let src = format!("{{{{{}1{}}}}}", "(".repeat(20000), ")".repeat(20000));
        let err = parse_str(&src).unwrap_err();
        assert_eq!(err.message, "max expression depth exceeded");

        let src = format!("{{{{{}1{}}}}}", "(".repeat(50), ")".repeat(50));
        assert!(parse_str(&src).is_ok());
    }

    #[test]
    fn test_deeply_nested_blocks() {
        let src = format!("{}x{}", "{{if 1}}".repeat(20000), "{{end}}".repeat(20000));
        let err = parse_str(&src).unwrap_err();
        assert_eq!(err.message, "max expression depth exceeded");

        let src = format!("{}x{}", "{{with .}}".repeat(50), "{{end}}".repeat(50));
        assert!(parse_str(&src).is_ok());
    }

    #[test]
    fn test_long_else_if_chain() {
        let src = format!("{{{{if 0}}}}{}{{{{end}}}}", "{{else if 0}}".repeat(20000));
        let err = parse_str(&src).unwrap_err();
        assert_eq!(err.message, "max expression depth exceeded");

        let src = format!("{{{{if 0}}}}{}z{{{{end}}}}", "{{else if 0}}".repeat(40));
        assert!(parse_str(&src).is_ok());
    }

    #[test]
    fn test_declarations() {
        let err = parse_str("{{with $a, $b := .}}{{end}}").unwrap_err();
        assert!(err.message.contains("too many declarations in with"));
        let err = parse_str("{{range $a, $b, $c := .}}{{end}}").unwrap_err();
        assert!(err.message.contains("too many declarations in range"));
        assert!(parse_str("{{$a := 1}}{{$a = 2}}").is_ok());
    }

    #[test]
    fn test_non_executable_stage() {
        let err = parse_str("{{.a | \"x\"}}").unwrap_err();
        assert_eq!(
            err.message,
            "non executable command in pipeline stage 2: \"x\""
        );
        let err = parse_str("{{.a |}}").unwrap_err();
        assert!(err.message.contains("missing command after |"));
    }

    #[test]
    fn test_field_after_literal() {
        let err = parse_str("{{\"x\".Y}}").unwrap_err();
        assert!(err.message.starts_with("unexpected . after term"));
    }

    #[test]
    fn test_operands_need_spaces() {
        let err = parse_str("{{(1)(2)}}").unwrap_err();
        assert_eq!(err.message, "unexpected \"(\" in operand");
    }

    #[test]
    fn test_nested_pipeline_and_chain() {
        let parsed = parse_str("{{(.A).B.C}}").unwrap();
        let Node::Action(action) = &parsed.root.nodes[0] else {
            panic!("Expected action");
        };
        let Operand::Chain(chain) = &action.pipe.commands[0].args[0] else {
            panic!("Expected chain");
        };
        assert_eq!(chain.fields, vec!["B", "C"]);
    }

    #[test]
    fn test_number_literals() {
        let parsed = parse_str("{{0x1A}}{{3.14}}{{1+2i}}").unwrap();
        let values: Vec<_> = parsed
            .root
            .nodes
            .iter()
            .map(|n| match n {
                Node::Action(a) => match &a.pipe.commands[0].args[0] {
                    Operand::Number(num) => num.constant(),
                    _ => panic!("Expected number"),
                },
                _ => panic!("Expected action"),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                crate::value::Value::I64(26),
                crate::value::Value::F64(3.14),
                crate::value::Value::Complex(1.0, 2.0)
            ]
        );
        let err = parse_str("\n{{08}}").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "illegal number syntax: \"08\"");
    }

    #[test]
    fn test_raw_string_crlf() {
        let parsed = parse_str("{{`a\r\nb`}}").unwrap();
        let Node::Action(action) = &parsed.root.nodes[0] else {
            panic!("Expected action");
        };
        let Operand::String(s) = &action.pipe.commands[0].args[0] else {
            panic!("Expected string");
        };
        assert_eq!(s.text, "a\nb");
    }
}
