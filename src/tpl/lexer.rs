//! 模板词法分析
//!
//! The lexer is a small state machine: every state is a plain function that
//! consumes some input, pushes tokens and returns the next state, or `None`
//! once input is exhausted or an error token has been produced. An error
//! token is always the last token of the stream.

use crate::tpl::chars::{
    is_alphanumeric, is_binary_digit, is_decimal_digit, is_hex_digit, is_newline, is_octal_digit,
    is_space, is_visible_ascii, left_trim_len, right_trim_len,
};
use crate::tpl::token::{Token, TokenKind, keyword};

pub const DEFAULT_LEFT_DELIM: &str = "{{";
pub const DEFAULT_RIGHT_DELIM: &str = "}}";
pub const DEFAULT_LEFT_COMMENT: &str = "/*";
pub const DEFAULT_RIGHT_COMMENT: &str = "*/";

const TRIM_MARKER: char = '-';
/// Trim marker plus the mandatory whitespace next to it.
const TRIM_MARKER_LEN: usize = 2;

/// 动作与注释的定界符
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
    pub left_comment: String,
    pub right_comment: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: DEFAULT_LEFT_DELIM.to_string(),
            right: DEFAULT_RIGHT_DELIM.to_string(),
            left_comment: DEFAULT_LEFT_COMMENT.to_string(),
            right_comment: DEFAULT_RIGHT_COMMENT.to_string(),
        }
    }
}

impl Delimiters {
    /// Empty strings fall back to `{{` / `}}`.
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: or_default(left, DEFAULT_LEFT_DELIM),
            right: or_default(right, DEFAULT_RIGHT_DELIM),
            ..Default::default()
        }
    }

    pub fn comments(mut self, left: &str, right: &str) -> Self {
        self.left_comment = or_default(left, DEFAULT_LEFT_COMMENT);
        self.right_comment = or_default(right, DEFAULT_RIGHT_COMMENT);
        self
    }
}

fn or_default(s: &str, default: &str) -> String {
    if s.is_empty() { default } else { s }.to_string()
}

/// Lexes `input` with the default delimiters, dropping comments.
pub fn lex(input: &str) -> Vec<Token> {
    lex_with(input, &Delimiters::default(), false)
}

pub fn lex_with(input: &str, delims: &Delimiters, keep_comments: bool) -> Vec<Token> {
    let mut lexer = Lexer {
        input,
        delims,
        keep_comments,
        pos: 0,
        start: 0,
        width: 0,
        line: 1,
        line_start: 0,
        paren_depth: 0,
        tokens: Vec::new(),
    };
    let mut state = Some(StateFn(lex_text));
    while let Some(StateFn(f)) = state {
        state = f(&mut lexer);
    }
    lexer.tokens
}

struct StateFn(fn(&mut Lexer<'_>) -> Option<StateFn>);

struct Lexer<'a> {
    input: &'a str,
    delims: &'a Delimiters,
    keep_comments: bool,
    pos: usize,
    start: usize,
    /// Width of the last char read by `next`, for `backup`.
    width: usize,
    /// Line of `start`.
    line: usize,
    line_start: usize,
    paren_depth: isize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn next(&mut self) -> Option<char> {
        let c = self.rest().chars().next();
        self.width = c.map_or(0, char::len_utf8);
        self.pos += self.width;
        c
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn backup(&mut self) {
        self.pos -= self.width;
        self.width = 0;
    }

    fn accept(&mut self, pred: impl Fn(char) -> bool) -> bool {
        match self.next() {
            Some(c) if pred(c) => true,
            _ => {
                self.backup();
                false
            }
        }
    }

    fn accept_any(&mut self, valid: &str) -> bool {
        self.accept(|c| valid.contains(c))
    }

    fn accept_run(&mut self, pred: impl Fn(char) -> bool) {
        while self.accept(&pred) {}
    }

    fn column(&self) -> usize {
        self.input[self.line_start..self.start].chars().count() + 1
    }

    fn this_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            &self.input[self.start..self.pos],
            self.start,
            self.line,
            self.column(),
        )
    }

    /// Skips over the pending input, keeping line tracking in step.
    fn ignore(&mut self) {
        let consumed = &self.input[self.start..self.pos];
        for (i, c) in consumed.char_indices() {
            if is_newline(c) {
                self.line += 1;
                self.line_start = self.start + i + 1;
            }
        }
        self.start = self.pos;
    }

    fn emit(&mut self, kind: TokenKind) {
        let token = self.this_token(kind);
        self.tokens.push(token);
        self.ignore();
    }

    fn error(&mut self, message: impl AsRef<str>) -> Option<StateFn> {
        let column = self.column();
        let text = format!(
            "{} at line {}, column {}",
            message.as_ref(),
            self.line,
            column
        );
        self.tokens
            .push(Token::new(TokenKind::Error, text, self.start, self.line, column));
        None
    }

    /// Reports whether the input continues with the right delimiter, and
    /// whether that delimiter carries a trim marker.
    fn at_right_delim(&self) -> (bool, bool) {
        let rest = self.rest();
        let right = self.delims.right.as_str();
        if has_right_trim_marker(rest) && rest[TRIM_MARKER_LEN..].starts_with(right) {
            return (true, true);
        }
        (rest.starts_with(right), false)
    }

    /// Whether the next char may legally follow an identifier or field.
    fn at_terminator(&self) -> bool {
        let Some(c) = self.peek() else {
            return true;
        };
        if is_space(c) || matches!(c, '.' | ',' | '|' | ':' | ')' | '(') {
            return true;
        }
        self.rest().starts_with(self.delims.right.as_str())
    }

    fn scan_number(&mut self) -> bool {
        let mut digits: fn(char) -> bool = |c| c == '_' || is_decimal_digit(c);
        let mut decimal = true;
        let mut hex = false;
        self.accept_any("+-");
        if self.accept_any("0") {
            if self.accept_any("xX") {
                digits = |c| c == '_' || is_hex_digit(c);
                decimal = false;
                hex = true;
            } else if self.accept_any("oO") {
                digits = |c| c == '_' || is_octal_digit(c);
                decimal = false;
            } else if self.accept_any("bB") {
                digits = |c| c == '_' || is_binary_digit(c);
                decimal = false;
            }
        }
        self.accept_run(digits);
        if self.accept_any(".") {
            self.accept_run(digits);
        }
        if decimal && self.accept_any("eE") {
            self.accept_any("+-");
            self.accept_run(|c| c == '_' || is_decimal_digit(c));
        }
        if hex && self.accept_any("pP") {
            self.accept_any("+-");
            self.accept_run(|c| c == '_' || is_decimal_digit(c));
        }
        self.accept_any("i");
        if self.peek().is_some_and(is_alphanumeric) {
            self.next();
            return false;
        }
        true
    }
}

fn has_left_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some(TRIM_MARKER) && chars.next().is_some_and(is_space)
}

fn has_right_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_space) && chars.next() == Some(TRIM_MARKER)
}

fn describe_char(c: Option<char>) -> String {
    match c {
        Some(c) => format!("U+{:04X} {:?}", c as u32, c),
        None => "EOF".to_string(),
    }
}

fn lex_text(l: &mut Lexer<'_>) -> Option<StateFn> {
    let left = l.delims.left.as_str();
    if let Some(x) = l.rest().find(left) {
        if x > 0 {
            l.pos += x;
            let trim = if has_left_trim_marker(&l.input[l.pos + left.len()..]) {
                right_trim_len(&l.input[l.start..l.pos])
            } else {
                0
            };
            l.pos -= trim;
            if l.pos > l.start {
                l.emit(TokenKind::Text);
            }
            l.pos += trim;
            l.ignore();
        }
        return Some(StateFn(lex_left_delim));
    }
    l.pos = l.input.len();
    if l.pos > l.start {
        l.emit(TokenKind::Text);
    }
    l.emit(TokenKind::Eof);
    None
}

fn lex_left_delim(l: &mut Lexer<'_>) -> Option<StateFn> {
    l.pos += l.delims.left.len();
    let trim = has_left_trim_marker(l.rest());
    let after_marker = if trim { TRIM_MARKER_LEN } else { 0 };
    let left_comment = l.delims.left_comment.as_str();
    if !left_comment.is_empty() && l.rest()[after_marker..].starts_with(left_comment) {
        l.pos += after_marker;
        l.ignore();
        return Some(StateFn(lex_comment));
    }
    let token = l.this_token(TokenKind::LeftDelim);
    l.tokens.push(token);
    l.pos += after_marker;
    l.ignore();
    l.paren_depth = 0;
    Some(StateFn(lex_inside_action))
}

fn lex_comment(l: &mut Lexer<'_>) -> Option<StateFn> {
    l.pos += l.delims.left_comment.len();
    let right_comment = l.delims.right_comment.as_str();
    let Some(x) = l.rest().find(right_comment) else {
        return l.error("unclosed comment");
    };
    l.pos += x + right_comment.len();
    let (delim, trim) = l.at_right_delim();
    if !delim {
        return l.error("comment ends before closing delimiter");
    }
    let token = l.this_token(TokenKind::Comment);
    if trim {
        l.pos += TRIM_MARKER_LEN;
    }
    l.pos += l.delims.right.len();
    if trim {
        l.pos += left_trim_len(l.rest());
    }
    l.ignore();
    if l.keep_comments {
        l.tokens.push(token);
    }
    Some(StateFn(lex_text))
}

fn lex_right_delim(l: &mut Lexer<'_>) -> Option<StateFn> {
    let (_, trim) = l.at_right_delim();
    if trim {
        l.pos += TRIM_MARKER_LEN;
        l.ignore();
    }
    l.pos += l.delims.right.len();
    let token = l.this_token(TokenKind::RightDelim);
    l.tokens.push(token);
    if trim {
        l.pos += left_trim_len(l.rest());
    }
    l.ignore();
    Some(StateFn(lex_text))
}

fn lex_inside_action(l: &mut Lexer<'_>) -> Option<StateFn> {
    let (delim, _) = l.at_right_delim();
    if delim {
        if l.paren_depth == 0 {
            return Some(StateFn(lex_right_delim));
        }
        return l.error("unclosed left paren");
    }
    let Some(c) = l.next() else {
        return l.error("unclosed action");
    };
    match c {
        c if is_space(c) => {
            l.backup();
            return Some(StateFn(lex_space));
        }
        '=' => l.emit(TokenKind::Assign),
        ':' => {
            if l.next() != Some('=') {
                return l.error("expected :=");
            }
            l.emit(TokenKind::Declare);
        }
        '|' => l.emit(TokenKind::Pipe),
        '"' => return Some(StateFn(lex_quote)),
        '`' => return Some(StateFn(lex_raw_quote)),
        '$' => return Some(StateFn(lex_variable)),
        '\'' => return Some(StateFn(lex_char)),
        '.' => {
            if l.peek().is_some_and(is_decimal_digit) {
                l.backup();
                return Some(StateFn(lex_number));
            }
            return Some(StateFn(lex_field));
        }
        '+' | '-' | '0'..='9' => {
            l.backup();
            return Some(StateFn(lex_number));
        }
        c if is_alphanumeric(c) => {
            l.backup();
            return Some(StateFn(lex_identifier));
        }
        '(' => {
            l.emit(TokenKind::LeftParen);
            l.paren_depth += 1;
        }
        ')' => {
            l.paren_depth -= 1;
            if l.paren_depth < 0 {
                return l.error("unexpected right paren");
            }
            l.emit(TokenKind::RightParen);
        }
        c if is_visible_ascii(c) => l.emit(TokenKind::Char),
        c => {
            return l.error(format!(
                "unrecognized character in action: {}",
                describe_char(Some(c))
            ));
        }
    }
    Some(StateFn(lex_inside_action))
}

fn lex_space(l: &mut Lexer<'_>) -> Option<StateFn> {
    let mut spaces = 0;
    while l.peek().is_some_and(is_space) {
        l.next();
        spaces += 1;
    }
    // " -}}" closes the action; its leading space belongs to the marker.
    let marker = &l.input[l.pos - 1..];
    if has_right_trim_marker(marker) && marker[TRIM_MARKER_LEN..].starts_with(l.delims.right.as_str())
    {
        l.backup();
        if spaces == 1 {
            return Some(StateFn(lex_right_delim));
        }
    }
    l.emit(TokenKind::Space);
    Some(StateFn(lex_inside_action))
}

fn lex_identifier(l: &mut Lexer<'_>) -> Option<StateFn> {
    l.accept_run(is_alphanumeric);
    if !l.at_terminator() {
        return l.error(format!("bad character {}", describe_char(l.peek())));
    }
    let word = &l.input[l.start..l.pos];
    let kind = match keyword(word) {
        Some(kind) => kind,
        None if word == "true" || word == "false" => TokenKind::Bool,
        None => TokenKind::Identifier,
    };
    l.emit(kind);
    Some(StateFn(lex_inside_action))
}

fn lex_field(l: &mut Lexer<'_>) -> Option<StateFn> {
    lex_field_or_variable(l, TokenKind::Field)
}

fn lex_variable(l: &mut Lexer<'_>) -> Option<StateFn> {
    lex_field_or_variable(l, TokenKind::Variable)
}

/// Lexes `.Name` or `$name`; a bare `.` is the dot and a bare `$` the root
/// variable.
fn lex_field_or_variable(l: &mut Lexer<'_>, kind: TokenKind) -> Option<StateFn> {
    if l.at_terminator() {
        l.emit(if kind == TokenKind::Variable {
            TokenKind::Variable
        } else {
            TokenKind::Dot
        });
        return Some(StateFn(lex_inside_action));
    }
    l.accept_run(is_alphanumeric);
    if !l.at_terminator() {
        return l.error(format!("bad character {}", describe_char(l.peek())));
    }
    l.emit(kind);
    Some(StateFn(lex_inside_action))
}

fn lex_char(l: &mut Lexer<'_>) -> Option<StateFn> {
    loop {
        match l.next() {
            Some('\\') => match l.next() {
                Some(c) if c != '\n' => {}
                _ => return l.error("unterminated character constant"),
            },
            None | Some('\n') => return l.error("unterminated character constant"),
            Some('\'') => break,
            Some(_) => {}
        }
    }
    l.emit(TokenKind::CharConstant);
    Some(StateFn(lex_inside_action))
}

fn lex_number(l: &mut Lexer<'_>) -> Option<StateFn> {
    if !l.scan_number() {
        let text = &l.input[l.start..l.pos];
        return l.error(format!("bad number syntax: {:?}", text));
    }
    if matches!(l.peek(), Some('+' | '-')) {
        // complex: 1+2i
        if !l.scan_number() || !l.input[..l.pos].ends_with('i') {
            let text = &l.input[l.start..l.pos];
            return l.error(format!("bad number syntax: {:?}", text));
        }
        l.emit(TokenKind::Complex);
    } else {
        l.emit(TokenKind::Number);
    }
    Some(StateFn(lex_inside_action))
}

fn lex_quote(l: &mut Lexer<'_>) -> Option<StateFn> {
    loop {
        match l.next() {
            Some('\\') => match l.next() {
                Some(c) if c != '\n' => {}
                _ => return l.error("unterminated quoted string"),
            },
            None | Some('\n') => return l.error("unterminated quoted string"),
            Some('"') => break,
            Some(_) => {}
        }
    }
    l.emit(TokenKind::String);
    Some(StateFn(lex_inside_action))
}

fn lex_raw_quote(l: &mut Lexer<'_>) -> Option<StateFn> {
    loop {
        match l.next() {
            None => return l.error("unterminated raw quoted string"),
            Some('`') => break,
            Some(_) => {}
        }
    }
    l.emit(TokenKind::RawString);
    Some(StateFn(lex_inside_action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use TokenKind::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_text_and_field() {
        let tokens = lex("hello {{.Name}}!");
        assert_eq!(
            kinds(&tokens),
            vec![Text, LeftDelim, Field, RightDelim, Text, Eof]
        );
        assert_eq!(texts(&tokens), vec!["hello ", "{{", ".Name", "}}", "!", ""]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(&lex("")), vec![Eof]);
    }

    #[test]
    fn test_pipeline_keeps_spaces() {
        let tokens = lex("{{.x | printf \"%d\" $y}}");
        assert_eq!(
            kinds(&tokens),
            vec![
                LeftDelim, Field, Space, Pipe, Space, Identifier, Space, String, Space, Variable,
                RightDelim, Eof
            ]
        );
    }

    #[test]
    fn test_keywords_and_declarations() {
        let tokens = lex("{{range $i, $e := .}}{{else}}{{end}}");
        assert_eq!(
            kinds(&tokens),
            vec![
                LeftDelim, Range, Space, Variable, Char, Space, Variable, Space, Declare, Space,
                Dot, RightDelim, LeftDelim, Else, RightDelim, LeftDelim, End, RightDelim, Eof
            ]
        );
        let tokens = lex("{{$x = nil}}{{true}}");
        assert_eq!(
            kinds(&tokens),
            vec![
                LeftDelim, Variable, Space, Assign, Space, Nil, RightDelim, LeftDelim, Bool,
                RightDelim, Eof
            ]
        );
    }

    #[test]
    fn test_trim_markers() {
        let tokens = lex("a  {{- 3 -}}  b");
        assert_eq!(
            kinds(&tokens),
            vec![Text, LeftDelim, Number, RightDelim, Text, Eof]
        );
        assert_eq!(texts(&tokens), vec!["a", "{{", "3", "}}", "b", ""]);

        // whitespace-only text between trimmed actions disappears
        let tokens = lex("{{1}} \n {{- 2}}");
        assert_eq!(
            kinds(&tokens),
            vec![LeftDelim, Number, RightDelim, LeftDelim, Number, RightDelim, Eof]
        );
    }

    #[test]
    fn test_minus_without_space_is_not_a_marker() {
        let tokens = lex("{{-3}}");
        assert_eq!(kinds(&tokens), vec![LeftDelim, Number, RightDelim, Eof]);
        assert_eq!(tokens[1].text, "-3");
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("{{0x1A 3.14 1+2i 'a' .5 1e3 0b101}}");
        let numbers: Vec<_> = tokens
            .iter()
            .filter(|t| !matches!(t.kind, Space | LeftDelim | RightDelim | Eof))
            .map(|t| (t.kind, t.text.as_str()))
            .collect();
        assert_eq!(
            numbers,
            vec![
                (Number, "0x1A"),
                (Number, "3.14"),
                (Complex, "1+2i"),
                (CharConstant, "'a'"),
                (Number, ".5"),
                (Number, "1e3"),
                (Number, "0b101"),
            ]
        );
    }

    #[test]
    fn test_bad_number() {
        let tokens = lex("{{3k}}");
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, Error);
        assert!(last.text.starts_with("bad number syntax: \"3k\""));
    }

    #[test]
    fn test_comments() {
        let tokens = lex("a{{/* c */}}b");
        assert_eq!(kinds(&tokens), vec![Text, Text, Eof]);

        let tokens = lex_with("a {{- /* c */ -}} b", &Delimiters::default(), true);
        assert_eq!(kinds(&tokens), vec![Text, Comment, Text, Eof]);
        assert_eq!(texts(&tokens), vec!["a", "/* c */", "b", ""]);
    }

    #[test]
    fn test_comment_errors() {
        let tokens = lex("{{/* c */ .x}}");
        assert!(
            tokens
                .last()
                .unwrap()
                .text
                .starts_with("comment ends before closing delimiter")
        );
        let tokens = lex("{{/* c ");
        assert!(tokens.last().unwrap().text.starts_with("unclosed comment"));
    }

    #[test]
    fn test_error_position() {
        let tokens = lex("a\n{{ \"abc}}");
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, Error);
        assert_eq!(last.text, "unterminated quoted string at line 2, column 4");
        assert_eq!(tokens.iter().filter(|t| t.kind == Error).count(), 1);
    }

    #[test]
    fn test_unclosed_action() {
        let tokens = lex("{{.x");
        assert!(tokens.last().unwrap().text.starts_with("unclosed action"));
        let tokens = lex("{{(.x}}");
        assert!(tokens.last().unwrap().text.starts_with("unclosed left paren"));
        let tokens = lex("{{.x)}}");
        assert!(tokens.last().unwrap().text.starts_with("unexpected right paren"));
    }

    #[test]
    fn test_bad_character() {
        let tokens = lex("{{.x#}}");
        assert!(tokens.last().unwrap().text.starts_with("bad character U+0023 '#'"));
    }

    #[test]
    fn test_line_and_column() {
        let tokens = lex("ab\ncd{{ .x }}\n{{`raw\nstring`}}{{.y}}");
        let field = tokens.iter().find(|t| t.kind == Field).unwrap();
        assert_eq!((field.line, field.column), (2, 6));
        let y = tokens.iter().rfind(|t| t.kind == Field).unwrap();
        assert_eq!(y.text, ".y");
        assert_eq!((y.line, y.column), (4, 12));
    }

    #[test]
    fn test_custom_delimiters() {
        let delims = Delimiters::new("<<", ">>");
        let tokens = lex_with("{{x}} <<.y>>", &delims, false);
        assert_eq!(kinds(&tokens), vec![Text, LeftDelim, Field, RightDelim, Eof]);
        assert_eq!(tokens[0].text, "{{x}} ");
    }

    proptest! {
        #[test]
        fn prop_tokens_reproduce_input(pieces in prop::collection::vec(
            prop::sample::select(vec![
                "plain text", " ", "\n", "{{.Name}}", "{{ $x := 1 }}", "{{if .a}}",
                "{{else}}", "{{end}}", "{{range $i, $e := .L}}", "{{printf \"%d\" 3}}",
                "{{ .a | len }}", "{{`raw`}}", "{{(1+2i)}}", "-", "é",
            ]),
            0..12,
        )) {
            let input: std::string::String = pieces.concat();
            let tokens = lex(&input);
            let rebuilt: std::string::String = tokens.iter().map(|t| t.text.as_str()).collect();
            prop_assert_eq!(rebuilt, input);
        }

        /// With trim markers and comments the tokens no longer cover the
        /// whole input. Dropped: the `- ` / ` -` markers, the whitespace they
        /// elide from neighbouring text, and the delimiters around a comment.
        /// The comment itself survives only when comments are kept.
        #[test]
        fn prop_tokens_reproduce_input_minus_trimmed_spans(
            pieces in prop::collection::vec(prop::sample::select(TRIM_PIECES.to_vec()), 0..12),
            keep_comments in any::<bool>(),
        ) {
            let input: std::string::String = pieces.iter().map(|p| p.source).collect();
            let tokens = lex_with(&input, &Delimiters::default(), keep_comments);
            prop_assert!(tokens.iter().all(|t| t.kind != Error));
            let rebuilt: std::string::String = tokens.iter().map(|t| t.text.as_str()).collect();
            prop_assert_eq!(rebuilt, expected_tokens_text(&pieces, keep_comments));
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct Piece {
        source: &'static str,
        kept: &'static str,
        text: bool,
        comment: bool,
        trim_left: bool,
        trim_right: bool,
    }

    const fn text(source: &'static str) -> Piece {
        Piece { source, kept: source, text: true, comment: false, trim_left: false, trim_right: false }
    }

    const fn action(source: &'static str, kept: &'static str, trim_left: bool, trim_right: bool) -> Piece {
        Piece { source, kept, text: false, comment: false, trim_left, trim_right }
    }

    const fn comment(source: &'static str, trim_left: bool, trim_right: bool) -> Piece {
        Piece { source, kept: "/* c */", text: false, comment: true, trim_left, trim_right }
    }

    const TRIM_PIECES: [Piece; 12] = [
        text("plain"),
        text(" "),
        text("\n\t"),
        text("a b \r\n"),
        action("{{.Name}}", "{{.Name}}", false, false),
        action("{{- .Name -}}", "{{.Name}}", true, true),
        action("{{- .Name}}", "{{.Name}}", true, false),
        action("{{ .Name -}}", "{{ .Name}}", false, true),
        action("{{-3}}", "{{-3}}", false, false),
        comment("{{/* c */}}", false, false),
        comment("{{- /* c */ -}}", true, true),
        comment("{{/* c */ -}}", false, true),
    ];

    /// Adjacent text pieces form one run; a trimming neighbour strips the
    /// run's whitespace on that side.
    fn expected_tokens_text(pieces: &[Piece], keep_comments: bool) -> std::string::String {
        let mut out = std::string::String::new();
        let mut run = std::string::String::new();
        let mut trim_next_run = false;
        for piece in pieces {
            if piece.text {
                run.push_str(piece.source);
                continue;
            }
            let mut kept: &str = &run;
            if trim_next_run {
                kept = kept.trim_start_matches(crate::tpl::chars::SPACE_CHARS);
            }
            if piece.trim_left {
                kept = kept.trim_end_matches(crate::tpl::chars::SPACE_CHARS);
            }
            out.push_str(kept);
            run.clear();
            if !piece.comment || keep_comments {
                out.push_str(piece.kept);
            }
            trim_next_run = piece.trim_right;
        }
        let mut kept: &str = &run;
        if trim_next_run {
            kept = kept.trim_start_matches(crate::tpl::chars::SPACE_CHARS);
        }
        out.push_str(kept);
        out
    }
}
