use std::fmt;

/// 词法单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Plain text outside actions.
    Text,
    LeftDelim,
    RightDelim,
    /// `|`
    Pipe,
    /// `.Name`
    Field,
    /// `$` or `$name`
    Variable,
    Identifier,
    String,
    RawString,
    CharConstant,
    Number,
    Complex,
    Bool,
    LeftParen,
    RightParen,
    /// `=`
    Assign,
    /// `:=`
    Declare,
    Comment,
    /// Any other printable ASCII character inside an action, e.g. `,`.
    Char,
    /// Run of whitespace inside an action; separates operands.
    Space,
    Error,
    Eof,
    // keywords
    Dot,
    Nil,
    If,
    Else,
    End,
    Range,
    With,
    Template,
    Define,
    Block,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Dot
                | TokenKind::Nil
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::End
                | TokenKind::Range
                | TokenKind::With
                | TokenKind::Template
                | TokenKind::Define
                | TokenKind::Block
        )
    }
}

/// 关键字表
pub(crate) fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "." => TokenKind::Dot,
        "nil" => TokenKind::Nil,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "end" => TokenKind::End,
        "range" => TokenKind::Range,
        "with" => TokenKind::With,
        "template" => TokenKind::Template,
        "define" => TokenKind::Define,
        "block" => TokenKind::Block,
        _ => return None,
    })
}

/// A lexed token. `text` is the literal slice of the input (or the error
/// message for [`TokenKind::Error`]); `line` and `column` are 1-based and
/// point at the first character of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize, line: usize, column: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("EOF"),
            TokenKind::Error => f.write_str(&self.text),
            k if k.is_keyword() => write!(f, "<{}>", self.text),
            _ if self.text.chars().count() > 10 => {
                let head: String = self.text.chars().take(10).collect();
                write!(f, "{:?}...", head)
            }
            _ => write!(f, "{:?}", self.text),
        }
    }
}
