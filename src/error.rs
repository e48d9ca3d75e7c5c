use thiserror::Error;

/// 注册函数、对象访问器可能返回的任意错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = TemplateError> = std::result::Result<T, E>;

/// 模板解析错误：词法错误与语法结构错误都会落到这里
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{template}:{line}: {message}")]
pub struct ParseError {
    pub template: String,
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(template: &str, line: usize, message: impl Into<String>) -> Self {
        Self {
            template: template.to_string(),
            line,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the template engine.
///
/// Callers can tell apart "the source was invalid" ([`TemplateError::Parse`]),
/// "no such template" ([`TemplateError::NotFound`]) and "the template failed
/// while running" ([`TemplateError::Execution`]). Output sink failures are
/// passed through unchanged as [`TemplateError::Io`].
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template: {0}")]
    Parse(ParseError),
    #[error("template: no template named {0:?}")]
    NotFound(String),
    #[error("template: {template}:{line}: {message}")]
    Execution {
        template: String,
        line: usize,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TemplateError {
    pub fn execution(template: &str, line: usize, message: impl Into<String>) -> Self {
        TemplateError::Execution {
            template: template.to_string(),
            line,
            message: message.into(),
            source: None,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, TemplateError::Parse(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TemplateError::NotFound(_))
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, TemplateError::Execution { .. })
    }
}

impl From<ParseError> for TemplateError {
    fn from(e: ParseError) -> Self {
        TemplateError::Parse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_parse_error_display() {
        let err = TemplateError::from(ParseError::new("page", 3, "unexpected EOF"));
        assert_eq!(err.to_string(), "template: page:3: unexpected EOF");
        assert!(err.is_parse());
    }

    #[test]
    fn test_parse_error_is_std_error() {
        let err = ParseError::new("page", 7, "missing value for if");
        assert_eq!(err.to_string(), "page:7: missing value for if");
        let boxed: BoxError = Box::new(err.clone());
        assert_eq!(boxed.to_string(), err.to_string());
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_execution_error_keeps_source() {
        let cause: BoxError = "boom".into();
        let err = TemplateError::Execution {
            template: "page".into(),
            line: 2,
            message: "error calling fail: boom".into(),
            source: Some(cause),
        };
        assert!(err.is_execution());
        assert_eq!(err.to_string(), "template: page:2: error calling fail: boom");
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
    }
}
