use crate::error::ParseError;
use crate::tpl::lexer::{self, Delimiters};
use crate::tpl::parser::{self, ParsedTemplate};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CachedTemplate {
    pub parsed: Arc<ParsedTemplate>,
    pub source: Arc<str>,
}

/// 缓存解析结果，按模板名索引，源文本变化时重新解析
///
/// Owned by one factory, so the lexical settings are fixed for every entry.
#[derive(Debug, Default)]
pub(crate) struct ParseCache {
    entries: DashMap<String, CachedTemplate>,
}

impl ParseCache {
    /// Lexes and parses `source`, reusing the previous result for `name`
    /// when the source is unchanged. Failed parses are not cached.
    pub fn get_parsed(
        &self,
        name: &str,
        source: &str,
        delims: &Delimiters,
        keep_comments: bool,
    ) -> Result<Arc<ParsedTemplate>, ParseError> {
        if let Some(cached) = self.entries.get(name) {
            if *cached.source == *source {
                return Ok(cached.parsed.clone());
            }
        }

        let tokens = lexer::lex_with(source, delims, keep_comments);
        let parsed = Arc::new(parser::parse(name, &tokens)?);
        self.entries.insert(
            name.to_string(),
            CachedTemplate {
                parsed: parsed.clone(),
                source: Arc::from(source),
            },
        );
        Ok(parsed)
    }

    /// 卸载模板缓存
    pub fn remove(&self, name: &str) {
        self.entries.remove(name);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
