pub mod ast;
mod cache;
pub(crate) mod chars;
pub mod engine;
pub mod lexer;
pub(crate) mod literal;
pub mod parser;
mod render;
mod render_context;
pub mod token;
