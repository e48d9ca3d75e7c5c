mod assets;

use proc_macro::TokenStream;

/// 在编译期嵌入匹配 glob 模式的模板文件
///
/// The pattern is relative to the calling crate's `Cargo.toml`. Expands to
/// a `&[(&str, &str)]` of `(name, source)` pairs, where `name` is the file
/// path relative to the pattern's non-glob prefix:
///
/// ```ignore
/// let assets = utpl::embed_templates!("templates/**/*.tpl");
/// utpl::loader::load(&mut factory, assets)?;
/// ```
#[proc_macro]
pub fn embed_templates(input: TokenStream) -> TokenStream {
    assets::embed_templates_impl(input)
}
