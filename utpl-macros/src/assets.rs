use glob::glob;
use proc_macro::TokenStream;
use quote::quote;
use std::env;
use std::path::{Path, PathBuf};
use syn::{LitStr, parse_macro_input};

pub fn embed_templates_impl(input: TokenStream) -> TokenStream {
    // 1. 解析输入的字符串字面量（glob 模式）
    let pattern = parse_macro_input!(input as LitStr);
    let pattern_str = pattern.value();

    // 2. CARGO_MANIFEST_DIR 指向调用方 crate 的根目录
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return syn::Error::new(pattern.span(), "编译环境异常：未设置 CARGO_MANIFEST_DIR 环境变量")
            .to_compile_error()
            .into();
    };
    let root = PathBuf::from(manifest_dir);
    let full_pattern = root.join(&pattern_str);
    let base = root.join(glob_base(&pattern_str));

    // 3. 查找匹配的文件，按路径排序保证生成顺序稳定
    let mut files: Vec<PathBuf> = match glob(&full_pattern.to_string_lossy()) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect(),
        Err(e) => {
            return syn::Error::new(pattern.span(), format!("无效的 glob 模式: {}", e))
                .to_compile_error()
                .into();
        }
    };
    files.sort();

    // 4. 模板名取相对于模式中非通配部分的路径，内容通过 include_str! 在编译期嵌入
    let assets: Vec<_> = files
        .iter()
        .map(|path| {
            let name = template_name(&base, path);
            let file = path.to_string_lossy().to_string();
            quote! {
                (#name, include_str!(#file))
            }
        })
        .collect();

    let output = quote! {
        &[
            #(#assets),*
        ] as &[(&str, &str)]
    };
    output.into()
}

/// Leading directory components of `pattern` that contain no glob syntax.
fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let components: Vec<_> = Path::new(pattern).components().collect();
    for (i, component) in components.iter().enumerate() {
        let part = component.as_os_str().to_string_lossy();
        if i + 1 == components.len() || part.contains(['*', '?', '[', '{']) {
            break;
        }
        base.push(component);
    }
    base
}

fn template_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
