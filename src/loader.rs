use crate::tpl::engine::TemplateFactory;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// 被识别为模板的文件扩展名
pub const TEMPLATE_EXTENSIONS: &[&str] = &["tpl", "tmpl", "gotmpl"];

/// 加载内存中的模板资源，通常由 `embed_templates!` 在编译期生成
pub fn load(factory: &mut TemplateFactory, assets: &[(&str, &str)]) -> Result<()> {
    for (name, source) in assets {
        factory
            .parse_named(name, source)
            .with_context(|| format!("模板解析失败: {}", name))?;
        debug!("load template asset: name={}", name);
    }
    Ok(())
}

/// 递归读取指定目录及其子目录下的所有模板文件，并解析。
///
/// Each file is registered under its path relative to `dir_path`, with `/`
/// separators (`mail/welcome.tpl`). Returns the number of files loaded.
pub fn load_from_path(factory: &mut TemplateFactory, dir_path: &Path) -> Result<usize> {
    let mut loaded = 0;
    for entry in WalkDir::new(dir_path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && is_template(path) {
            let name = template_name(dir_path, path);
            process_template_file(factory, &name, path)?;
            loaded += 1;
        }
    }
    Ok(loaded)
}

fn is_template(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
}

fn template_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn process_template_file(factory: &mut TemplateFactory, name: &str, path: &Path) -> Result<()> {
    let source =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    factory
        .parse_named(name, &source)
        .with_context(|| format!("模板解析失败: {}", path.display()))?;
    debug!("load template file: name={}, path={}", name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_assets() {
        let mut factory = TemplateFactory::new();
        load(&mut factory, &[("a.tpl", "A{{template \"b.tpl\"}}"), ("b.tpl", "B")]).unwrap();
        assert_eq!(factory.render_named("a.tpl", &()).unwrap(), "AB");
    }

    #[test]
    fn test_load_assets_reports_name() {
        let mut factory = TemplateFactory::new();
        let err = load(&mut factory, &[("bad.tpl", "{{end}}")]).unwrap_err();
        assert!(err.to_string().contains("bad.tpl"));
        assert!(!factory.has_template("bad.tpl"));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("mail")).unwrap();
        fs::write(dir.path().join("mail/welcome.tpl"), "Hi {{.}}").unwrap();
        fs::write(dir.path().join("page.tmpl"), "{{define \"footer\"}}--{{end}}P").unwrap();
        fs::write(dir.path().join("notes.txt"), "{{broken").unwrap();

        let mut factory = TemplateFactory::new();
        let loaded = load_from_path(&mut factory, dir.path()).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(factory.template_names(), vec!["footer", "mail/welcome.tpl", "page.tmpl"]);
        assert_eq!(factory.render_named("mail/welcome.tpl", &"Bo").unwrap(), "Hi Bo");
    }
}
