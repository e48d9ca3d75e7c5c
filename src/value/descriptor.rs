use crate::value::Object;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// 类型字段描述：字段顺序 + 模板标识符到字段下标的映射
#[derive(Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    type_name: &'static str,
    fields: Vec<&'static str>,
    lookup: HashMap<String, usize>,
}

impl TypeDescriptor {
    fn new(type_name: &'static str, fields: Vec<&'static str>) -> Self {
        let mut lookup = HashMap::with_capacity(fields.len() * 2);
        for (i, name) in fields.iter().enumerate() {
            lookup.insert(name.to_string(), i);
        }
        // Exact names win over derived aliases.
        for (i, name) in fields.iter().enumerate() {
            lookup.entry(pascal_case(name)).or_insert(i);
        }
        Self {
            type_name,
            fields,
            lookup,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    pub fn resolve(&self, ident: &str) -> Option<usize> {
        self.lookup.get(ident).copied()
    }

    /// 解析出规范字段名，供 [`Object::field`] 调用
    pub fn canonical(&self, ident: &str) -> Option<&'static str> {
        self.resolve(ident).map(|i| self.fields[i])
    }
}

/// 按类型缓存字段描述，首次遇到某类型时构建
pub(crate) static DESCRIPTORS: LazyLock<DashMap<&'static str, Arc<TypeDescriptor>>> =
    LazyLock::new(DashMap::new);

/// Returns the memoised descriptor for `type_name`.
///
/// Instances whose field set differs from the cached one (serde's
/// `skip_serializing_if`, or two types sharing a name) get a private,
/// uncached descriptor.
pub fn describe(type_name: &'static str, fields: &[&'static str]) -> Arc<TypeDescriptor> {
    if let Some(cached) = DESCRIPTORS.get(type_name) {
        if cached.fields == fields {
            return cached.clone();
        }
        return Arc::new(TypeDescriptor::new(type_name, fields.to_vec()));
    }

    let entry = DESCRIPTORS
        .entry(type_name)
        .or_insert_with(|| Arc::new(TypeDescriptor::new(type_name, fields.to_vec())))
        .clone();
    if entry.fields == fields {
        entry
    } else {
        Arc::new(TypeDescriptor::new(type_name, fields.to_vec()))
    }
}

pub fn describe_object(obj: &dyn Object) -> Arc<TypeDescriptor> {
    describe(obj.type_name(), obj.field_names())
}

/// `first_name` / `firstName` -> `FirstName`
pub(crate) fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if c == '_' {
            upper = true;
            continue;
        }
        if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("name"), "Name");
        assert_eq!(pascal_case("first_name"), "FirstName");
        assert_eq!(pascal_case("firstName"), "FirstName");
        assert_eq!(pascal_case("Name"), "Name");
    }

    #[test]
    fn test_describe_is_memoised() {
        let a = describe("DescriptorTestA", &["id", "name"]);
        let b = describe("DescriptorTestA", &["id", "name"]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.resolve("Name"), Some(1));
        assert_eq!(a.canonical("Id"), Some("id"));
    }

    #[test]
    fn test_describe_differing_field_set() {
        let full = describe("DescriptorTestB", &["id", "name"]);
        let partial = describe("DescriptorTestB", &["id"]);
        assert!(!Arc::ptr_eq(&full, &partial));
        assert_eq!(partial.resolve("name"), None);
        // the cached entry is untouched
        let again = describe("DescriptorTestB", &["id", "name"]);
        assert!(Arc::ptr_eq(&full, &again));
    }

    #[test]
    fn test_exact_name_wins_over_alias() {
        let d = describe("DescriptorTestC", &["Name", "name"]);
        assert_eq!(d.resolve("Name"), Some(0));
        assert_eq!(d.resolve("name"), Some(1));
    }

    #[test]
    fn test_concurrent_population() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| describe("DescriptorTestD", &["a", "b"])))
            .collect();
        let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for d in &descriptors[1..] {
            assert!(Arc::ptr_eq(&descriptors[0], d));
        }
    }
}
