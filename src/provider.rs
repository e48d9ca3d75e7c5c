//! 外部资源提供者
//!
//! The executor never talks to a provider directly. Templates reach it
//! only through the functions [`register`] installs:
//!
//! - `lookup apiVersion kind namespace name` returns the resource as a map,
//!   or an empty map when the provider is unavailable or the resource does
//!   not exist;
//! - `serverVersion` returns the provider's version map;
//! - `clusterAvailable` reports whether the provider can be reached.

use crate::error::BoxError;
use crate::funcs::{FuncResult, FunctionRegistry, arity, to_str};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub type Resource = BTreeMap<String, Value>;

pub trait ResourceProvider: Send + Sync {
    /// `Ok(None)` when the resource does not exist.
    fn lookup(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Resource>, BoxError>;

    fn get_version(&self) -> Result<Resource, BoxError>;

    fn is_available(&self) -> bool;
}

pub fn register(registry: &mut FunctionRegistry, provider: Arc<dyn ResourceProvider>) {
    let p = provider.clone();
    registry.register("lookup", move |args: &[Value]| -> FuncResult {
        arity("lookup", args, 4)?;
        if !p.is_available() {
            debug!("lookup skipped: provider unavailable");
            return Ok(Value::from(Resource::new()));
        }
        let [api_version, kind, namespace, name] = [&args[0], &args[1], &args[2], &args[3]].map(to_str);
        let found = p.lookup(&api_version, &kind, &namespace, &name)?;
        debug!(
            "lookup: api_version={}, kind={}, namespace={}, name={}, found={}",
            api_version,
            kind,
            namespace,
            name,
            found.is_some()
        );
        Ok(Value::from(found.unwrap_or_default()))
    });

    let p = provider.clone();
    registry.register("serverVersion", move |args: &[Value]| -> FuncResult {
        arity("serverVersion", args, 0)?;
        Ok(Value::from(p.get_version()?))
    });

    registry.register("clusterAvailable", move |args: &[Value]| -> FuncResult {
        arity("clusterAvailable", args, 0)?;
        Ok(Value::Bool(provider.is_available()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funcs::Lookup;

    struct StaticProvider {
        available: bool,
    }

    impl ResourceProvider for StaticProvider {
        fn lookup(
            &self,
            _api_version: &str,
            kind: &str,
            namespace: &str,
            name: &str,
        ) -> Result<Option<Resource>, BoxError> {
            match (kind, namespace, name) {
                ("ConfigMap", "prod", "app") => Ok(Some(Resource::from([(
                    "data".to_string(),
                    Value::map(vec![("mode", Value::from("fast"))]),
                )]))),
                ("Secret", _, _) => Err("forbidden".into()),
                _ => Ok(None),
            }
        }

        fn get_version(&self) -> Result<Resource, BoxError> {
            Ok(Resource::from([("major".to_string(), Value::from("1"))]))
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn call(registry: &FunctionRegistry, name: &str, args: &[Value]) -> FuncResult {
        let Lookup::Bound(f) = registry.lookup(name) else {
            panic!("{} not registered", name);
        };
        f.call(args)
    }

    fn args(parts: [&str; 4]) -> Vec<Value> {
        parts.into_iter().map(Value::from).collect()
    }

    #[test]
    fn test_lookup() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry, Arc::new(StaticProvider { available: true }));
        let found = call(&registry, "lookup", &args(["v1", "ConfigMap", "prod", "app"])).unwrap();
        let Value::Map(m) = found else {
            panic!("Expected map");
        };
        assert!(m.contains_key("data"));
        let missing = call(&registry, "lookup", &args(["v1", "ConfigMap", "prod", "x"])).unwrap();
        assert_eq!(missing, Value::map(Vec::<(String, Value)>::new()));
        let err = call(&registry, "lookup", &args(["v1", "Secret", "prod", "x"])).unwrap_err();
        assert_eq!(err.to_string(), "forbidden");
    }

    #[test]
    fn test_unavailable_provider() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry, Arc::new(StaticProvider { available: false }));
        let found = call(&registry, "lookup", &args(["v1", "ConfigMap", "prod", "app"])).unwrap();
        assert_eq!(found.len(), Some(0));
        assert_eq!(call(&registry, "clusterAvailable", &[]).unwrap(), Value::Bool(false));
        let version = call(&registry, "serverVersion", &[]).unwrap();
        assert_eq!(version, Value::map(vec![("major", Value::from("1"))]));
    }
}
