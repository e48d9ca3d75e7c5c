use crate::value::Value;
use std::collections::HashMap;

/// 执行期变量表
///
/// Variables live in one flat table for the whole execution. `range` saves
/// the bindings it is about to overwrite and puts them back when the loop
/// ends, whichever way it ends.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    vars: HashMap<String, Value>,
}

/// Bindings captured by [`Scope::save`]; `None` marks a name that was unbound.
#[derive(Debug)]
pub(crate) struct Saved(Vec<(String, Option<Value>)>);

impl Scope {
    pub fn new(root: Value) -> Self {
        let mut scope = Self::default();
        scope.declare("$", root);
        scope
    }

    /// `:=` always (re)binds.
    pub fn declare(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// `=` only updates an existing binding; returns `false` if there is none.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.vars.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn save<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> Saved {
        Saved(
            names
                .into_iter()
                .map(|n| (n.to_string(), self.vars.get(n).cloned()))
                .collect(),
        )
    }

    pub fn restore(&mut self, saved: Saved) {
        // reverse, so a name saved twice ends at its earliest value
        for (name, value) in saved.0.into_iter().rev() {
            match value {
                Some(v) => {
                    self.vars.insert(name, v);
                }
                None => {
                    self.vars.remove(&name);
                }
            }
        }
    }
}
