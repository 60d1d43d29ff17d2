use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Shared handle to a scope. Closures keep their defining scope alive through it.
pub type Env = Rc<RefCell<Environment>>;

/// One scope of bindings plus the scope it is nested in.
///
/// A new scope is made for the session and for each function call; blocks reuse
/// the scope they appear in.
#[derive(Debug, Default)]
pub struct Environment {
    store: HashMap<String, Value>,
    outer: Option<Env>,
}

impl Environment {
    pub fn new_global() -> Env {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// A fresh scope whose lookups fall back to `outer`.
    pub fn new_enclosed(outer: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }))
    }

    /// Look a name up here, then in each enclosing scope.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.store.get(name) {
            Some(value.clone())
        } else if let Some(ref outer) = self.outer {
            outer.borrow().get(name)
        } else {
            None
        }
    }

    /// Bind in this scope, shadowing any binding of the same name further out.
    pub fn set(&mut self, name: String, value: Value) {
        self.store.insert(name, value);
    }

    /// Drop every binding in `scope`. The store is taken out before it is
    /// dropped, so closures released here never see `scope` borrowed.
    pub fn release(scope: &Env) {
        let bindings = std::mem::take(&mut scope.borrow_mut().store);
        drop(bindings);
    }

    /// Whether `env` is `scope` or nested somewhere inside it.
    fn is_within(env: &Env, scope: &Env) -> bool {
        let mut current = Rc::clone(env);
        loop {
            if Rc::ptr_eq(&current, scope) {
                return true;
            }
            let outer = current.borrow().outer.clone();
            match outer {
                Some(outer) => current = outer,
                None => return false,
            }
        }
    }
}

/// Whether a binding in `scope` holds a closure defined in `scope` or in a
/// scope nested inside it, which makes `scope` reference itself.
pub fn holds_own_closure(scope: &Env) -> bool {
    fn closes_over(value: &Value, scope: &Env) -> bool {
        match value {
            Value::Function(function) => Environment::is_within(&function.env, scope),
            Value::Array(elements) => elements.iter().any(|element| closes_over(element, scope)),
            Value::Hash(pairs) => pairs.values().any(|pair| closes_over(&pair.value, scope)),
            _ => false,
        }
    }

    let current = scope.borrow();
    let holds = current.store.values().any(|value| closes_over(value, scope));
    holds
}

/// Whether `scope` can still be reached from `value`, through closures and
/// every binding those closures can see.
pub fn reachable_from(value: &Value, scope: &Env) -> bool {
    let mut seen = HashSet::new();
    value_reaches(value, scope, &mut seen)
}

fn value_reaches(value: &Value, scope: &Env, seen: &mut HashSet<*const RefCell<Environment>>) -> bool {
    match value {
        Value::Function(function) => env_reaches(&function.env, scope, seen),
        Value::Array(elements) => elements
            .iter()
            .any(|element| value_reaches(element, scope, seen)),
        Value::Hash(pairs) => pairs
            .values()
            .any(|pair| value_reaches(&pair.value, scope, seen)),
        _ => false,
    }
}

fn env_reaches(env: &Env, scope: &Env, seen: &mut HashSet<*const RefCell<Environment>>) -> bool {
    if Rc::ptr_eq(env, scope) {
        return true;
    }
    if !seen.insert(Rc::as_ptr(env)) {
        return false;
    }

    let current = env.borrow();
    if let Some(outer) = &current.outer {
        if env_reaches(outer, scope, seen) {
            return true;
        }
    }
    let reaches = current
        .store
        .values()
        .any(|value| value_reaches(value, scope, seen));
    reaches
}
