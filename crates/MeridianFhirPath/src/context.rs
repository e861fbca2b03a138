//! Lexically-scoped variable environments for evaluation.

use std::collections::HashMap;

use crate::value::TypedValue;

/// A variable scope with parent chaining. Contexts are created per nested
/// evaluation (function arguments, `where` criteria, ...) and are never
/// mutated after construction; child scopes borrow their parent.
#[derive(Debug, Default)]
pub struct EvalContext<'a> {
    parent: Option<&'a EvalContext<'a>>,
    variables: HashMap<String, TypedValue>,
}

impl<'a> EvalContext<'a> {
    /// Root scope holding the caller-supplied variables.
    pub fn root(variables: HashMap<String, TypedValue>) -> Self {
        EvalContext {
            parent: None,
            variables,
        }
    }

    /// Child scope layering additional bindings over `self`.
    pub fn child(&'a self, variables: HashMap<String, TypedValue>) -> EvalContext<'a> {
        EvalContext {
            parent: Some(self),
            variables,
        }
    }

    /// Child scope binding a single variable.
    pub fn with_variable(&'a self, name: impl Into<String>, value: TypedValue) -> EvalContext<'a> {
        let mut variables = HashMap::new();
        variables.insert(name.into(), value);
        self.child(variables)
    }

    /// Looks a variable up, walking the parent chain.
    pub fn variable(&self, name: &str) -> Option<&TypedValue> {
        match self.variables.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|p| p.variable(name)),
        }
    }
}
