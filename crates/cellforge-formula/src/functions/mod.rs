//! Built-in function registry.
//!
//! A [`FunctionSpec`] is the `'static`, `Copy` descriptor a parsed
//! [`crate::ast::TExpr::Call`] node carries around: name, arity, volatility,
//! and a bare `fn` pointer. Looking one up from a formula's surface name
//! happens once, at parse time, via [`lookup`].

pub mod criteria;
pub mod date;
pub mod financial;
pub mod info;
pub mod logical;
pub mod lookup_fns;
pub mod math;
pub mod statistical;
pub mod text;

use std::sync::OnceLock;

use ahash::AHashMap;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

pub type FunctionEval = fn(&[Value], &EvaluationContext) -> FormulaResult<Value>;

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Range(lo, hi) => n >= lo && n <= hi,
        }
    }

    pub fn describe(self) -> String {
        match self {
            Arity::Exact(k) => k.to_string(),
            Arity::AtLeast(k) => format!("at least {k}"),
            Arity::Range(lo, hi) => format!("{lo} to {hi}"),
        }
    }
}

/// A registered function: name, arity, volatility, and implementation.
/// `Copy` because every field is `Copy` (the implementation is a plain `fn`
/// pointer) — this is what lets [`crate::ast::TExpr::Call`] hold a
/// `&'static FunctionSpec` with no lifetime entanglement with the AST it
/// sits in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub volatile: bool,
    pub eval: FunctionEval,
}

pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionSpec>,
}

impl FunctionRegistry {
    fn new() -> Self {
        let mut registry = FunctionRegistry {
            functions: AHashMap::new(),
        };
        math::register(&mut registry);
        logical::register(&mut registry);
        text::register(&mut registry);
        info::register(&mut registry);
        date::register(&mut registry);
        lookup_fns::register(&mut registry);
        statistical::register(&mut registry);
        financial::register(&mut registry);
        criteria::register(&mut registry);
        registry
    }

    pub fn register(&mut self, spec: FunctionSpec) {
        self.functions.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name.to_ascii_uppercase().as_str())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

pub fn registry() -> &'static FunctionRegistry {
    REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Resolve a function's surface name (case-insensitive) to its `'static`
/// descriptor.
pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    registry().get(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_common_functions() {
        for name in ["SUM", "IF", "VLOOKUP", "CONCAT", "NPV", "NOW"] {
            assert!(lookup(name).is_some(), "missing function {name}");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(lookup("sum").is_some());
        assert!(lookup("Sum").is_some());
    }

    #[test]
    fn arity_ranges() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(Arity::Range(1, 3).accepts(3));
        assert!(!Arity::Range(1, 3).accepts(4));
    }
}
