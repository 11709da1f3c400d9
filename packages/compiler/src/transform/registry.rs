//! Rule Registry
//!
//! Maps every source node kind to its ordered chain of candidate rules.
//! Providers export their chains explicitly; merging two providers that
//! both define a kind is a configuration error.

use std::collections::HashMap;

use crate::error::{RegistryError, TransformError};
use crate::output::js_ast::JsNode;
use crate::py_parser::{NodeId, NodeKind};
use crate::transform::rules;
use crate::transform::transformer::Transformer;

/// A rewrite rule: `Ok(None)` means "not applicable, try the next one".
pub type Rule = fn(&mut Transformer, NodeId) -> Result<Option<JsNode>, TransformError>;

/// A named group of rule chains.
#[derive(Clone, Copy)]
pub struct RuleProvider {
    pub name: &'static str,
    pub rules: fn() -> Vec<(NodeKind, Vec<Rule>)>,
}

/// Every provider shipped with the crate, in load order.
pub const PROVIDERS: &[RuleProvider] = &[
    RuleProvider {
        name: "obvious",
        rules: rules::obvious::rules,
    },
    RuleProvider {
        name: "special",
        rules: rules::special::rules,
    },
    RuleProvider {
        name: "functions",
        rules: rules::functions::rules,
    },
    RuleProvider {
        name: "classes",
        rules: rules::classes::rules,
    },
    RuleProvider {
        name: "forloops",
        rules: rules::forloops::rules,
    },
    RuleProvider {
        name: "exceptions",
        rules: rules::exceptions::rules,
    },
    RuleProvider {
        name: "comprehensions",
        rules: rules::comprehensions::rules,
    },
];

#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<NodeKind, Vec<Rule>>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.rules.iter().map(|(k, v)| (k.name(), v.len())).collect();
        kinds.sort();
        f.debug_struct("RuleRegistry").field("rules", &kinds).finish()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        RuleRegistry::default()
    }

    /// The registry built from all the shipped providers.
    pub fn standard() -> Result<Self, RegistryError> {
        RuleRegistry::from_providers(PROVIDERS)
    }

    pub fn from_providers(providers: &[RuleProvider]) -> Result<Self, RegistryError> {
        let mut registry = RuleRegistry::new();
        for provider in providers {
            for (kind, chain) in (provider.rules)() {
                registry.register(kind, chain)?;
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, kind: NodeKind, chain: Vec<Rule>) -> Result<(), RegistryError> {
        if self.rules.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        self.rules.insert(kind, chain);
        Ok(())
    }

    /// Candidate rules for `kind`, in trial order; empty when none is
    /// registered.
    pub fn rules_for(&self, kind: NodeKind) -> &[Rule] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.rules.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// A copy of this registry without the given kinds.
    pub fn without(&self, kinds: &[NodeKind]) -> Self {
        let rules = self
            .rules
            .iter()
            .filter(|(kind, _)| !kinds.contains(kind))
            .map(|(kind, chain)| (*kind, chain.clone()))
            .collect();
        RuleRegistry { rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decline(_: &mut Transformer, _: NodeId) -> Result<Option<JsNode>, TransformError> {
        Ok(None)
    }

    #[test]
    fn should_reject_kinds_defined_twice() {
        let mut registry = RuleRegistry::new();
        registry.register(NodeKind::Pass, vec![decline as Rule]).unwrap();
        let err = registry.register(NodeKind::Pass, vec![decline as Rule]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKind(NodeKind::Pass)));
    }

    #[test]
    fn should_merge_the_shipped_providers() {
        let registry = RuleRegistry::standard().unwrap();
        for kind in [
            NodeKind::Assign,
            NodeKind::FunctionDef,
            NodeKind::AsyncFunctionDef,
            NodeKind::ClassDef,
            NodeKind::ListComp,
            NodeKind::For,
            NodeKind::Try,
            NodeKind::Call,
        ] {
            assert!(registry.contains(kind), "missing {}", kind);
        }
        assert!(registry.rules_for(NodeKind::Call).len() > 1);
        assert!(registry.rules_for(NodeKind::With).is_empty());
    }

    #[test]
    fn should_drop_kinds_from_a_copy() {
        let registry = RuleRegistry::standard().unwrap();
        let smaller = registry.without(&[NodeKind::FunctionDef]);
        assert!(!smaller.contains(NodeKind::FunctionDef));
        assert_eq!(smaller.len(), registry.len() - 1);
    }
}
