//! Bundles and their components.
//!
//! A bundle is a set of components. Each component is either deployable
//! code (a type tag plus a templated parameter tree) or a reference to
//! another contract, which turns into a nested claim during resolution.
//! Components declare dependencies on other components of the same bundle,
//! and those dependencies must form a DAG.
//!
//! # Example
//!
//! ```
//! use orchard_lang::bundle::{Bundle, Component};
//! use orchard_lang::object::Metadata;
//!
//! let bundle = Bundle {
//!     metadata: Metadata::new("main", "web"),
//!     labels: Default::default(),
//!     components: vec![
//!         Component::code("app", "helm").depends_on(["db"]),
//!         Component::contract("db", "postgres"),
//!     ],
//! };
//!
//! let order: Vec<_> = bundle
//!     .sorted_components()
//!     .unwrap()
//!     .iter()
//!     .map(|c| c.name.as_str())
//!     .collect();
//! assert_eq!(order, ["db", "app"]);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::labels::Labels;
use crate::object::Metadata;

/// Component name reserved for the bundle-level instance
pub const BUNDLE_COMPONENT: &str = "root";
use crate::params::ParameterTree;

/// A set of components deployed together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    #[serde(default)]
    pub components: Vec<Component>,
}

/// One piece of a bundle: code or a reference to another contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Component {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,

    /// Locator of the referenced contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Code>,

    /// Values published to components that depend on this one
    #[serde(default, skip_serializing_if = "ParameterTree::is_empty")]
    pub discovery: ParameterTree,

    /// Names of components in the same bundle that must exist first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Deployable code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Code {
    /// Type tag used to pick a deployment plugin
    #[serde(rename = "type")]
    pub code_type: String,

    #[serde(default, skip_serializing_if = "ParameterTree::is_empty")]
    pub params: ParameterTree,
}

impl Component {
    /// A code component with empty params
    pub fn code(name: impl Into<String>, code_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: Some(Code {
                code_type: code_type.into(),
                params: ParameterTree::new(),
            }),
            ..Self::default()
        }
    }

    /// A component referencing another contract
    pub fn contract(name: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: Some(contract.into()),
            ..Self::default()
        }
    }

    /// Add dependencies on sibling components
    pub fn depends_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the code parameters
    pub fn with_params(mut self, params: ParameterTree) -> Self {
        if let Some(code) = self.code.as_mut() {
            code.params = params;
        }
        self
    }

    /// Set the discovery tree
    pub fn with_discovery(mut self, discovery: ParameterTree) -> Self {
        self.discovery = discovery;
        self
    }

    /// Set the criteria
    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl Bundle {
    /// Find a component by name
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Components in dependency order (dependencies before dependents).
    ///
    /// Depth-first search with a three-color check. Roots are visited in
    /// declared order, so the result is deterministic.
    pub fn sorted_components(&self) -> Result<Vec<&Component>> {
        let mut index: HashMap<&str, &Component> = HashMap::with_capacity(self.components.len());
        for component in &self.components {
            if index.insert(component.name.as_str(), component).is_some() {
                return Err(Error::DuplicateComponent {
                    bundle: self.metadata.name.clone(),
                    component: component.name.clone(),
                });
            }
        }
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut result = Vec::with_capacity(self.components.len());

        for component in &self.components {
            if !marks.contains_key(component.name.as_str()) {
                self.visit(component, &index, &mut marks, &mut result)?;
            }
        }
        Ok(result)
    }

    fn visit<'a>(
        &self,
        component: &'a Component,
        index: &HashMap<&str, &'a Component>,
        marks: &mut HashMap<&'a str, Mark>,
        result: &mut Vec<&'a Component>,
    ) -> Result<()> {
        marks.insert(component.name.as_str(), Mark::InProgress);

        for dep in &component.dependencies {
            let target = index
                .get(dep.as_str())
                .copied()
                .ok_or_else(|| Error::ComponentNotFound {
                    bundle: self.metadata.name.clone(),
                    component: dep.clone(),
                })?;
            match marks.get(target.name.as_str()) {
                None => self.visit(target, index, marks, result)?,
                Some(Mark::InProgress) => {
                    return Err(Error::ComponentCycle {
                        bundle: self.metadata.name.clone(),
                        component: dep.clone(),
                    });
                }
                Some(Mark::Done) => {}
            }
        }

        marks.insert(component.name.as_str(), Mark::Done);
        result.push(component);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn bundle(components: Vec<Component>) -> Bundle {
        Bundle {
            metadata: Metadata::new("main", "b"),
            labels: Labels::new(),
            components,
        }
    }

    fn names(bundle: &Bundle) -> Vec<String> {
        bundle
            .sorted_components()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    #[test]
    fn test_sort_chain() {
        let b = bundle(vec![
            Component::code("c", "t").depends_on(["a", "b"]),
            Component::code("b", "t").depends_on(["a"]),
            Component::code("a", "t"),
        ]);
        assert_eq!(names(&b), ["a", "b", "c"]);
    }

    #[test]
    fn test_sort_keeps_declared_order_for_independent_components() {
        let b = bundle(vec![
            Component::code("x", "t"),
            Component::code("y", "t"),
            Component::code("z", "t"),
        ]);
        assert_eq!(names(&b), ["x", "y", "z"]);
    }

    #[rstest]
    #[case(vec![Component::code("a", "t").depends_on(["a"])], "a")]
    #[case(vec![
        Component::code("a", "t").depends_on(["b"]),
        Component::code("b", "t").depends_on(["a"]),
    ], "a")]
    #[case(vec![
        Component::code("a", "t"),
        Component::code("b", "t").depends_on(["a", "c"]),
        Component::code("c", "t").depends_on(["d"]),
        Component::code("d", "t").depends_on(["b"]),
    ], "b")]
    fn test_sort_detects_cycles(#[case] components: Vec<Component>, #[case] at: &str) {
        let err = bundle(components).sorted_components().unwrap_err();
        match err {
            Error::ComponentCycle { component, .. } => assert_eq!(component, at),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_sort_reports_missing_dependency() {
        let b = bundle(vec![Component::code("a", "t").depends_on(["ghost"])]);
        assert!(matches!(
            b.sorted_components(),
            Err(Error::ComponentNotFound { component, .. }) if component == "ghost"
        ));
    }

    #[test]
    fn test_sort_rejects_duplicate_names() {
        let b = bundle(vec![
            Component::code("x", "t"),
            Component::code("y", "t"),
            Component::code("x", "helm"),
        ]);
        assert!(matches!(
            b.sorted_components(),
            Err(Error::DuplicateComponent { component, .. }) if component == "x"
        ));
    }

    proptest! {
        // Components only depend on earlier-declared ones, so the graph is a DAG.
        #[test]
        fn test_sort_is_linear_extension(
            edges in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 0..8), 1..8)
        ) {
            let components: Vec<Component> = edges
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    let deps: Vec<String> = row
                        .iter()
                        .take(i)
                        .enumerate()
                        .filter(|(_, on)| **on)
                        .map(|(j, _)| format!("c{}", j))
                        .collect();
                    Component::code(format!("c{}", i), "t").depends_on(deps)
                })
                .rev()
                .collect();
            let b = bundle(components);
            let order = names(&b);
            prop_assert_eq!(order.len(), b.components.len());
            for component in &b.components {
                let pos = order.iter().position(|n| *n == component.name).unwrap();
                for dep in &component.dependencies {
                    let dep_pos = order.iter().position(|n| n == dep).unwrap();
                    prop_assert!(dep_pos < pos);
                }
            }
        }
    }
}
