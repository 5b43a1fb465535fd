//! Pattern preprocessing: variable unification and connected components.
//!
//! Before any path is compiled, all node slots sharing a variable name are
//! unified into one canonical record (label conflicts fail compilation,
//! property constraints accumulate), and the clause's paths are partitioned
//! into connected components over shared node variables. Relationship
//! uniqueness is later enforced within a component, never across disjoint
//! ones.

use std::collections::HashMap;

use crate::ast::{PathElement, PatternGraph};
use crate::compiler::errors::CompileError;

/// Canonical record of a node variable across all its occurrences.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub label: Option<String>,
    pub prop_constraint: bool,
}

#[derive(Debug, Default)]
pub struct NodeInfoMap {
    entries: HashMap<String, NodeInfo>,
}

impl NodeInfoMap {
    pub fn get(&self, variable: &str) -> Option<&NodeInfo> {
        self.entries.get(variable)
    }
}

/// Unify label and property-constraint information of every named node
/// slot. `None` + `Some(L)` unifies to `Some(L)`; two distinct labels on
/// the same variable are a conflict.
pub fn collect_node_info(pattern: &PatternGraph) -> Result<NodeInfoMap, CompileError> {
    let mut map = NodeInfoMap::default();

    for path in &pattern.paths {
        for element in &path.elements {
            let node = match element {
                PathElement::Node(node) => node,
                PathElement::Rel(_) => continue,
            };
            let variable = match &node.variable {
                Some(v) => v,
                None => continue,
            };
            let has_props = node.properties.is_some();

            match map.entries.get_mut(variable) {
                None => {
                    map.entries.insert(
                        variable.clone(),
                        NodeInfo {
                            label: node.label.clone(),
                            prop_constraint: has_props,
                        },
                    );
                }
                Some(info) => {
                    match (&info.label, &node.label) {
                        (None, Some(label)) => info.label = Some(label.clone()),
                        (Some(existing), Some(label)) if existing != label => {
                            return Err(CompileError::LabelConflict {
                                variable: variable.clone(),
                                existing: existing.clone(),
                                conflicting: label.clone(),
                            });
                        }
                        _ => {}
                    }
                    info.prop_constraint = info.prop_constraint || has_props;
                }
            }
        }
    }

    Ok(map)
}

/// Does any node or relationship slot of the pattern carry a property
/// constraint? Decides whether match compilation needs its qual phase.
pub fn has_prop_constraints(pattern: &PatternGraph) -> bool {
    pattern.paths.iter().any(|path| {
        path.elements.iter().any(|element| match element {
            PathElement::Node(n) => n.properties.is_some(),
            PathElement::Rel(r) => r.properties.is_some(),
        })
    })
}

/// Partition paths into connected components: two paths connect when any
/// named node variable occurs in both. Components come out in discovery
/// order (by the smallest path index they contain) so plan shape is
/// deterministic.
pub fn make_components(pattern: &PatternGraph) -> Vec<Vec<usize>> {
    let n = pattern.paths.len();
    let mut set = DisjointSet::new(n);
    let mut first_path_of_var: HashMap<&str, usize> = HashMap::new();

    for (index, path) in pattern.paths.iter().enumerate() {
        for element in &path.elements {
            let variable = match element {
                PathElement::Node(node) => match &node.variable {
                    Some(v) => v.as_str(),
                    // anonymous nodes are unique, they never connect paths
                    None => continue,
                },
                PathElement::Rel(_) => continue,
            };
            match first_path_of_var.get(variable) {
                Some(&other) => set.union(index, other),
                None => {
                    first_path_of_var.insert(variable, index);
                }
            }
        }
    }

    let mut order: Vec<usize> = vec![];
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for index in 0..n {
        let root = set.find(index);
        let bucket = members.entry(root).or_insert_with(|| {
            order.push(root);
            vec![]
        });
        bucket.push(index);
    }

    order
        .into_iter()
        .map(|root| members.remove(&root).unwrap_or_default())
        .collect()
}

/// Index-based disjoint-set with path halving.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        DisjointSet {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // attach the later-discovered root under the earlier one so the
            // representative stays the smallest index
            let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[merge] = keep;
        }
    }
}
