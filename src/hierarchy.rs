// 🌳 Group Hierarchy Inferencer - Payer groups as a forest
//
// B nests under A when:
// - similarity(A.name, B.name) > 80, and
// - B.name starts with A.name (case-insensitive)
//
// "Cigna Dental" → "Cigna Dental PPO" → "Cigna Dental PPO Plus"
//
// Names can satisfy the test both ways ("Delta Dental" / "DELTA DENTAL"),
// so construction threads a visited set: a group is placed exactly once and
// a branch that would revisit one is cut there.

use crate::config::ResolverConfig;
use crate::entities::PayerGroup;
use crate::similarity::score;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    pub group_id: String,
    pub group_name: String,
    pub children: Vec<GroupNode>,
}

impl GroupNode {
    /// Number of groups in this subtree, including this one
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(GroupNode::size).sum::<usize>()
    }
}

pub struct HierarchyInferencer {
    /// Minimum similarity for nesting (default: 80)
    pub child_threshold: u8,
}

impl HierarchyInferencer {
    pub fn new() -> Self {
        Self::from_config(&ResolverConfig::default())
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        HierarchyInferencer {
            child_threshold: config.hierarchy_threshold,
        }
    }

    /// Does `child` nest under `parent`?
    pub fn is_child(&self, parent: &PayerGroup, child: &PayerGroup) -> bool {
        let parent_name = parent.group_name.to_lowercase();
        let child_name = child.group_name.to_lowercase();

        score(&parent_name, &child_name) > self.child_threshold
            && child_name.starts_with(&parent_name)
    }

    /// Build the forest
    ///
    /// Roots and siblings keep input order. A group that qualifies under
    /// several parents goes to whichever is expanded first, so the result
    /// is only reproducible if the caller's order is.
    pub fn infer(&self, groups: &[PayerGroup]) -> Vec<GroupNode> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut roots = Vec::new();

        let top_level: Vec<usize> = (0..groups.len())
            .filter(|&i| {
                !groups
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && self.is_child(other, &groups[i]))
            })
            .collect();

        for i in top_level {
            if visited.insert(i) {
                roots.push(self.build_node(i, groups, &mut visited));
            }
        }

        // Groups whose every parent is also their child (mutual pairs) have
        // no top-level ancestor; promote them so nothing is dropped.
        for i in 0..groups.len() {
            if visited.insert(i) {
                debug!(
                    "Group {} has no acyclic parent chain, promoting to root",
                    groups[i].group_id
                );
                roots.push(self.build_node(i, groups, &mut visited));
            }
        }

        roots
    }

    fn build_node(
        &self,
        index: usize,
        groups: &[PayerGroup],
        visited: &mut HashSet<usize>,
    ) -> GroupNode {
        let parent = &groups[index];

        // Depth-first: a child's subtree is built before the next sibling is
        // claimed, so deeper parents win over shallower ones.
        let mut children = Vec::new();
        for (j, candidate) in groups.iter().enumerate() {
            if j == index || !self.is_child(parent, candidate) {
                continue;
            }
            if !visited.insert(j) {
                debug!(
                    "Group {} already placed, not repeating it under {}",
                    candidate.group_id, parent.group_id
                );
                continue;
            }
            children.push(self.build_node(j, groups, visited));
        }

        GroupNode {
            group_id: parent.group_id.clone(),
            group_name: parent.group_name.clone(),
            children,
        }
    }
}

impl Default for HierarchyInferencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the forest with the default threshold
pub fn infer(groups: &[PayerGroup]) -> Vec<GroupNode> {
    HierarchyInferencer::new().infer(groups)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(specs: &[(&str, &str)]) -> Vec<PayerGroup> {
        specs.iter().map(|(id, name)| PayerGroup::new(id, name)).collect()
    }

    fn ids(nodes: &[GroupNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.group_id.as_str()).collect()
    }

    /// Every group id in the forest, depth-first
    fn flatten(nodes: &[GroupNode], out: &mut Vec<String>) {
        for node in nodes {
            out.push(node.group_id.clone());
            flatten(&node.children, out);
        }
    }

    #[test]
    fn test_is_child() {
        let inferencer = HierarchyInferencer::new();
        let dd = PayerGroup::new("DD", "Delta Dental");

        assert!(inferencer.is_child(&dd, &PayerGroup::new("DDAZ", "Delta Dental AZ")));
        assert!(inferencer.is_child(&dd, &PayerGroup::new("DDAZ", "DELTA DENTAL az")));
        // prefix but too dissimilar: 24/35
        assert!(!inferencer.is_child(&dd, &PayerGroup::new("DDAZ", "Delta Dental of Arizona")));
        // similar but not a prefix
        assert!(!inferencer.is_child(&dd, &PayerGroup::new("DDX", "The Delta Dental")));
    }

    #[test]
    fn test_nested_chain() {
        let forest = infer(&groups(&[
            ("CI", "Cigna Dental"),
            ("CIP", "Cigna Dental PPO"),
            ("CIPP", "Cigna Dental PPO Plus"),
        ]));

        assert_eq!(ids(&forest), vec!["CI"]);
        assert_eq!(ids(&forest[0].children), vec!["CIP"]);
        assert_eq!(ids(&forest[0].children[0].children), vec!["CIPP"]);
        assert_eq!(forest[0].size(), 3);
    }

    #[test]
    fn test_unrelated_roots_keep_input_order() {
        let forest = infer(&groups(&[
            ("MET", "MetLife"),
            ("AET", "Aetna"),
            ("DD", "Delta Dental"),
            ("DDAZ", "Delta Dental AZ"),
        ]));

        assert_eq!(ids(&forest), vec!["MET", "AET", "DD"]);
        assert_eq!(ids(&forest[2].children), vec!["DDAZ"]);
    }

    #[test]
    fn test_child_nests_under_deepest_expanded_parent() {
        // DDAZ1 qualifies under both DD and DDAZ; DDAZ is expanded before
        // DD gets to it
        let forest = infer(&groups(&[
            ("DD", "Delta Dental"),
            ("DDAZ", "Delta Dental AZ"),
            ("DDAZ1", "Delta Dental AZ1"),
        ]));

        assert_eq!(ids(&forest), vec!["DD"]);
        assert_eq!(ids(&forest[0].children), vec!["DDAZ"]);
        assert_eq!(ids(&forest[0].children[0].children), vec!["DDAZ1"]);
        assert_eq!(forest[0].size(), 3);
    }

    #[test]
    fn test_child_goes_to_first_expanded_sibling() {
        // DDAZ1 qualifies under DDA and DDAZ; DDA comes first in input order
        let forest = infer(&groups(&[
            ("DD", "Delta Dental"),
            ("DDA", "Delta Dental A"),
            ("DDAZ", "Delta Dental AZ"),
            ("DDAZ1", "Delta Dental AZ1"),
        ]));

        assert_eq!(ids(&forest[0].children), vec!["DDA"]);
        assert_eq!(ids(&forest[0].children[0].children), vec!["DDAZ"]);
        assert_eq!(ids(&forest[0].children[0].children[0].children), vec!["DDAZ1"]);
    }

    #[test]
    fn test_mutual_children_produce_no_cycle() {
        let input = groups(&[("G1", "Delta Dental"), ("G2", "DELTA DENTAL")]);
        let forest = infer(&input);

        assert_eq!(ids(&forest), vec!["G1"]);
        assert_eq!(ids(&forest[0].children), vec!["G2"]);
        assert!(forest[0].children[0].children.is_empty());
    }

    #[test]
    fn test_every_group_placed_once() {
        let input = groups(&[
            ("A", "Delta Dental"),
            ("B", "delta dental"),
            ("C", "DELTA DENTAL"),
            ("D", "Delta Dental AZ"),
            ("E", "Aetna"),
        ]);
        let forest = infer(&input);

        let mut placed = Vec::new();
        flatten(&forest, &mut placed);
        placed.sort();
        assert_eq!(placed, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(infer(&[]).is_empty());
    }
}
