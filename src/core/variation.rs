//! core::variation
//!
//! Variation inheritance graph.
//!
//! Variations form a forest: `default` at the root, with experiment- or
//! calibration-specific overrides below it. The [`VariationGraph::priority_chain`]
//! of a variation lists it and then its ancestors; resolution prefers
//! assignments from earlier entries.
//!
//! ```text
//! default            chain(mc_smear) = [mc_smear, mc, default]
//! └── mc
//!     └── mc_smear
//! ```

use std::collections::{BTreeMap, HashMap};

use super::error::{CalibError, CalibResult, Entity};
use super::graph::{ChainError, ParentGraph};
use super::records::VariationRecord;
use super::types::{RecordName, VariationId};

/// A named variation.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub id: VariationId,
    pub name: String,
    pub parent_id: Option<VariationId>,
    pub comment: String,
}

/// Variations indexed by id and name, with their parent graph.
#[derive(Debug, Clone, Default)]
pub struct VariationGraph {
    variations: BTreeMap<VariationId, Variation>,
    by_name: HashMap<String, VariationId>,
    graph: ParentGraph<VariationId>,
}

impl VariationGraph {
    /// Index variation records.
    ///
    /// Parent chains are not walked here: a cycle only fails the queries
    /// that reach it, via [`priority_chain`](Self::priority_chain).
    ///
    /// # Errors
    ///
    /// - `DuplicateName` if two variations share a name
    /// - `InvalidName` if `strict_names` is set and a name is invalid
    pub fn build(records: &[VariationRecord], strict_names: bool) -> CalibResult<Self> {
        let mut out = VariationGraph::default();

        for record in records {
            if strict_names {
                RecordName::validate(&record.name)?;
            }
            if out.by_name.insert(record.name.clone(), record.id).is_some() {
                return Err(CalibError::DuplicateName {
                    entity: Entity::Variation,
                    name: record.name.clone(),
                });
            }
            out.graph.add_node(record.id, record.parent_id);
            out.variations.insert(
                record.id,
                Variation {
                    id: record.id,
                    name: record.name.clone(),
                    parent_id: record.parent_id,
                    comment: record.comment.clone(),
                },
            );
        }

        Ok(out)
    }

    /// Look up a variation by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no variation has this name.
    pub fn by_name(&self, name: &str) -> CalibResult<&Variation> {
        self.by_name
            .get(name)
            .and_then(|id| self.variations.get(id))
            .ok_or_else(|| CalibError::not_found(Entity::Variation, name))
    }

    /// Look up a variation by id.
    pub fn get(&self, id: VariationId) -> Option<&Variation> {
        self.variations.get(&id)
    }

    /// All variations, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Variation> {
        self.variations.values()
    }

    /// Inheritance-priority chain for `leaf_name`.
    ///
    /// Returns `[leaf, parent(leaf), ..., root]`. Earlier entries take
    /// precedence during resolution.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `leaf_name` does not exist
    /// - `CycleDetected` if the parent chain does not reach a root within
    ///   the number of variations
    /// - `DanglingParent` if a parent id has no matching variation
    ///
    /// # Example
    ///
    /// ```
    /// use calibdb::core::records::VariationRecord;
    /// use calibdb::core::types::VariationId;
    /// use calibdb::core::variation::VariationGraph;
    ///
    /// let graph = VariationGraph::build(&[
    ///     VariationRecord::new(1, "default", None),
    ///     VariationRecord::new(2, "mc", Some(1)),
    /// ], true).unwrap();
    ///
    /// let chain = graph.priority_chain("mc").unwrap();
    /// assert_eq!(chain, vec![VariationId::new(2), VariationId::new(1)]);
    /// ```
    pub fn priority_chain(&self, leaf_name: &str) -> CalibResult<Vec<VariationId>> {
        let leaf = self.by_name(leaf_name)?;
        self.graph.chain_to_root(leaf.id).map_err(|e| match e {
            ChainError::Cycle(start) => CalibError::CycleDetected {
                entity: Entity::Variation,
                id: start.get(),
            },
            ChainError::Dangling { node, parent } => CalibError::DanglingParent {
                entity: Entity::Variation,
                id: node.get(),
                parent_id: parent.get(),
            },
        })
    }

    /// Every variation that inherits from `name`, directly or not.
    pub fn descendants(&self, name: &str) -> CalibResult<Vec<&Variation>> {
        let root = self.by_name(name)?;
        Ok(self
            .graph
            .descendants(&root.id)
            .iter()
            .filter_map(|id| self.variations.get(id))
            .collect())
    }

    /// The underlying parent graph, for verification.
    pub fn graph(&self) -> &ParentGraph<VariationId> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<VariationId> {
        raw.iter().copied().map(VariationId::new).collect()
    }

    fn graph() -> VariationGraph {
        VariationGraph::build(
            &[
                VariationRecord::new(1, "default", None),
                VariationRecord::new(2, "mc", Some(1)),
                VariationRecord::new(3, "mc_smear", Some(2)),
                VariationRecord::new(4, "calib", Some(1)),
            ],
            true,
        )
        .unwrap()
    }

    #[test]
    fn chain_runs_leaf_to_root() {
        assert_eq!(graph().priority_chain("mc_smear").unwrap(), ids(&[3, 2, 1]));
    }

    #[test]
    fn root_chain_is_itself() {
        assert_eq!(graph().priority_chain("default").unwrap(), ids(&[1]));
    }

    #[test]
    fn unknown_variation_not_found() {
        let err = graph().priority_chain("nope").unwrap_err();
        assert_eq!(
            err,
            CalibError::NotFound {
                entity: Entity::Variation,
                key: "nope".into()
            }
        );
    }

    #[test]
    fn cycle_detected_not_looped() {
        let graph = VariationGraph::build(
            &[
                VariationRecord::new(1, "a", Some(3)),
                VariationRecord::new(2, "b", Some(1)),
                VariationRecord::new(3, "c", Some(2)),
            ],
            true,
        )
        .unwrap();
        let err = graph.priority_chain("b").unwrap_err();
        assert_eq!(
            err,
            CalibError::CycleDetected {
                entity: Entity::Variation,
                id: 2
            }
        );
    }

    #[test]
    fn dangling_parent_detected() {
        let graph =
            VariationGraph::build(&[VariationRecord::new(2, "mc", Some(9))], true).unwrap();
        assert!(matches!(
            graph.priority_chain("mc"),
            Err(CalibError::DanglingParent {
                entity: Entity::Variation,
                id: 2,
                parent_id: 9
            })
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = VariationGraph::build(
            &[
                VariationRecord::new(1, "default", None),
                VariationRecord::new(2, "default", None),
            ],
            true,
        )
        .unwrap_err();
        assert!(matches!(err, CalibError::DuplicateName { .. }));
    }

    #[test]
    fn descendants_of_default() {
        let g = graph();
        let names: Vec<_> = g
            .descendants("default")
            .unwrap()
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["mc", "mc_smear", "calib"]);
    }
}
