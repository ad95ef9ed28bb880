//! Felsenstein pruning over the tree arena.
//!
//! Transition matrices depend only on branch length and rate category, so
//! they are computed once per run in a [`TransitionCache`] and shared by
//! every column. Per-node partial vectors live in a [`Scratch`] buffer owned
//! by the worker processing a column.

use subrecon_core::{ReconError, Result};

use crate::alignment::Alignment;
use crate::rates::RateCategories;
use crate::scaling::{rescale, ScalingAccumulator};
use crate::subst_model::SubstitutionModel;
use crate::tree::{NodeId, PhyloTree};

type Matrix = Vec<Vec<f64>>;

/// Transition matrices for every (node, category) plus the focal branch.
#[derive(Debug, Clone)]
pub struct TransitionCache {
    /// `by_node[node][category]` is P(branch_length(node) * rate).
    by_node: Vec<Vec<Matrix>>,
    /// `ln P((bl_A + bl_B) * rate)` per category.
    focal_log: Vec<Matrix>,
}

impl TransitionCache {
    /// Precompute all matrices a run needs. `focal_length` is the summed
    /// branch length of the two root children.
    pub fn new(
        tree: &PhyloTree,
        model: &dyn SubstitutionModel,
        rates: &RateCategories,
        focal_length: f64,
    ) -> Self {
        let by_node = (0..tree.node_count())
            .map(|node| {
                let bl = tree.branch_length(node);
                rates
                    .rates()
                    .iter()
                    .map(|&r| model.transition_probs(bl * r))
                    .collect()
            })
            .collect();

        let focal_log = rates
            .rates()
            .iter()
            .map(|&r| {
                model
                    .transition_probs(focal_length * r)
                    .into_iter()
                    .map(|row| row.into_iter().map(f64::ln).collect())
                    .collect()
            })
            .collect();

        Self { by_node, focal_log }
    }

    /// P for the branch above `node` in `category`.
    pub fn node(&self, node: NodeId, category: usize) -> &[Vec<f64>] {
        &self.by_node[node][category]
    }

    /// Element-wise log of the focal-branch matrix in `category`.
    pub fn focal_log(&self, category: usize) -> &[Vec<f64>] {
        &self.focal_log[category]
    }
}

/// Per-worker buffers, one partial vector per node.
#[derive(Debug, Clone)]
pub struct Scratch {
    partials: Vec<Vec<f64>>,
}

impl Scratch {
    pub fn new(n_nodes: usize, n_states: usize) -> Self {
        Self {
            partials: vec![vec![0.0; n_states]; n_nodes],
        }
    }
}

/// Computes rescaled conditional likelihood vectors for subtrees.
#[derive(Debug)]
pub struct PruningEngine<'a> {
    tree: &'a PhyloTree,
    alignment: &'a Alignment,
    cache: TransitionCache,
    n_states: usize,
    /// Alignment row of each leaf node.
    leaf_rows: Vec<Option<usize>>,
    /// Whole-tree post-order.
    order: Vec<NodeId>,
    /// `order[first[n]..=last[n]]` is the post-order of the subtree at `n`.
    first: Vec<usize>,
    last: Vec<usize>,
}

impl<'a> PruningEngine<'a> {
    /// Bind leaves to alignment rows.
    ///
    /// # Errors
    ///
    /// `Config` if a leaf is unnamed or its name is missing from the alignment.
    pub fn new(
        tree: &'a PhyloTree,
        alignment: &'a Alignment,
        cache: TransitionCache,
        n_states: usize,
    ) -> Result<Self> {
        let n = tree.node_count();
        let mut leaf_rows = vec![None; n];
        for leaf in tree.leaves() {
            let name = tree
                .get_node(leaf)
                .and_then(|node| node.name.as_deref())
                .ok_or_else(|| ReconError::Config(format!("leaf node {} has no name", leaf)))?;
            let row = alignment.row_index(name).ok_or_else(|| {
                ReconError::Config(format!(
                    "taxon '{}' in the tree is not in the alignment",
                    name
                ))
            })?;
            leaf_rows[leaf] = Some(row);
        }

        let order: Vec<NodeId> = tree.iter_postorder().collect();
        let mut first = vec![0; n];
        let mut last = vec![0; n];
        for (pos, &id) in order.iter().enumerate() {
            last[id] = pos;
            first[id] = match tree.get_node(id).and_then(|node| node.children.first()) {
                Some(&child) => first[child],
                None => pos,
            };
        }

        Ok(Self {
            tree,
            alignment,
            cache,
            n_states,
            leaf_rows,
            order,
            first,
            last,
        })
    }

    pub fn tree(&self) -> &PhyloTree {
        self.tree
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn cache(&self) -> &TransitionCache {
        &self.cache
    }

    /// Post-order of the subtree rooted at `node`, ending with `node`.
    pub fn subtree_order(&self, node: NodeId) -> &[NodeId] {
        &self.order[self.first[node]..=self.last[node]]
    }

    /// Rescaled conditional likelihood vector of `node` at `column` for
    /// `category`. The log scale factors removed anywhere in the subtree are
    /// added to `acc`.
    pub fn conditionals(
        &self,
        node: NodeId,
        column: usize,
        category: usize,
        acc: &mut ScalingAccumulator,
        scratch: &mut Scratch,
    ) -> Result<Vec<f64>> {
        for &id in self.subtree_order(node) {
            let mut v = std::mem::take(&mut scratch.partials[id]);
            v.clear();
            v.resize(self.n_states, 1.0);

            match self.leaf_rows[id] {
                Some(row) => {
                    if let Some(state) = self.alignment.state_at_row(row, column) {
                        if state >= self.n_states {
                            return Err(ReconError::Other(format!(
                                "state {} at column {} outside model's {} states",
                                state, column, self.n_states
                            )));
                        }
                        v.iter_mut().for_each(|x| *x = 0.0);
                        v[state] = 1.0;
                    }
                }
                None => {
                    let children = self.tree.get_node(id).map_or(&[][..], |n| n.children.as_slice());
                    for &child in children {
                        let p = self.cache.node(child, category);
                        let below = &scratch.partials[child];
                        for (i, x) in v.iter_mut().enumerate() {
                            let s: f64 = p[i].iter().zip(below).map(|(pij, cj)| pij * cj).sum();
                            *x *= s;
                        }
                    }
                }
            }

            rescale(&mut v, acc);
            scratch.partials[id] = v;
        }
        Ok(scratch.partials[node].clone())
    }
}
