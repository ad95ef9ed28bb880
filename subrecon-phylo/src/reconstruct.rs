//! Joint reconstruction of the states at both ends of the focal branch.
//!
//! The tree is rooted on the branch of interest, so the root's two children
//! (clades A and B) are the branch's endpoints and its length is the sum of
//! their branch lengths. For each column, both clades are pruned separately
//! per rate category and the results are joined across the focal branch by
//! [`combine`].

use log::debug;
use subrecon_core::{ln_values, log_sum_exp, ReconError, Result};

use crate::alignment::Alignment;
use crate::config::ReconConfig;
use crate::mixture::{combine, CategoryConditionals, MixtureOutcome};
use crate::pruning::{PruningEngine, Scratch, TransitionCache};
use crate::rates::RateCategories;
use crate::scaling::ScalingAccumulator;
use crate::site::SiteResult;
use crate::subst_model::SubstitutionModel;
use crate::tree::{NodeId, PhyloTree};

/// Validated inputs for a run, shared read-only by all column tasks.
pub struct Reconstructor<'a> {
    engine: PruningEngine<'a>,
    alignment: &'a Alignment,
    model: &'a dyn SubstitutionModel,
    rates: &'a RateCategories,
    config: ReconConfig,
    clade_a: NodeId,
    clade_b: NodeId,
    log_pi: Vec<f64>,
    /// `Some` only for non-uniform category weights.
    log_weights: Option<Vec<f64>>,
}

impl<'a> Reconstructor<'a> {
    /// Validate inputs and precompute transition matrices.
    ///
    /// # Errors
    ///
    /// Rejected configuration: invalid `config`, a root without exactly two
    /// children, negative branch lengths, tree taxa missing from the
    /// alignment, or an empty rate list.
    pub fn new(
        tree: &'a PhyloTree,
        alignment: &'a Alignment,
        model: &'a dyn SubstitutionModel,
        rates: &'a RateCategories,
        config: ReconConfig,
    ) -> Result<Self> {
        config.validate()?;
        tree.check_branch_lengths()?;
        let (clade_a, clade_b) = tree.focal_clades()?;
        if rates.is_empty() {
            return Err(ReconError::Config("no rate categories".into()));
        }

        let focal_length = tree.branch_length(clade_a) + tree.branch_length(clade_b);
        debug!(
            "focal branch length {} (clade A: {} tips, clade B: {} tips)",
            focal_length,
            tree.leaves_under(clade_a).len(),
            tree.leaves_under(clade_b).len()
        );
        debug!("{} rate categories: {:?}", rates.len(), rates.rates());

        let cache = TransitionCache::new(tree, model, rates, focal_length);
        let engine = PruningEngine::new(tree, alignment, cache, model.n_states())?;

        let log_weights = if rates.is_uniform() {
            None
        } else {
            Some(ln_values(rates.weights()))
        };

        Ok(Self {
            engine,
            alignment,
            model,
            rates,
            config,
            clade_a,
            clade_b,
            log_pi: ln_values(model.frequencies()),
            log_weights,
        })
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn tree(&self) -> &PhyloTree {
        self.engine.tree()
    }

    pub fn model(&self) -> &dyn SubstitutionModel {
        self.model
    }

    pub fn rates(&self) -> &RateCategories {
        self.rates
    }

    /// Root children delimiting the focal branch.
    pub fn focal_clades(&self) -> (NodeId, NodeId) {
        (self.clade_a, self.clade_b)
    }

    pub fn n_columns(&self) -> usize {
        self.alignment.n_columns()
    }

    /// Fresh per-worker buffers sized for this tree and model.
    pub fn scratch(&self) -> Scratch {
        Scratch::new(self.tree().node_count(), self.engine.n_states())
    }

    /// Reconstruct a single column (zero-based).
    pub fn reconstruct_column(&self, column: usize) -> Result<SiteResult> {
        let mut scratch = self.scratch();
        self.reconstruct_column_with(column, &mut scratch)
    }

    /// As [`Reconstructor::reconstruct_column`], reusing `scratch`.
    pub fn reconstruct_column_with(&self, column: usize, scratch: &mut Scratch) -> Result<SiteResult> {
        let outcome = self.mixture(column, scratch)?;
        if self.config.sanity_check {
            self.check(column, &outcome, scratch)?;
        }
        Ok(SiteResult::from_joint(
            column,
            outcome.marginal_log_likelihood,
            &outcome.joint,
            self.config.threshold,
            self.config.sort_by_probability,
        ))
    }

    fn mixture(&self, column: usize, scratch: &mut Scratch) -> Result<MixtureOutcome> {
        if column >= self.n_columns() {
            return Err(ReconError::Config(format!(
                "column {} out of range (alignment has {})",
                column + 1,
                self.n_columns()
            )));
        }

        let mut clades = Vec::with_capacity(self.rates.len());
        for category in 0..self.rates.len() {
            let mut acc_a = ScalingAccumulator::new();
            let a = self
                .engine
                .conditionals(self.clade_a, column, category, &mut acc_a, scratch)?;
            let mut acc_b = ScalingAccumulator::new();
            let b = self
                .engine
                .conditionals(self.clade_b, column, category, &mut acc_b, scratch)?;
            clades.push((a, b, acc_a.get() + acc_b.get()));
        }

        let categories: Vec<CategoryConditionals<'_>> = clades
            .iter()
            .enumerate()
            .map(|(category, (a, b, log_scaling))| CategoryConditionals {
                clade_a: a,
                clade_b: b,
                log_scaling: *log_scaling,
                focal_log: self.engine.cache().focal_log(category),
            })
            .collect();

        combine(column, &self.log_pi, &categories, self.log_weights.as_deref())
    }

    /// Recompute the column likelihood by plain pruning from the root and
    /// compare it with the mixture total; check the posterior sums to one.
    fn check(&self, column: usize, outcome: &MixtureOutcome, scratch: &mut Scratch) -> Result<()> {
        let root = self.tree().root();
        let pi = self.model.frequencies();
        let mut per_category = Vec::with_capacity(self.rates.len());
        for category in 0..self.rates.len() {
            let mut acc = ScalingAccumulator::new();
            let v = self.engine.conditionals(root, column, category, &mut acc, scratch)?;
            let scaled: f64 = v.iter().zip(pi).map(|(l, p)| l * p).sum();
            let log_weight = self.log_weights.as_ref().map_or(0.0, |lw| lw[category]);
            per_category.push(scaled.ln() + acc.get() + log_weight);
        }
        let recomputed = log_sum_exp(&per_category);

        let eps = self.config.epsilon;
        if !((recomputed - outcome.log_total).abs() <= eps) {
            return Err(ReconError::SanityCheck {
                column,
                detail: format!(
                    "root pruning gives log-likelihood {} but the focal-branch mixture gives {}",
                    recomputed, outcome.log_total
                ),
            });
        }
        let sum = outcome.joint.sum();
        if !((sum - 1.0).abs() <= eps) {
            return Err(ReconError::SanityCheck {
                column,
                detail: format!("posterior probabilities sum to {}", sum),
            });
        }
        Ok(())
    }
}
