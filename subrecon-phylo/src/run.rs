//! Whole-alignment runs, optionally spread over a worker pool.
//!
//! Columns are independent: each worker owns a [`Scratch`] and reads the
//! shared [`Reconstructor`]. Results come back in column order regardless of
//! scheduling, and the total log-likelihood is summed sequentially so it does
//! not depend on the thread count.

use log::{error, info};
use subrecon_core::{ReconError, Result};

use crate::pruning::Scratch;
use crate::reconstruct::Reconstructor;
use crate::site::SiteResult;

/// What happened to one column.
#[derive(Debug)]
pub enum ColumnOutcome {
    Reconstructed(SiteResult),
    /// A recoverable per-column failure; the run carried on.
    Failed { column: usize, error: ReconError },
}

impl ColumnOutcome {
    pub fn column(&self) -> usize {
        match self {
            ColumnOutcome::Reconstructed(site) => site.column(),
            ColumnOutcome::Failed { column, .. } => *column,
        }
    }

    pub fn site(&self) -> Option<&SiteResult> {
        match self {
            ColumnOutcome::Reconstructed(site) => Some(site),
            ColumnOutcome::Failed { .. } => None,
        }
    }
}

/// Per-column outcomes of a run, in the order the columns were requested.
#[derive(Debug)]
pub struct RunSummary {
    outcomes: Vec<ColumnOutcome>,
    total_log_likelihood: f64,
}

impl RunSummary {
    fn from_outcomes(outcomes: Vec<ColumnOutcome>) -> Self {
        let total_log_likelihood = outcomes
            .iter()
            .filter_map(ColumnOutcome::site)
            .map(SiteResult::log_likelihood)
            .sum();
        Self {
            outcomes,
            total_log_likelihood,
        }
    }

    pub fn outcomes(&self) -> &[ColumnOutcome] {
        &self.outcomes
    }

    /// Successfully reconstructed columns.
    pub fn sites(&self) -> impl Iterator<Item = &SiteResult> {
        self.outcomes.iter().filter_map(ColumnOutcome::site)
    }

    /// Sum of log-likelihoods over successful columns.
    pub fn total_log_likelihood(&self) -> f64 {
        self.total_log_likelihood
    }

    pub fn failed_columns(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ColumnOutcome::Failed { .. }))
            .map(ColumnOutcome::column)
            .collect()
    }
}

impl<'a> Reconstructor<'a> {
    /// Reconstruct every column of the alignment.
    pub fn run(&self) -> Result<RunSummary> {
        let columns: Vec<usize> = (0..self.n_columns()).collect();
        self.run_columns(&columns)
    }

    /// Reconstruct the given zero-based columns.
    ///
    /// # Errors
    ///
    /// Any fatal error (a failed sanity check, an out-of-range column) stops
    /// the run. Numerical failures are recorded per column instead.
    pub fn run_columns(&self, columns: &[usize]) -> Result<RunSummary> {
        let threads = self.config().threads;
        info!("reconstructing {} column(s) on {} thread(s)", columns.len(), threads);

        let outcomes = if threads > 1 {
            self.run_pooled(columns, threads)?
        } else {
            let mut scratch = self.scratch();
            columns
                .iter()
                .map(|&c| self.outcome(c, &mut scratch))
                .collect::<Result<Vec<_>>>()?
        };

        let summary = RunSummary::from_outcomes(outcomes);
        let failed = summary.failed_columns();
        if !failed.is_empty() {
            info!("{} column(s) could not be reconstructed", failed.len());
        }
        Ok(summary)
    }

    #[cfg(feature = "parallel")]
    fn run_pooled(&self, columns: &[usize], threads: usize) -> Result<Vec<ColumnOutcome>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ReconError::Config(format!("cannot start worker pool: {}", e)))?;
        pool.install(|| {
            columns
                .par_iter()
                .map_init(|| self.scratch(), |scratch, &c| self.outcome(c, scratch))
                .collect::<Result<Vec<_>>>()
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn run_pooled(&self, columns: &[usize], _threads: usize) -> Result<Vec<ColumnOutcome>> {
        let mut scratch = self.scratch();
        columns
            .iter()
            .map(|&c| self.outcome(c, &mut scratch))
            .collect()
    }

    fn outcome(&self, column: usize, scratch: &mut Scratch) -> Result<ColumnOutcome> {
        match self.reconstruct_column_with(column, scratch) {
            Ok(site) => Ok(ColumnOutcome::Reconstructed(site)),
            Err(e) if !e.is_fatal() => {
                error!("column {}: {}", column + 1, e);
                Ok(ColumnOutcome::Failed { column, error: e })
            }
            Err(e) => Err(e),
        }
    }
}
