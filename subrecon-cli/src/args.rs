//! Command-line arguments and their translation into library inputs.

use std::path::PathBuf;

use clap::Parser;
use subrecon_core::{ReconError, Result};
use subrecon_phylo::{
    load_aa_model_path, EmpiricalModel, ProteinModelKind, RateCategories, ReconConfig,
    DEFAULT_THRESHOLD,
};

/// Largest accepted `--sd`.
pub const MAX_DECIMALS: usize = 15;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "subrecon",
    version,
    about = "Ancestral reconstruction of amino acid substitutions along a branch in a phylogeny",
    long_about = "Computes, for every alignment column, the joint posterior probability of each \
                  pair of amino acids at the two ends of the branch the tree is rooted on."
)]
pub struct Args {
    /// Amino acid alignment (FASTA unless --phy is given)
    #[arg(short = 's', long = "sequences", value_name = "FILE")]
    pub sequences: PathBuf,

    /// Newick tree rooted on the branch of interest, with branch lengths
    /// estimated under the same model
    #[arg(short = 't', long = "tree", value_name = "FILE")]
    pub tree: PathBuf,

    /// Alignment is in PHYLIP format
    #[arg(long = "phy")]
    pub phy: bool,

    /// Substitution model: dayhoff, jtt, wag (alias wag.dat) or blosum62
    #[arg(short = 'm', long = "model", required_unless_present = "model_file")]
    pub model: Option<String>,

    /// PAML-format model file (190 exchangeabilities then 20 frequencies)
    #[arg(long = "model-file", value_name = "FILE", conflicts_with_all = ["model", "frequencies"])]
    pub model_file: Option<PathBuf>,

    /// Shape (alpha) of the gamma distribution of rates
    #[arg(short = 'a', long = "shape", default_value_t = 0.0, allow_negative_numbers = true)]
    pub shape: f64,

    /// Number of discrete gamma rate categories
    #[arg(short = 'k', long = "rateclasses", default_value_t = 1)]
    pub rate_classes: usize,

    /// Equilibrium frequencies in the order A,R,N,D,C,Q,E,G,H,I,L,K,M,F,P,S,T,W,Y,V
    #[arg(long = "frequencies", visible_alias = "pi", value_delimiter = ',', allow_negative_numbers = true)]
    pub frequencies: Option<Vec<f64>>,

    /// Analyse a single column (1-based) instead of the whole alignment
    #[arg(long = "site")]
    pub site: Option<usize>,

    /// List pairs in canonical amino acid order instead of by probability
    #[arg(long = "nosort")]
    pub nosort: bool,

    /// Minimum joint probability for a pair to be listed (0.0 lists all 400)
    #[arg(long = "threshold", default_value_t = DEFAULT_THRESHOLD, allow_negative_numbers = true)]
    pub threshold: f64,

    /// Report every column, including those where no substitution is likely
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Recompute each column's likelihood from the root as a consistency check
    #[arg(long = "debug")]
    pub debug: bool,

    /// Decimal places used when printing probabilities and likelihoods
    #[arg(long = "sd", default_value_t = 2)]
    pub decimals: usize,

    /// Worker threads
    #[arg(short = 'T', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Explicit rate categories, replacing the gamma distribution
    #[arg(long = "rates", value_delimiter = ',', allow_negative_numbers = true)]
    pub rates: Option<Vec<f64>>,

    /// Probabilities of the explicit rate categories (equal by default)
    #[arg(long = "weights", value_delimiter = ',', requires = "rates")]
    pub weights: Option<Vec<f64>>,
}

impl Args {
    /// Checks that need no input files.
    pub fn validate(&self) -> Result<()> {
        if self.decimals < 1 || self.decimals > MAX_DECIMALS {
            return Err(ReconError::Config(format!(
                "--sd must be between 1 and {}, got {}",
                MAX_DECIMALS, self.decimals
            )));
        }
        if !(self.shape >= 0.0) || !self.shape.is_finite() {
            return Err(ReconError::Config(format!(
                "--shape must be greater than or equal to 0.0, got {}",
                self.shape
            )));
        }
        if self.rate_classes < 1 {
            return Err(ReconError::Config(
                "--rateclasses must be 1 or higher".into(),
            ));
        }
        if self.site == Some(0) {
            return Err(ReconError::Config("--site is 1-based and must be 1 or higher".into()));
        }
        self.recon_config().validate()
    }

    pub fn recon_config(&self) -> ReconConfig {
        ReconConfig {
            threshold: self.threshold,
            sort_by_probability: !self.nosort,
            sanity_check: self.debug,
            verbose: self.verbose,
            threads: self.threads,
            ..Default::default()
        }
    }

    pub fn model(&self) -> Result<EmpiricalModel> {
        if let Some(path) = &self.model_file {
            return load_aa_model_path(path);
        }
        let kind: ProteinModelKind = self
            .model
            .as_deref()
            .ok_or_else(|| ReconError::Config("no substitution model given".into()))?
            .parse()?;
        match &self.frequencies {
            Some(freqs) => EmpiricalModel::with_frequencies(kind, freqs),
            None => EmpiricalModel::builtin(kind),
        }
    }

    pub fn rate_categories(&self) -> Result<RateCategories> {
        match (&self.rates, &self.weights) {
            (Some(rates), Some(weights)) => RateCategories::weighted(rates.clone(), weights.clone()),
            (Some(rates), None) => RateCategories::uniform(rates.clone()),
            (None, _) => RateCategories::gamma(self.shape, self.rate_classes),
        }
    }

    /// Zero-based column for `--site`, checked against the alignment width.
    pub fn site_index(&self, n_columns: usize) -> Result<Option<usize>> {
        match self.site {
            None => Ok(None),
            Some(site) if site >= 1 && site <= n_columns => Ok(Some(site - 1)),
            Some(site) => Err(ReconError::Config(format!(
                "--site {} is outside the alignment (1 to {})",
                site, n_columns
            ))),
        }
    }
}
