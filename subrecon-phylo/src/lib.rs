//! Joint ancestral reconstruction of amino acid substitutions along a single
//! branch of a phylogeny.
//!
//! The tree is rooted on the branch of interest. For every alignment column
//! the posterior probability of each (state at A, state at B) pair is
//! computed under an empirical amino acid model with optional rate
//! heterogeneity:
//!
//! - **Inputs**: [`PhyloTree`] from Newick, [`Alignment`] from FASTA or PHYLIP
//! - **Models**: [`EmpiricalModel`] (Dayhoff, JTT, WAG, BLOSUM62 or a PAML-style file) behind [`SubstitutionModel`]
//! - **Rate heterogeneity**: [`RateCategories`] (discrete gamma or explicit rates)
//! - **Engine**: [`Reconstructor`] for single columns, [`RunSummary`] for whole runs
//!
//! # Example
//!
//! ```
//! use subrecon_phylo::{
//!     Alignment, EmpiricalModel, PhyloTree, ProteinModelKind, RateCategories, ReconConfig,
//!     Reconstructor,
//! };
//!
//! let tree = PhyloTree::from_newick("(A:0.1,B:0.2);").unwrap();
//! let aln = Alignment::from_rows(vec![("A", "MA"), ("B", "MR")]).unwrap();
//! let model = EmpiricalModel::builtin(ProteinModelKind::Wag).unwrap();
//! let rates = RateCategories::single();
//!
//! let recon = Reconstructor::new(&tree, &aln, &model, &rates, ReconConfig::default()).unwrap();
//! let site = recon.reconstruct_column(1).unwrap();
//! assert_eq!(site.substitutions()[0].code(), "AR");
//! assert!(site.is_reportable(0.4, false));
//! ```

pub mod alignment;
pub mod alphabet;
pub mod config;
pub mod mixture;
pub mod newick;
pub mod protein_models;
pub mod pruning;
pub mod rates;
pub mod reconstruct;
pub mod run;
pub mod scaling;
pub mod site;
pub mod subst_model;
pub mod tree;

pub use alignment::Alignment;
pub use alphabet::{amino_acid_index, amino_acid_symbol, AA_ORDER, AA_STATES};
pub use config::{ReconConfig, DEFAULT_EPSILON, DEFAULT_THRESHOLD};
pub use mixture::{combine, CategoryConditionals, JointProbabilities, MixtureOutcome};
pub use protein_models::{load_aa_model, load_aa_model_path, EmpiricalModel, ProteinModelKind};
pub use pruning::{PruningEngine, Scratch, TransitionCache};
pub use rates::{RateCategories, RateSource};
pub use reconstruct::Reconstructor;
pub use run::{ColumnOutcome, RunSummary};
pub use site::{SiteResult, Substitution};
pub use subst_model::{EigenSystem, PoissonModel, SubstitutionModel};
pub use tree::{Node, NodeId, PhyloTree};
