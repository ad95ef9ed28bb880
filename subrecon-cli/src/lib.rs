//! The `subrecon` command: loads a rooted tree and an amino acid alignment,
//! reconstructs the pair of states across the root branch for each column,
//! and prints a tab-separated report.

pub mod args;
pub mod report;

use std::io::Write;

use anyhow::{Context, Result};
use log::info;
use subrecon_phylo::{newick, Alignment, ColumnOutcome, Reconstructor};

pub use args::Args;
use report::Preamble;

fn load_alignment(args: &Args) -> Result<Alignment> {
    let path = &args.sequences;
    let aln = if args.phy {
        Alignment::from_phylip_path(path)
    } else {
        Alignment::from_fasta_path(path)
    };
    aln.with_context(|| format!("unable to read alignment {}", path.display()))
}

/// Run the whole command, writing the report to `out`.
pub fn execute<W: Write>(args: &Args, out: &mut W) -> Result<()> {
    args.validate()?;

    let alignment = load_alignment(args)?;
    let tree = newick::parse_path(&args.tree)
        .with_context(|| format!("unable to read tree {}", args.tree.display()))?;
    let model = args.model().context("unable to build substitution model")?;
    let rates = args.rate_categories()?;
    let site = args.site_index(alignment.n_columns())?;
    let config = args.recon_config();
    info!(
        "{} sequences, {} columns, {} tips",
        alignment.n_sequences(),
        alignment.n_columns(),
        tree.leaf_count()
    );

    let recon = Reconstructor::new(&tree, &alignment, &model, &rates, config.clone())?;

    Preamble {
        model: &model,
        rates: &rates,
        tree: &tree,
        clades: recon.focal_clades(),
        threads: config.threads,
        sanity_check: config.sanity_check,
    }
    .write_to(out)?;

    let reportable = |s: &subrecon_phylo::SiteResult| s.is_reportable(config.threshold, config.verbose);
    let mut printed = false;

    match site {
        Some(column) => {
            let result = recon.reconstruct_column(column)?;
            if reportable(&result) {
                writeln!(out, "{}", report::site_line(&result, args.decimals))?;
                printed = true;
            }
        }
        None => {
            let summary = recon.run()?;
            for outcome in summary.outcomes() {
                match outcome {
                    ColumnOutcome::Reconstructed(result) => {
                        if reportable(result) {
                            writeln!(out, "{}", report::site_line(result, args.decimals))?;
                            printed = true;
                        }
                    }
                    ColumnOutcome::Failed { column, .. } => {
                        writeln!(out, "{}", report::error_line(*column))?;
                    }
                }
            }
            writeln!(out, "{}", report::total_line(summary.total_log_likelihood()))?;
        }
    }

    if !printed {
        for line in report::nothing_reported(config.threshold) {
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;
    Ok(())
}
