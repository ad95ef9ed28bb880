//! Text report written to standard output.
//!
//! Columns are tab-separated so results can be filtered with `grep Result`
//! and split with `cut`.

use std::io::{self, Write};

use subrecon_core::Reportable;
use subrecon_phylo::{PhyloTree, NodeId, SiteResult};

pub const TITLE: &str =
    "SubRecon: Ancestral Reconstruction of Amino Acid Substitutions Along a Branch in a Phylogeny";

pub const HEADER: &str = "[HEADER]\tsite\tln[P(D|theta,alpha)]\tP(A=a,B=b|D,theta,alpha)";

const RULE: &str = "--------------------------------------------------------------";

/// Printed when `--debug` turns on the per-column sanity check.
pub const SANITY_BANNER: &str = "######### sanityCheck == true #########";

/// Round half up to `decimals` places.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale + 0.5).floor() / scale
}

/// Shortest decimal form of the rounded value, always with a fractional
/// part (`1.0`, `-12.35`).
pub fn format_rounded(value: f64, decimals: usize) -> String {
    let r = round_to(value, decimals);
    if r.is_finite() && r.fract() == 0.0 {
        format!("{:.1}", r)
    } else {
        format!("{}", r)
    }
}

/// One `Result` line. Columns are printed 1-based.
pub fn site_line(site: &SiteResult, decimals: usize) -> String {
    let mut line = format!(
        "Result\t{}\t{}",
        site.column() + 1,
        format_rounded(site.log_likelihood(), decimals)
    );
    for s in site.substitutions() {
        line.push('\t');
        line.push_str(&s.code());
        line.push(':');
        line.push_str(&format_rounded(s.probability, decimals));
    }
    line
}

pub fn total_line(total: f64) -> String {
    format!("Total lnL: {:.10}", total)
}

pub fn error_line(column: usize) -> String {
    format!("ERROR: Site {}", column + 1)
}

/// Printed when no column qualified for a `Result` line.
pub fn nothing_reported(threshold: f64) -> [String; 2] {
    [
        format!(
            "0 sites have non-identical substitution probabilities greater than threshold value (threshold={:.5})",
            threshold
        ),
        "The options --threshold, --nosort and --verbose can be used to control output detail"
            .to_string(),
    ]
}

fn clade_line(label: char, tree: &PhyloTree, node: NodeId) -> String {
    let taxon = tree
        .first_leaf(node)
        .and_then(|leaf| tree.get_node(leaf))
        .and_then(|n| n.name.as_deref())
        .unwrap_or("?");
    format!(
        "Node [{}] has {} tips and contains taxon {}.",
        label,
        tree.leaves_under(node).len(),
        taxon
    )
}

/// Everything printed before the first result: model and rate summaries,
/// the thread count, and a legend identifying the two focal clades.
pub struct Preamble<'a> {
    pub model: &'a dyn Reportable,
    pub rates: &'a dyn Reportable,
    pub tree: &'a PhyloTree,
    pub clades: (NodeId, NodeId),
    pub threads: usize,
    pub sanity_check: bool,
}

impl Preamble<'_> {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![TITLE.to_string(), String::new()];
        lines.extend(self.model.report_lines());
        lines.extend(self.rates.report_lines());
        if self.sanity_check {
            lines.push(String::new());
            lines.push(SANITY_BANNER.to_string());
        }
        lines.push(String::new());
        lines.push(format!("Using {} thread(s)", self.threads));
        lines.push(String::new());
        lines.push(RULE.to_string());
        lines.push("Reconstruction probabilities are presented in the form [ab:x],".to_string());
        lines.push("meaning x is the joint probability of residue [a] being".to_string());
        lines.push("present at node [A] and residue [b] being present at node [B].".to_string());
        lines.push(clade_line('A', self.tree, self.clades.0));
        lines.push(clade_line('B', self.tree, self.clades.1));
        lines.push(RULE.to_string());
        lines.push(HEADER.to_string());
        lines
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in self.lines() {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subrecon_phylo::{JointProbabilities, RateCategories};

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-2.5, 0), -2.0);
        assert_eq!(round_to(-12.3456, 2), -12.35);
        assert_eq!(format_rounded(0.99999, 2), "1.0");
        assert_eq!(format_rounded(0.4, 2), "0.4");
        assert_eq!(format_rounded(-7.123456, 3), "-7.123");
    }

    #[test]
    fn result_line_layout() {
        let mut values = vec![0.0; 400];
        values[1] = 0.7;
        values[0] = 0.3;
        let joint = JointProbabilities::from_values(20, values).unwrap();
        let site = SiteResult::from_joint(4, -10.0 / 3.0, &joint, 0.25, true);
        assert_eq!(site_line(&site, 2), "Result\t5\t-3.33\tAR:0.7\tAA:0.3");
    }

    #[test]
    fn summary_lines() {
        assert_eq!(total_line(-1.5), "Total lnL: -1.5000000000");
        assert_eq!(error_line(0), "ERROR: Site 1");
        let [first, _] = nothing_reported(0.4);
        assert!(first.ends_with("(threshold=0.40000)"));
    }

    #[test]
    fn preamble_names_focal_clades() {
        let tree = PhyloTree::from_newick("((X:0.1,Y:0.1):0.2,(Z:0.1,W:0.3):0.1);").unwrap();
        let clades = tree.focal_clades().unwrap();
        let rates = RateCategories::gamma(0.5, 4).unwrap();
        let preamble = Preamble {
            model: &rates,
            rates: &rates,
            tree: &tree,
            clades,
            threads: 2,
            sanity_check: false,
        };
        let lines = preamble.lines();
        assert_eq!(lines[0], TITLE);
        assert!(lines.contains(&"Using 2 thread(s)".to_string()));
        assert!(lines.contains(&"Node [A] has 2 tips and contains taxon X.".to_string()));
        assert!(lines.contains(&"Node [B] has 2 tips and contains taxon Z.".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some(HEADER));
        assert!(!lines.iter().any(|l| l == SANITY_BANNER));
    }

    #[test]
    fn preamble_announces_sanity_check() {
        let tree = PhyloTree::from_newick("(X:0.1,Y:0.2);").unwrap();
        let rates = RateCategories::single();
        let preamble = Preamble {
            model: &rates,
            rates: &rates,
            tree: &tree,
            clades: tree.focal_clades().unwrap(),
            threads: 1,
            sanity_check: true,
        };
        let lines = preamble.lines();
        let at = lines.iter().position(|l| l == SANITY_BANNER).unwrap();
        assert_eq!(lines[at], "######### sanityCheck == true #########");
        assert!(lines[at - 1].is_empty());
        assert_eq!(lines[at + 2], "Using 1 thread(s)");
    }
}
