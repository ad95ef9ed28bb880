use std::io::Write;
use std::path::Path;

use clap::Parser;
use subrecon_cli::{execute, Args};
use tempfile::TempDir;

const TREE: &str = "((A:0.05,B:0.1):0.1,(C:0.2,D:0.05):0.3);\n";
const FASTA: &str = ">A\nMKVLW\n>B\nMKVLW\n>C\nMRVIW\n>D\nMRVI-\n";

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
    path.display().to_string()
}

fn run(dir: &TempDir, extra: &[&str]) -> anyhow::Result<String> {
    let aln = write(dir.path(), "aln.fasta", FASTA);
    let tree = write(dir.path(), "tree.nwk", TREE);
    let mut argv = vec!["subrecon".to_string(), "-s".into(), aln, "-t".into(), tree];
    argv.extend(extra.iter().map(|s| s.to_string()));
    let args = Args::try_parse_from(argv)?;
    let mut out = Vec::new();
    execute(&args, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn result_lines(report: &str) -> Vec<&str> {
    report.lines().filter(|l| l.starts_with("Result\t")).collect()
}

#[test]
fn all_sites_report() {
    let dir = TempDir::new().unwrap();
    let report = run(&dir, &["-m", "wag", "-a", "0.5", "-k", "4", "--debug"]).unwrap();

    assert!(report.starts_with("SubRecon: Ancestral Reconstruction"));
    assert!(report.lines().any(|l| l == "######### sanityCheck == true #########"));
    assert!(report.contains("Node [A] has 2 tips and contains taxon A."));
    assert!(report.contains("Node [B] has 2 tips and contains taxon C."));
    assert!(report.contains("[HEADER]\tsite\tln[P(D|theta,alpha)]\tP(A=a,B=b|D,theta,alpha)"));

    // Column 2 (K in clade A, R in clade B) is the only one that changes
    // across the root branch with appreciable probability.
    let results = result_lines(&report);
    assert!(results.iter().any(|l| l.starts_with("Result\t2\t") && l.contains("KR:")));
    assert!(!results.iter().any(|l| l.starts_with("Result\t1\t")));

    let total = report.lines().find(|l| l.starts_with("Total lnL: ")).unwrap();
    let value: f64 = total["Total lnL: ".len()..].parse().unwrap();
    assert!(value < 0.0);
}

#[test]
fn verbose_reports_every_column() {
    let dir = TempDir::new().unwrap();
    let report = run(&dir, &["-m", "jtt", "-v"]).unwrap();
    assert_eq!(result_lines(&report).len(), 5);
}

#[test]
fn single_site_has_no_total() {
    let dir = TempDir::new().unwrap();
    let report = run(&dir, &["-m", "dayhoff", "--site", "1"]).unwrap();
    assert!(!report.contains("Total lnL"));
    assert!(result_lines(&report).is_empty());
    assert!(report.contains("0 sites have non-identical substitution probabilities"));
    assert!(report.contains("(threshold=0.40000)"));
}

#[test]
fn threshold_zero_lists_all_pairs() {
    let dir = TempDir::new().unwrap();
    let report = run(&dir, &["-m", "wag", "--site", "5", "--threshold", "0", "--nosort", "--sd", "4"]).unwrap();
    let lines = result_lines(&report);
    assert_eq!(lines.len(), 1);
    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(fields.len(), 3 + 400);
    assert!(fields[3].starts_with("AA:"));
    assert!(fields[4].starts_with("AR:"));
}

#[test]
fn parallel_report_matches_sequential() {
    let dir = TempDir::new().unwrap();
    let one = run(&dir, &["-m", "wag", "-a", "1.0", "-k", "4", "-v"]).unwrap();
    let four = run(&dir, &["-m", "wag", "-a", "1.0", "-k", "4", "-v", "-T", "4"]).unwrap();
    let strip = |r: &str| -> Vec<String> {
        r.lines().filter(|l| !l.starts_with("Using ")).map(String::from).collect()
    };
    assert_eq!(strip(&one), strip(&four));
}

#[test]
fn failed_site_is_reported_and_total_follows() {
    // With zero-length branches the two leaves must agree, so column 2 has
    // likelihood zero.
    let dir = TempDir::new().unwrap();
    let aln = write(dir.path(), "pair.fasta", ">A\nAA\n>B\nAR\n");
    let tree = write(dir.path(), "pair.nwk", "(A:0,B:0);");
    let args = Args::try_parse_from(["subrecon", "-s", &aln, "-t", &tree, "-m", "wag"]).unwrap();
    let mut out = Vec::new();
    execute(&args, &mut out).unwrap();
    let report = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = report.lines().collect();
    let error = lines.iter().position(|&l| l == "ERROR: Site 2").unwrap();
    let total = lines.iter().position(|l| l.starts_with("Total lnL: ")).unwrap();
    assert!(total > error);
    assert!(!lines.iter().any(|&l| l == "ERROR: Site 1"));

    let value: f64 = lines[total]["Total lnL: ".len()..].parse().unwrap();
    // ln(pi_A) under WAG
    assert!((value + 2.4461333).abs() < 1e-6, "total {}", value);
}

#[test]
fn blosum62_runs() {
    let dir = TempDir::new().unwrap();
    let report = run(&dir, &["-m", "blosum62", "-v"]).unwrap();
    assert!(report.contains("BLOSUM62 (Henikoff & Henikoff 1992)"));
    assert_eq!(result_lines(&report).len(), 5);
}

#[test]
fn rejected_configurations() {
    let dir = TempDir::new().unwrap();
    assert!(run(&dir, &["-m", "wag", "--site", "6"]).is_err());
    assert!(run(&dir, &["-m", "wag", "--sd", "16"]).is_err());
    assert!(run(&dir, &["-m", "lg"]).is_err());
    assert!(run(&dir, &["-m", "wag", "-T", "0"]).is_err());

    let aln = write(dir.path(), "short.fasta", ">A\nM\n>B\nM\n>C\nM\n");
    let tree = write(dir.path(), "tri.nwk", "(A:0.1,B:0.1,C:0.1);");
    let args = Args::try_parse_from(["subrecon", "-s", &aln, "-t", &tree, "-m", "wag"]).unwrap();
    assert!(execute(&args, &mut Vec::new()).is_err());

    let tree = write(dir.path(), "missing.nwk", "(A:0.1,(B:0.1,E:0.2):0.1);");
    let args = Args::try_parse_from(["subrecon", "-s", &aln, "-t", &tree, "-m", "wag"]).unwrap();
    assert!(execute(&args, &mut Vec::new()).is_err());
}

#[test]
fn phylip_input() {
    let dir = TempDir::new().unwrap();
    let phy = write(dir.path(), "aln.phy", " 4 5\nA MKVLW\nB MKVLW\nC MRVIW\nD MRVI-\n");
    let tree = write(dir.path(), "tree.nwk", TREE);
    let args =
        Args::try_parse_from(["subrecon", "-s", &phy, "-t", &tree, "--phy", "-m", "wag", "-v"]).unwrap();
    let mut out = Vec::new();
    execute(&args, &mut out).unwrap();
    let report = String::from_utf8(out).unwrap();
    assert_eq!(result_lines(&report).len(), 5);
}
