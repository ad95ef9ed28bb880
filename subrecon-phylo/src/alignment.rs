//! Amino acid multiple sequence alignments.
//!
//! Rows are encoded to state indices once at load time, so per-column
//! lookups during reconstruction are a couple of array reads.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use needletail::{parse_fastx_file, parse_fastx_reader};
use subrecon_core::{ReconError, Result, Summarizable};

use crate::alphabet::amino_acid_index;

/// Encoded value for gaps, ambiguity codes and anything else unrecognised.
const UNKNOWN: u8 = u8::MAX;

/// A rectangular alignment of named amino acid sequences.
#[derive(Debug, Clone)]
pub struct Alignment {
    names: Vec<String>,
    rows: Vec<Vec<u8>>,
    index: HashMap<String, usize>,
    n_columns: usize,
}

impl Alignment {
    /// Build an alignment from `(name, residues)` pairs.
    ///
    /// # Errors
    ///
    /// Fails on an empty input, duplicate names, or rows of unequal length.
    pub fn from_rows<I, S, T>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<[u8]>,
    {
        let mut names = Vec::new();
        let mut encoded = Vec::new();
        let mut index = HashMap::new();

        for (name, residues) in rows {
            let name = name.into();
            let residues = residues.as_ref();
            if let Some(first) = encoded.first().map(|r: &Vec<u8>| r.len()) {
                if residues.len() != first {
                    return Err(ReconError::InvalidInput(format!(
                        "sequence '{}' has length {}, expected {}",
                        name,
                        residues.len(),
                        first
                    )));
                }
            }
            if index.insert(name.clone(), names.len()).is_some() {
                return Err(ReconError::InvalidInput(format!(
                    "duplicate sequence name '{}'",
                    name
                )));
            }
            encoded.push(
                residues
                    .iter()
                    .map(|&b| amino_acid_index(b).map_or(UNKNOWN, |s| s as u8))
                    .collect(),
            );
            names.push(name);
        }

        if encoded.is_empty() {
            return Err(ReconError::InvalidInput("no sequences provided".into()));
        }
        let n_columns = encoded[0].len();
        if n_columns == 0 {
            return Err(ReconError::InvalidInput("empty sequences".into()));
        }

        Ok(Self {
            names,
            rows: encoded,
            index,
            n_columns,
        })
    }

    /// Read aligned FASTA from any reader. The sequence name is the first
    /// whitespace-delimited word of the header.
    pub fn from_fasta_reader<R: Read + Send>(reader: R) -> Result<Self> {
        let mut records =
            parse_fastx_reader(reader).map_err(|e| ReconError::Parse(e.to_string()))?;
        let mut rows = Vec::new();
        while let Some(record) = records.next() {
            let record = record.map_err(|e| ReconError::Parse(e.to_string()))?;
            rows.push((header_name(record.id()), record.seq().into_owned()));
        }
        Self::from_rows(rows)
    }

    /// Read an aligned FASTA file.
    pub fn from_fasta_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut records = parse_fastx_file(path)
            .map_err(|e| ReconError::Parse(format!("{}: {}", path.display(), e)))?;
        let mut rows = Vec::new();
        while let Some(record) = records.next() {
            let record = record.map_err(|e| ReconError::Parse(e.to_string()))?;
            rows.push((header_name(record.id()), record.seq().into_owned()));
        }
        Self::from_rows(rows)
    }

    /// Parse a PHYLIP alignment (sequential or interleaved, relaxed names).
    ///
    /// The first line gives the number of taxa and columns. Each taxon's
    /// first line starts with its name; whitespace inside sequences is
    /// ignored.
    pub fn from_phylip_str(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let header = lines
            .next()
            .ok_or_else(|| ReconError::Parse("PHYLIP: empty input".into()))?;
        let dims: Vec<usize> = header
            .split_whitespace()
            .take(2)
            .map(|t| {
                t.parse()
                    .map_err(|_| ReconError::Parse(format!("PHYLIP: bad header '{}'", header)))
            })
            .collect::<Result<_>>()?;
        if dims.len() != 2 || dims[0] == 0 {
            return Err(ReconError::Parse(format!("PHYLIP: bad header '{}'", header)));
        }
        let (n_taxa, n_chars) = (dims[0], dims[1]);
        let body: Vec<&str> = lines.collect();

        match phylip_sequential(&body, n_taxa, n_chars) {
            Some(rows) => Self::from_rows(rows),
            None => Self::from_rows(phylip_interleaved(&body, n_taxa, n_chars)?),
        }
    }

    /// Read a PHYLIP alignment file.
    pub fn from_phylip_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_phylip_str(&text)
    }

    /// Number of sequences.
    pub fn n_sequences(&self) -> usize {
        self.rows.len()
    }

    /// Number of alignment columns, shared by all sequences.
    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Sequence names in input order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Row index of a named sequence.
    pub fn row_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Observed state of `name` at `column`; `None` for missing data or an
    /// unknown name/column.
    pub fn state_at(&self, name: &str, column: usize) -> Option<usize> {
        self.state_at_row(self.row_index(name)?, column)
    }

    /// Observed state of row `row` at `column`; `None` for missing data.
    pub fn state_at_row(&self, row: usize, column: usize) -> Option<usize> {
        match self.rows.get(row)?.get(column)? {
            &UNKNOWN => None,
            &s => Some(s as usize),
        }
    }
}

impl Summarizable for Alignment {
    fn summary(&self) -> String {
        format!(
            "Alignment: {} sequences x {} columns",
            self.n_sequences(),
            self.n_columns
        )
    }
}

fn header_name(id: &[u8]) -> String {
    let header = String::from_utf8_lossy(id);
    header.split_whitespace().next().unwrap_or("").to_string()
}

fn split_name(line: &str) -> (String, Vec<u8>) {
    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or("").to_string();
    let residues = parts.flat_map(|p| p.bytes()).collect();
    (name, residues)
}

fn squeeze(line: &str) -> impl Iterator<Item = u8> + '_ {
    line.bytes().filter(|b| !b.is_ascii_whitespace())
}

/// Each taxon block is a name line followed by continuation lines until
/// `n_chars` residues are read. `None` if the body does not fit that shape.
fn phylip_sequential(body: &[&str], n_taxa: usize, n_chars: usize) -> Option<Vec<(String, Vec<u8>)>> {
    let mut rows = Vec::with_capacity(n_taxa);
    let mut lines = body.iter();
    for _ in 0..n_taxa {
        let (name, mut residues) = split_name(lines.next()?);
        while residues.len() < n_chars {
            residues.extend(squeeze(lines.next()?));
        }
        if residues.len() != n_chars {
            return None;
        }
        rows.push((name, residues));
    }
    if lines.next().is_some() {
        return None;
    }
    Some(rows)
}

/// First `n_taxa` lines carry names, later blocks cycle through taxa in order.
fn phylip_interleaved(
    body: &[&str],
    n_taxa: usize,
    n_chars: usize,
) -> Result<Vec<(String, Vec<u8>)>> {
    if body.len() < n_taxa {
        return Err(ReconError::Parse(format!(
            "PHYLIP: expected {} taxa, found {} lines",
            n_taxa,
            body.len()
        )));
    }
    let mut rows: Vec<(String, Vec<u8>)> = body[..n_taxa].iter().map(|l| split_name(l)).collect();
    for (i, line) in body[n_taxa..].iter().enumerate() {
        rows[i % n_taxa].1.extend(squeeze(line));
    }
    for (name, residues) in &rows {
        if residues.len() != n_chars {
            return Err(ReconError::Parse(format!(
                "PHYLIP: sequence '{}' has {} characters, header says {}",
                name,
                residues.len(),
                n_chars
            )));
        }
    }
    Ok(rows)
}
