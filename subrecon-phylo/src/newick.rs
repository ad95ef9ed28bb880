//! Newick tree reader.
//!
//! Grammar accepted:
//! ```text
//! tree     = subtree ';'
//! subtree  = '(' subtree (',' subtree)* ')' label | label
//! label    = name? (':' length)?
//! name     = bare | "'" quoted "'"
//! ```
//! Square-bracket comments are skipped wherever whitespace is allowed.
//! Internal node labels (clade names, bootstrap values) are kept as names.

use std::path::Path;

use subrecon_core::{ReconError, Result};

use crate::tree::{Node, NodeId, PhyloTree};

/// Parse a Newick format string into a `PhyloTree`.
pub fn parse(input: &str) -> Result<PhyloTree> {
    let mut reader = Reader {
        input: input.as_bytes(),
        pos: 0,
        nodes: Vec::new(),
    };
    let root = reader.subtree(None)?;
    reader.skip_ignorable()?;
    if reader.peek() != Some(b';') {
        return Err(reader.error("expected ';' after tree"));
    }
    PhyloTree::from_nodes(reader.nodes, root)
}

/// Read the first tree from a Newick file.
pub fn parse_path(path: impl AsRef<Path>) -> Result<PhyloTree> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse(&text)
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Reader<'a> {
    fn subtree(&mut self, parent: Option<NodeId>) -> Result<NodeId> {
        self.skip_ignorable()?;
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            parent,
            children: Vec::new(),
            branch_length: None,
            name: None,
        });

        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                let child = self.subtree(Some(id))?;
                self.nodes[id].children.push(child);
                self.skip_ignorable()?;
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
        }

        self.label(id)?;
        Ok(id)
    }

    fn label(&mut self, id: NodeId) -> Result<()> {
        self.skip_ignorable()?;
        let name = if self.peek() == Some(b'\'') {
            self.quoted()?
        } else {
            self.bare()
        };
        if !name.is_empty() {
            self.nodes[id].name = Some(name);
        }

        self.skip_ignorable()?;
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_ignorable()?;
            let start = self.pos;
            while let Some(b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E') = self.peek() {
                self.pos += 1;
            }
            let text = String::from_utf8_lossy(&self.input[start..self.pos]);
            let length: f64 = text
                .parse()
                .map_err(|_| self.error(&format!("invalid branch length '{}'", text)))?;
            self.nodes[id].branch_length = Some(length);
        }
        Ok(())
    }

    fn bare(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b':' | b',' | b')' | b'(' | b';' | b'[') || b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Quoted label; a doubled quote stands for a literal one.
    fn quoted(&mut self) -> Result<String> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted label")),
                Some(b'\'') if self.input.get(self.pos + 1) == Some(&b'\'') => {
                    out.push(b'\'');
                    self.pos += 2;
                }
                Some(b'\'') => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&out).into_owned());
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn skip_ignorable(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'[') => {
                    let close = self.input[self.pos..]
                        .iter()
                        .position(|&b| b == b']')
                        .ok_or_else(|| self.error("unterminated comment"))?;
                    self.pos += close + 1;
                }
                _ => return Ok(()),
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, msg: &str) -> ReconError {
        ReconError::Parse(format!("Newick: {} at byte {}", msg, self.pos))
    }
}
