//! Rooted phylogenetic tree stored as an arena of nodes.
//!
//! Nodes live in a flat `Vec<Node>` and refer to each other by `NodeId`
//! (a `usize` index), so a tree can be shared read-only between worker
//! threads without reference counting.

use subrecon_core::{ReconError, Result, Summarizable};

/// Index into the tree's node arena.
pub type NodeId = usize;

/// A single node in a phylogenetic tree.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Index of this node in the arena.
    pub id: NodeId,
    /// Parent node (None for root).
    pub parent: Option<NodeId>,
    /// Child nodes, in input order.
    pub children: Vec<NodeId>,
    /// Branch length from this node to its parent.
    pub branch_length: Option<f64>,
    /// Taxon name for leaves, optional label for internal nodes.
    pub name: Option<String>,
}

impl Node {
    /// True if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted phylogenetic tree stored as an arena of nodes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhyloTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl PhyloTree {
    /// Create a new tree with a single unnamed root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                id: 0,
                parent: None,
                children: Vec::new(),
                branch_length: None,
                name: None,
            }],
            root: 0,
        }
    }

    /// Create a tree from pre-built nodes and a root index.
    ///
    /// Node ids must equal their arena position and every child/parent
    /// link must be mutual.
    pub fn from_nodes(nodes: Vec<Node>, root: NodeId) -> Result<Self> {
        if nodes.is_empty() {
            return Err(ReconError::InvalidInput("empty node list".into()));
        }
        if root >= nodes.len() {
            return Err(ReconError::InvalidInput(format!(
                "root index {} out of range ({})",
                root,
                nodes.len()
            )));
        }
        for (pos, node) in nodes.iter().enumerate() {
            if node.id != pos {
                return Err(ReconError::InvalidInput(format!(
                    "node at position {} carries id {}",
                    pos, node.id
                )));
            }
            for &child in &node.children {
                if nodes.get(child).and_then(|c| c.parent) != Some(pos) {
                    return Err(ReconError::InvalidInput(format!(
                        "child {} of node {} does not point back to its parent",
                        child, pos
                    )));
                }
            }
        }
        Ok(Self { nodes, root })
    }

    /// Add a child to `parent` and return its `NodeId`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: Option<String>,
        branch_length: Option<f64>,
    ) -> Result<NodeId> {
        if parent >= self.nodes.len() {
            return Err(ReconError::InvalidInput(format!(
                "parent index {} out of range ({})",
                parent,
                self.nodes.len()
            )));
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            children: Vec::new(),
            branch_length,
            name,
        });
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Access a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable access to a node by id.
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaf nodes.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// All leaf node ids, in arena order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id)
            .collect()
    }

    /// Sorted list of leaf names (leaves without names are excluded).
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| n.is_leaf())
            .filter_map(|n| n.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Branch length above `id`, with a missing length read as zero.
    pub fn branch_length(&self, id: NodeId) -> f64 {
        self.nodes
            .get(id)
            .and_then(|n| n.branch_length)
            .unwrap_or(0.0)
    }

    /// Post-order (children before parent) node ids of the whole tree.
    pub fn iter_postorder(&self) -> impl Iterator<Item = NodeId> {
        self.postorder_from(self.root).into_iter()
    }

    /// Post-order node ids of the subtree rooted at `start`, ending with `start`.
    ///
    /// Children are visited in input order. An out-of-range `start` yields
    /// an empty list.
    pub fn postorder_from(&self, start: NodeId) -> Vec<NodeId> {
        if start >= self.nodes.len() {
            return Vec::new();
        }
        // Reverse of a (node, right-to-left children) preorder.
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().copied());
        }
        order.reverse();
        order
    }

    /// Leaf ids below (or equal to) `start`.
    pub fn leaves_under(&self, start: NodeId) -> Vec<NodeId> {
        self.postorder_from(start)
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    /// The leftmost leaf below `start`, following first children.
    pub fn first_leaf(&self, start: NodeId) -> Option<NodeId> {
        let mut cur = start;
        loop {
            let node = self.nodes.get(cur)?;
            match node.children.first() {
                Some(&child) => cur = child,
                None => return Some(cur),
            }
        }
    }

    /// The two clades hanging off the root, which delimit the focal branch.
    ///
    /// The tree must be rooted on the branch of interest, so the root has
    /// exactly two children.
    pub fn focal_clades(&self) -> Result<(NodeId, NodeId)> {
        match self.nodes[self.root].children.as_slice() {
            &[a, b] => Ok((a, b)),
            children if children.len() > 2 => Err(ReconError::Config(format!(
                "tree root has {} descendants; root the tree on the branch of interest",
                children.len()
            ))),
            children => Err(ReconError::Config(format!(
                "tree root has {} descendant(s); two are required",
                children.len()
            ))),
        }
    }

    /// Reject negative or non-finite branch lengths.
    pub fn check_branch_lengths(&self) -> Result<()> {
        for node in &self.nodes {
            if let Some(bl) = node.branch_length {
                if !bl.is_finite() || bl < 0.0 {
                    return Err(ReconError::InvalidInput(format!(
                        "node {} ({}) has invalid branch length {}",
                        node.id,
                        node.name.as_deref().unwrap_or("unnamed"),
                        bl
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parse a Newick format string into a tree.
    pub fn from_newick(input: &str) -> Result<Self> {
        crate::newick::parse(input)
    }
}

impl Default for PhyloTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Summarizable for PhyloTree {
    fn summary(&self) -> String {
        let leaves = self.leaf_count();
        format!(
            "PhyloTree: {} nodes ({} leaves, {} internal)",
            self.node_count(),
            leaves,
            self.node_count() - leaves
        )
    }
}
