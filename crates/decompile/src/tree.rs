//! Arena-backed script node tree.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`].
//! The parent link is set exactly once, when a node is attached; the
//! tree is acyclic by construction because a node's parent always
//! exists before the node does.

/// Index of a node in its [`ScriptTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Structural variants of the reconstructed script.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Ordered sequence of statements. Labeled blocks head a
    /// subroutine; the root and construct bodies are unlabeled.
    Block { label: Option<String> },
    /// Two-way branch on a rendered condition.
    Conditional { condition: String, offset: u32 },
    /// Iteration; the single child Block is the body.
    Loop { offset: u32 },
    /// Subroutine call by entry offset.
    Call { target: u32, offset: u32 },
    /// Folded expression statement.
    Expression { text: String, offset: u32 },
    Return { offset: u32 },
    /// Disassembly-form fallback line.
    Raw { text: String, offset: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// The whole reconstructed script, rooted at a synthetic Block whose
/// children are the per-subroutine Blocks in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl ScriptTree {
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Block { label: None },
            parent: None,
            children: Vec::new(),
        };
        ScriptTree {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Attach a new node under `parent`. The parent link never changes
    /// after this.
    pub fn add(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Indentation depth: the number of enclosing Blocks, the root not
    /// counted. Computed from the parent chain on demand, so nodes can
    /// be built and rendered in any order.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth: usize = 0;
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            if matches!(self.nodes[parent.0].kind, NodeKind::Block { .. }) {
                depth += 1;
            }
            cursor = self.nodes[parent.0].parent;
        }
        depth.saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The synthetic root is always present.
        self.nodes.len() == 1
    }
}

impl Default for ScriptTree {
    fn default() -> Self {
        Self::new()
    }
}
