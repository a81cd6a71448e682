//! Indented text rendering of a [`ScriptTree`].
//!
//! Rendering is a pure function of the tree: two spaces per depth
//! level, `\n` line endings, no state carried between calls, so any
//! top-level child can be rendered on its own.

use crate::tree::{NodeId, NodeKind, ScriptTree};

/// Render the whole tree, one subroutine block after another separated
/// by a blank line.
pub fn render(tree: &ScriptTree) -> String {
    let mut out = String::new();
    for (i, &child) in tree.children(tree.root()).iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_node(tree, child, &mut out);
    }
    out
}

/// Render one subtree into `out`. Restartable at any node; indentation
/// comes from the node's own depth, not from caller state.
pub fn render_node(tree: &ScriptTree, id: NodeId, out: &mut String) {
    let node = tree.node(id);
    let indent = "  ".repeat(tree.depth(id));
    match &node.kind {
        NodeKind::Block { label } => {
            if let Some(label) = label {
                out.push_str(&indent);
                out.push_str(label);
                out.push_str(":\n");
            }
            for &child in &node.children {
                render_node(tree, child, out);
            }
        }
        NodeKind::Conditional { condition, .. } => {
            out.push_str(&format!("{indent}if {condition}\n"));
            let mut bodies = node.children.iter();
            if let Some(&then_block) = bodies.next() {
                render_node(tree, then_block, out);
            }
            if let Some(&else_block) = bodies.next() {
                out.push_str(&format!("{indent}else\n"));
                render_node(tree, else_block, out);
            }
        }
        NodeKind::Loop { .. } => {
            out.push_str(&format!("{indent}loop\n"));
            for &child in &node.children {
                render_node(tree, child, out);
            }
        }
        NodeKind::Call { target, .. } => {
            out.push_str(&format!("{indent}call sub_{target:08x}\n"));
        }
        NodeKind::Expression { text, .. } => {
            out.push_str(&format!("{indent}{text}\n"));
        }
        NodeKind::Return { .. } => {
            out.push_str(&format!("{indent}return\n"));
        }
        NodeKind::Raw { text, .. } => {
            out.push_str(&format!("{indent}{text}\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ScriptTree {
        let mut tree = ScriptTree::new();
        let main = tree.add(
            tree.root(),
            NodeKind::Block {
                label: Some("main".into()),
            },
        );
        let cond = tree.add(
            main,
            NodeKind::Conditional {
                condition: "(x > 0)".into(),
                offset: 19,
            },
        );
        let then_block = tree.add(cond, NodeKind::Block { label: None });
        tree.add(
            then_block,
            NodeKind::Expression {
                text: "(5 + 3)".into(),
                offset: 25,
            },
        );
        let else_block = tree.add(cond, NodeKind::Block { label: None });
        tree.add(
            else_block,
            NodeKind::Call {
                target: 0x2a,
                offset: 31,
            },
        );
        tree.add(main, NodeKind::Return { offset: 43 });
        tree
    }

    #[test]
    fn renders_heads_bodies_and_else() {
        let text = render(&sample_tree());
        assert_eq!(
            text,
            "main:\n\
             \x20 if (x > 0)\n\
             \x20   (5 + 3)\n\
             \x20 else\n\
             \x20   call sub_0000002a\n\
             \x20 return\n"
        );
    }

    #[test]
    fn rendering_twice_is_byte_identical() {
        let tree = sample_tree();
        assert_eq!(render(&tree), render(&tree));
    }

    #[test]
    fn top_level_children_render_independently() {
        let mut tree = ScriptTree::new();
        for label in ["main", "sub_00000040"] {
            let block = tree.add(
                tree.root(),
                NodeKind::Block {
                    label: Some(label.into()),
                },
            );
            tree.add(block, NodeKind::Return { offset: 0 });
        }
        let whole = render(&tree);
        let mut pieces = String::new();
        for &child in tree.children(tree.root()) {
            if !pieces.is_empty() {
                pieces.push('\n');
            }
            render_node(&tree, child, &mut pieces);
        }
        assert_eq!(whole, pieces);
    }
}
