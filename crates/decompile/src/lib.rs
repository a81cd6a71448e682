//! Decompilation pipeline: decode, analyze, rebuild, render.
//!
//! [`decompile`] is the one-call entry point used by tooling. Only
//! decoder-level corruption makes it fail; every other condition is
//! reported through diagnostics next to a best-effort tree.

pub mod builder;
pub mod emit;
pub mod tree;

use ncsdc_analysis::{analyze, Diagnostic};
use ncsdc_common::{DecodeError, Script};

pub use builder::{build, subroutine_label};
pub use emit::{render, render_node};
pub use tree::{Node, NodeId, NodeKind, ScriptTree};

/// Output of one decompilation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Decompilation {
    pub tree: ScriptTree,
    pub diagnostics: Vec<Diagnostic>,
}

impl Decompilation {
    /// Rendered text of the whole tree.
    pub fn text(&self) -> String {
        render(&self.tree)
    }
}

/// Run the full pipeline over a raw script buffer.
pub fn decompile(bytes: &[u8]) -> Result<Decompilation, DecodeError> {
    let script = Script::decode(bytes)?;
    let analysis = analyze(&script);
    let tree = build(&script, &analysis);
    Ok(Decompilation {
        tree,
        diagnostics: analysis.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncsdc_analysis::DiagKind;
    use ncsdc_common::{Opcode, Operands, Qualifier};

    fn bytes_for(parts: Vec<(Opcode, Qualifier, Operands)>) -> Vec<u8> {
        Script::assemble(parts).encode()
    }

    #[test]
    fn push_add_return_decompiles_cleanly() {
        let out = decompile(&bytes_for(vec![
            (Opcode::Const, Qualifier::Int, Operands::ConstInt(5)),
            (Opcode::Const, Qualifier::Int, Operands::ConstInt(3)),
            (Opcode::Add, Qualifier::IntInt, Operands::None),
            (Opcode::Ret, Qualifier::None, Operands::None),
        ]))
        .unwrap();
        assert!(out.diagnostics.is_empty());
        let subs = out.tree.children(out.tree.root());
        assert_eq!(subs.len(), 1);
        let stmts = out.tree.children(subs[0]);
        assert_eq!(stmts.len(), 2);
        assert!(matches!(
            &out.tree.node(stmts[0]).kind,
            NodeKind::Expression { text, .. } if text == "(5 + 3)"
        ));
        assert!(matches!(
            out.tree.node(stmts[1]).kind,
            NodeKind::Return { .. }
        ));
        assert_eq!(out.text(), "main:\n  (5 + 3)\n  return\n");
    }

    #[test]
    fn mid_instruction_branch_yields_one_diagnostic_and_a_raw_block() {
        let out = decompile(&bytes_for(vec![
            (Opcode::Const, Qualifier::Int, Operands::ConstInt(0)), // 13
            (Opcode::Jz, Qualifier::None, Operands::Branch(9)),     // 19 -> mid
            (Opcode::Ret, Qualifier::None, Operands::None),         // 25
        ]))
        .unwrap();
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagKind::InvalidBranchTarget);
        let subs = out.tree.children(out.tree.root());
        assert!(out
            .tree
            .children(subs[0])
            .iter()
            .all(|&id| matches!(out.tree.node(id).kind, NodeKind::Raw { .. })));
    }

    #[test]
    fn forward_call_names_the_later_subroutine_once() {
        let out = decompile(&bytes_for(vec![
            (Opcode::Jsr, Qualifier::None, Operands::Branch(8)), // 13 -> 21
            (Opcode::Ret, Qualifier::None, Operands::None),      // 19
            (Opcode::Nop, Qualifier::None, Operands::None),      // 21
            (Opcode::Ret, Qualifier::None, Operands::None),      // 23
        ]))
        .unwrap();
        let text = out.text();
        assert!(text.contains("call sub_00000015"));
        assert_eq!(text.matches("sub_00000015:").count(), 1);
    }

    #[test]
    fn underflow_demotes_one_subroutine_and_spares_the_sibling() {
        let out = decompile(&bytes_for(vec![
            (Opcode::Add, Qualifier::IntInt, Operands::None),    // 13: underflow
            (Opcode::Jsr, Qualifier::None, Operands::Branch(8)), // 15 -> 23
            (Opcode::Ret, Qualifier::None, Operands::None),      // 21
            (Opcode::Const, Qualifier::Int, Operands::ConstInt(7)), // 23
            (Opcode::Ret, Qualifier::None, Operands::None),      // 29
        ]))
        .unwrap();
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::StackUnderflow));
        let subs = out.tree.children(out.tree.root());
        assert_eq!(subs.len(), 2);
        // Demoted caller renders raw; callee still folds.
        assert!(out
            .tree
            .children(subs[0])
            .iter()
            .all(|&id| matches!(out.tree.node(id).kind, NodeKind::Raw { .. })));
        assert!(out
            .tree
            .children(subs[1])
            .iter()
            .any(|&id| matches!(out.tree.node(id).kind, NodeKind::Expression { .. })));
    }

    #[test]
    fn truncated_buffer_is_fatal() {
        let mut bytes = bytes_for(vec![(
            Opcode::Const,
            Qualifier::Int,
            Operands::ConstInt(5),
        )]);
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            decompile(&bytes),
            Err(DecodeError::TruncatedOperand { .. })
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_part() -> impl Strategy<Value = (Opcode, Qualifier, Operands)> {
            prop_oneof![
                any::<i32>().prop_map(|v| (Opcode::Const, Qualifier::Int, Operands::ConstInt(v))),
                Just((Opcode::Add, Qualifier::IntInt, Operands::None)),
                Just((Opcode::Nop, Qualifier::None, Operands::None)),
                Just((Opcode::Ret, Qualifier::None, Operands::None)),
            ]
        }

        proptest! {
            // Branchless input always yields one subroutine and a
            // byte-stable rendering.
            #[test]
            fn linear_scripts_always_decompile(parts in prop::collection::vec(arb_part(), 1..24)) {
                let out = decompile(&bytes_for(parts)).unwrap();
                prop_assert_eq!(out.tree.children(out.tree.root()).len(), 1);
                prop_assert_eq!(out.text(), out.text());
            }
        }
    }

    #[test]
    fn render_is_stable_across_calls() {
        let out = decompile(&bytes_for(vec![
            (Opcode::Const, Qualifier::Int, Operands::ConstInt(0)), // 13
            (Opcode::Jz, Qualifier::None, Operands::Branch(8)),     // 19 -> 27
            (Opcode::Nop, Qualifier::None, Operands::None),         // 25
            (Opcode::Ret, Qualifier::None, Operands::None),         // 27
        ]))
        .unwrap();
        assert_eq!(out.text(), out.text());
    }
}
