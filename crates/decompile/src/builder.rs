//! Tree construction from a classified analysis.
//!
//! Walks each subroutine's instructions in offset order, folding
//! straight-line value-producing instructions into expression text and
//! opening child Blocks for conditionals and loops. Anything that does
//! not fold cleanly becomes a Raw disassembly line; a demoted
//! subroutine becomes nothing but Raw lines.

use std::collections::{BTreeMap, BTreeSet};

use ncsdc_analysis::{Analysis, ControlShape, Subroutine};
use ncsdc_common::{Instruction, Opcode, Operands, Qualifier, Script};

use crate::tree::{NodeId, NodeKind, ScriptTree};

/// Build the full tree: one labeled Block per subroutine under a
/// synthetic root, in discovery order.
pub fn build(script: &Script, analysis: &Analysis) -> ScriptTree {
    let mut tree = ScriptTree::new();
    for sub in &analysis.subroutines {
        let root = tree.root();
        let block = tree.add(
            root,
            NodeKind::Block {
                label: Some(subroutine_label(sub)),
            },
        );
        if sub.is_raw() {
            for inst in &script.instructions[sub.start_index..sub.end_index] {
                tree.add(
                    block,
                    NodeKind::Raw {
                        text: inst.fmt_line(),
                        offset: inst.offset,
                    },
                );
            }
        } else {
            Builder::new(script, sub, &mut tree, block).run();
        }
    }
    tree
}

/// Display name for a subroutine: the implicit entry is `main`, every
/// other one is named by its entry offset.
pub fn subroutine_label(sub: &Subroutine) -> String {
    if sub.implicit {
        "main".to_string()
    } else {
        format!("sub_{:08x}", sub.entry)
    }
}

/// One open Conditional/Loop body; closed when the walk reaches `end`.
struct Region {
    end: u32,
    block: NodeId,
    /// `(conditional node, join)` when an else body follows this one.
    pending_else: Option<(NodeId, u32)>,
}

struct Builder<'a> {
    script: &'a Script,
    sub: &'a Subroutine,
    tree: &'a mut ScriptTree,
    base: NodeId,
    /// Innermost open region last.
    regions: Vec<Region>,
    /// Pending folded expressions, oldest first, with origin offsets.
    exprs: Vec<(u32, String)>,
    conditionals: BTreeMap<u32, (u32, Option<u32>)>,
    /// Loop head to one past its back jump.
    loops: BTreeMap<u32, u32>,
    exits: BTreeSet<u32>,
}

impl<'a> Builder<'a> {
    fn new(
        script: &'a Script,
        sub: &'a Subroutine,
        tree: &'a mut ScriptTree,
        base: NodeId,
    ) -> Self {
        let mut conditionals = BTreeMap::new();
        let mut loops: BTreeMap<u32, u32> = BTreeMap::new();
        let mut exits = BTreeSet::new();
        for shape in &sub.control {
            match *shape {
                ControlShape::Conditional {
                    branch_at,
                    then_end,
                    else_end,
                } => {
                    conditionals.insert(branch_at, (then_end, else_end));
                }
                ControlShape::Loop { head, back_at } => {
                    let end = script
                        .instruction_at(back_at)
                        .map(Instruction::next_offset)
                        .unwrap_or(back_at);
                    let entry = loops.entry(head).or_insert(end);
                    *entry = (*entry).max(end);
                }
                ControlShape::ExitJump { at } => {
                    exits.insert(at);
                }
            }
        }
        Builder {
            script,
            sub,
            tree,
            base,
            regions: Vec::new(),
            exprs: Vec::new(),
            conditionals,
            loops,
            exits,
        }
    }

    fn run(mut self) {
        for idx in self.sub.start_index..self.sub.end_index {
            let inst = &self.script.instructions[idx];
            self.close_regions(inst.offset);
            self.open_loop(inst.offset);
            self.step(inst);
        }
        self.flush();
        self.close_regions(u32::MAX);
    }

    fn current(&self) -> NodeId {
        self.regions.last().map(|r| r.block).unwrap_or(self.base)
    }

    /// Close every region whose end has been reached; the innermost
    /// closes first. A closing then-body with a recorded else opens
    /// the else body in its place.
    fn close_regions(&mut self, offset: u32) {
        while let Some(top) = self.regions.last() {
            if top.end > offset {
                break;
            }
            self.flush();
            let closed = self.regions.pop().unwrap_or_else(|| unreachable!());
            if let Some((cond, join)) = closed.pending_else {
                let block = self.tree.add(cond, NodeKind::Block { label: None });
                self.regions.push(Region {
                    end: join,
                    block,
                    pending_else: None,
                });
            }
        }
    }

    fn open_loop(&mut self, offset: u32) {
        if let Some(&end) = self.loops.get(&offset) {
            let parent = self.current();
            let node = self.tree.add(parent, NodeKind::Loop { offset });
            let block = self.tree.add(node, NodeKind::Block { label: None });
            self.regions.push(Region {
                end,
                block,
                pending_else: None,
            });
        }
    }

    /// Emit every pending expression as an Expression statement.
    fn flush(&mut self) {
        let parent = self.current();
        for (offset, text) in std::mem::take(&mut self.exprs) {
            self.tree.add(parent, NodeKind::Expression { text, offset });
        }
    }

    fn raw(&mut self, inst: &Instruction) {
        self.flush();
        let parent = self.current();
        self.tree.add(
            parent,
            NodeKind::Raw {
                text: inst.fmt_line(),
                offset: inst.offset,
            },
        );
    }

    fn step(&mut self, inst: &Instruction) {
        match inst.opcode {
            Opcode::Const => self.exprs.push((inst.offset, const_text(inst))),
            Opcode::Reserve => self
                .exprs
                .push((inst.offset, reserve_text(inst.qualifier).to_string())),
            Opcode::CopyTopSp => {
                if let Operands::StackCopy { offset, .. } = inst.operands {
                    self.exprs.push((inst.offset, format!("stack[{offset}]")));
                }
            }
            Opcode::CopyTopBp => {
                if let Operands::StackCopy { offset, .. } = inst.operands {
                    self.exprs.push((inst.offset, format!("frame[{offset}]")));
                }
            }

            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Equal
            | Opcode::NotEqual
            | Opcode::GreaterEq
            | Opcode::Greater
            | Opcode::Less
            | Opcode::LessEq
            | Opcode::LogAnd
            | Opcode::LogOr
            | Opcode::IncOr
            | Opcode::ExcOr
            | Opcode::BoolAnd
            | Opcode::ShLeft
            | Opcode::ShRight
            | Opcode::UShRight => self.fold_binary(inst),

            Opcode::Neg => self.fold_unary(inst, "-"),
            Opcode::Not => self.fold_unary(inst, "!"),
            Opcode::Comp => self.fold_unary(inst, "~"),

            Opcode::Action => self.fold_action(inst),

            Opcode::Jsr => {
                self.flush();
                if let Some(target) = inst.branch_target() {
                    let parent = self.current();
                    self.tree.add(
                        parent,
                        NodeKind::Call {
                            target: target as u32,
                            offset: inst.offset,
                        },
                    );
                }
            }

            Opcode::Ret => {
                self.flush();
                let parent = self.current();
                self.tree.add(parent, NodeKind::Return { offset: inst.offset });
            }

            Opcode::Jz | Opcode::Jnz => {
                if let Some(&(then_end, else_end)) = self.conditionals.get(&inst.offset) {
                    let condition = self.pop_condition(inst);
                    self.flush();
                    let parent = self.current();
                    let cond = self.tree.add(
                        parent,
                        NodeKind::Conditional {
                            condition,
                            offset: inst.offset,
                        },
                    );
                    let block = self.tree.add(cond, NodeKind::Block { label: None });
                    self.regions.push(Region {
                        end: then_end,
                        block,
                        pending_else: else_end.map(|join| (cond, join)),
                    });
                } else {
                    // Loop back-edge; the condition was classified away.
                    self.exprs.pop();
                    self.flush();
                }
            }

            Opcode::Jmp => {
                if self.exits.contains(&inst.offset) {
                    self.flush();
                    let parent = self.current();
                    self.tree.add(parent, NodeKind::Return { offset: inst.offset });
                } else if self.sub.consumed.contains(&inst.offset) {
                    // Else intros and back-edges render nothing themselves.
                    self.flush();
                } else {
                    // Unclassified forward jump; keep the control
                    // transfer visible as a disassembly line.
                    self.raw(inst);
                }
            }

            Opcode::CopyDownSp => self.fold_assign(inst, "stack"),
            Opcode::CopyDownBp => self.fold_assign(inst, "frame"),

            // Discard boundary.
            Opcode::MoveSp => self.flush(),

            _ => self.raw(inst),
        }
    }

    fn fold_binary(&mut self, inst: &Instruction) {
        if self.exprs.len() < 2 {
            self.raw(inst);
            return;
        }
        let (_, rhs) = self.exprs.pop().unwrap_or_else(|| unreachable!());
        let (at, lhs) = self.exprs.pop().unwrap_or_else(|| unreachable!());
        let op = operator(inst.opcode);
        self.exprs.push((at, format!("({lhs} {op} {rhs})")));
    }

    fn fold_unary(&mut self, inst: &Instruction, op: &str) {
        match self.exprs.pop() {
            Some((at, inner)) => self.exprs.push((at, format!("{op}{inner}"))),
            None => self.raw(inst),
        }
    }

    fn fold_action(&mut self, inst: &Instruction) {
        let Operands::Action { routine, arg_count } = inst.operands else {
            self.raw(inst);
            return;
        };
        let argc = arg_count as usize;
        if self.exprs.len() < argc {
            self.raw(inst);
            return;
        }
        let split = self.exprs.len() - argc;
        let args: Vec<String> = self.exprs.split_off(split).into_iter().map(|(_, t)| t).collect();
        self.exprs
            .push((inst.offset, format!("action_{routine}({})", args.join(", "))));
    }

    fn fold_assign(&mut self, inst: &Instruction, place: &str) {
        let Operands::StackCopy { offset, .. } = inst.operands else {
            self.raw(inst);
            return;
        };
        match self.exprs.pop() {
            Some((at, value)) => {
                self.exprs.push((at, format!("{place}[{offset}] = {value}")));
                self.flush();
            }
            None => self.raw(inst),
        }
    }

    /// Condition text for a forward conditional branch. `JZ` skips the
    /// body when the value is zero, so the body runs on the value
    /// itself; `JNZ` inverts that.
    fn pop_condition(&mut self, inst: &Instruction) -> String {
        let value = self
            .exprs
            .pop()
            .map(|(_, text)| text)
            .unwrap_or_else(|| "cond".to_string());
        match inst.opcode {
            Opcode::Jnz => format!("!{value}"),
            _ => value,
        }
    }
}

fn operator(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Mod => "%",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterEq => ">=",
        Opcode::Greater => ">",
        Opcode::Less => "<",
        Opcode::LessEq => "<=",
        Opcode::LogAnd => "&&",
        Opcode::LogOr => "||",
        Opcode::IncOr => "|",
        Opcode::ExcOr => "^",
        Opcode::BoolAnd => "&",
        Opcode::ShLeft => "<<",
        Opcode::ShRight => ">>",
        Opcode::UShRight => ">>>",
        _ => "?",
    }
}

fn const_text(inst: &Instruction) -> String {
    match &inst.operands {
        Operands::ConstInt(v) => v.to_string(),
        Operands::ConstFloat(v) => format!("{v:?}"),
        Operands::ConstString(s) => format!("{s:?}"),
        Operands::ConstObject(v) => format!("object({v})"),
        _ => "?".to_string(),
    }
}

/// Default value text for a reserved slot.
fn reserve_text(qualifier: Qualifier) -> &'static str {
    match qualifier {
        Qualifier::Int => "0",
        Qualifier::Float => "0.0",
        Qualifier::Str => "\"\"",
        Qualifier::Object => "object(0)",
        _ => "undef",
    }
}
