//! Control flow graph over a method body.
//!
//! Blocks are maximal straight-line item ranges; successor edges carry a
//! kind tag. The goto/fallthrough successor of a conditional branch and the
//! default successor of a switch are [`EdgeKind::Goto`] edges; taken
//! branches and switch cases are [`EdgeKind::Branch`] edges; exceptional
//! control flow is modeled with [`EdgeKind::Ghost`] edges, which the
//! optimizer ignores.
//!
//! The graph is a read-only index over the body. Rewrites that change item
//! positions (applying a rewrite plan, inlining) invalidate it; callers
//! rebuild after editing. Label demotion inside switch pruning replaces
//! items in place and is therefore safe while the graph is live.

use crate::ir::{IrCode, IrInstruction, IrItem, Opcode, TargetKind};

/// Index of a basic block.
pub type BlockId = usize;

/// Kind tag of a control flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Unconditional or fallthrough control flow; also the default
    /// successor of a switch.
    Goto,
    /// A taken conditional branch or a switch case.
    Branch,
    /// Exceptional control flow; ignored by the optimizer.
    Ghost,
}

/// A directed control flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Source block.
    pub src: BlockId,
    /// Target block.
    pub dst: BlockId,
    /// Edge kind.
    pub kind: EdgeKind,
}

/// A basic block: a half-open item range of the body.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// Block index.
    pub id: BlockId,
    /// First item index of the block.
    pub start: usize,
    /// One past the last item index of the block.
    pub end: usize,
}

impl Block {
    /// Item index of the last instruction in the block, if any.
    #[must_use]
    pub fn last_insn_index(&self, code: &IrCode) -> Option<usize> {
        (self.start..self.end)
            .rev()
            .find(|&idx| code.item(idx).insn().is_some())
    }

    /// The last instruction in the block, if any.
    #[must_use]
    pub fn last_insn<'a>(&self, code: &'a IrCode) -> Option<&'a IrInstruction> {
        self.last_insn_index(code).and_then(|idx| code.item(idx).insn())
    }
}

/// Control flow graph of a method body.
#[derive(Debug)]
pub struct ControlFlowGraph {
    blocks: Vec<Block>,
    succs: Vec<Vec<Edge>>,
    preds: Vec<Vec<Edge>>,
    editable: bool,
}

impl ControlFlowGraph {
    /// Builds the graph in non-editable mode.
    #[must_use]
    pub fn build(code: &IrCode) -> Self {
        Self::build_with_mode(code, false)
    }

    /// Builds the graph with an explicit mutability mode.
    ///
    /// The switch pruner only runs against a non-editable graph; the
    /// conditional branch pruner is agnostic.
    ///
    /// # Panics
    ///
    /// Panics if a branch instruction has no target marker, or a
    /// conditional branch or switch has no fallthrough block; such a body
    /// is malformed.
    #[must_use]
    pub fn build_with_mode(code: &IrCode, editable: bool) -> Self {
        let items = code.items();
        if items.is_empty() {
            return Self {
                blocks: Vec::new(),
                succs: Vec::new(),
                preds: Vec::new(),
                editable,
            };
        }

        // Leaders: first item, every target marker, every item after a
        // branch or terminal instruction.
        let mut leaders = vec![0usize];
        for (idx, item) in items.iter().enumerate() {
            match item {
                IrItem::Target(_) => leaders.push(idx),
                IrItem::Insn(i) if i.opcode().is_branch() || i.opcode().is_terminal() => {
                    if idx + 1 < items.len() {
                        leaders.push(idx + 1);
                    }
                }
                _ => {}
            }
        }
        leaders.sort_unstable();
        leaders.dedup();

        let mut blocks = Vec::with_capacity(leaders.len());
        for (i, &start) in leaders.iter().enumerate() {
            let end = leaders.get(i + 1).copied().unwrap_or(items.len());
            blocks.push(Block {
                id: i,
                start,
                end,
            });
        }

        let block_of_item = |idx: usize| -> BlockId {
            match blocks.binary_search_by(|b| {
                if idx < b.start {
                    std::cmp::Ordering::Greater
                } else if idx >= b.end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            }) {
                Ok(b) => b,
                Err(_) => unreachable!("item {idx} outside every block"),
            }
        };

        let mut succs: Vec<Vec<Edge>> = vec![Vec::new(); blocks.len()];
        for block in &blocks {
            let Some(last_idx) = block.last_insn_index(code) else {
                // Target-only block: falls through.
                if block.id + 1 < blocks.len() {
                    succs[block.id].push(Edge {
                        src: block.id,
                        dst: block.id + 1,
                        kind: EdgeKind::Goto,
                    });
                }
                continue;
            };
            let insn = code.item(last_idx).insn().expect("last_insn_index returns insns");
            let id = insn.id();
            match insn.opcode() {
                Opcode::Goto => {
                    let target = items
                        .iter()
                        .position(|item| {
                            matches!(item, IrItem::Target(t)
                                if t.src == id && t.kind == TargetKind::Simple)
                        })
                        .unwrap_or_else(|| panic!("goto {id} has no target"));
                    succs[block.id].push(Edge {
                        src: block.id,
                        dst: block_of_item(target),
                        kind: EdgeKind::Goto,
                    });
                }
                op if op.is_conditional_branch() => {
                    let target = items
                        .iter()
                        .position(|item| {
                            matches!(item, IrItem::Target(t)
                                if t.src == id && t.kind == TargetKind::Simple)
                        })
                        .unwrap_or_else(|| panic!("branch {id} has no target"));
                    succs[block.id].push(Edge {
                        src: block.id,
                        dst: block_of_item(target),
                        kind: EdgeKind::Branch,
                    });
                    assert!(
                        block.id + 1 < blocks.len(),
                        "conditional branch {id} has no fallthrough block"
                    );
                    succs[block.id].push(Edge {
                        src: block.id,
                        dst: block.id + 1,
                        kind: EdgeKind::Goto,
                    });
                }
                Opcode::Switch => {
                    let mut case_blocks: Vec<BlockId> = Vec::new();
                    for (idx, item) in items.iter().enumerate() {
                        if let IrItem::Target(t) = item {
                            if t.src == id && matches!(t.kind, TargetKind::Case { .. }) {
                                let b = block_of_item(idx);
                                if !case_blocks.contains(&b) {
                                    case_blocks.push(b);
                                }
                            }
                        }
                    }
                    for dst in case_blocks {
                        succs[block.id].push(Edge {
                            src: block.id,
                            dst,
                            kind: EdgeKind::Branch,
                        });
                    }
                    assert!(
                        block.id + 1 < blocks.len(),
                        "switch {id} has no default block"
                    );
                    succs[block.id].push(Edge {
                        src: block.id,
                        dst: block.id + 1,
                        kind: EdgeKind::Goto,
                    });
                }
                op if op.is_terminal() => {}
                _ => {
                    if block.id + 1 < blocks.len() {
                        succs[block.id].push(Edge {
                            src: block.id,
                            dst: block.id + 1,
                            kind: EdgeKind::Goto,
                        });
                    }
                }
            }
        }

        let mut preds: Vec<Vec<Edge>> = vec![Vec::new(); blocks.len()];
        for edges in &succs {
            for e in edges {
                preds[e.dst].push(*e);
            }
        }

        Self {
            blocks,
            succs,
            preds,
            editable,
        }
    }

    /// All blocks in layout order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The block with the given index.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// Number of blocks.
    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The entry block index.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        0
    }

    /// Outgoing edges of a block.
    #[must_use]
    pub fn succs(&self, id: BlockId) -> &[Edge] {
        &self.succs[id]
    }

    /// Incoming edges of a block.
    #[must_use]
    pub fn preds(&self, id: BlockId) -> &[Edge] {
        &self.preds[id]
    }

    /// Whether the graph is in editable mode.
    #[must_use]
    pub const fn editable(&self) -> bool {
        self.editable
    }

    /// Adds a ghost edge modeling exceptional control flow.
    pub fn add_ghost_edge(&mut self, src: BlockId, dst: BlockId) {
        let e = Edge {
            src,
            dst,
            kind: EdgeKind::Ghost,
        };
        self.succs[src].push(e);
        self.preds[dst].push(e);
    }

    /// The block containing the given item index.
    ///
    /// # Panics
    ///
    /// Panics if the index lies outside every block.
    #[must_use]
    pub fn block_of_item(&self, idx: usize) -> BlockId {
        self.blocks
            .iter()
            .position(|b| idx >= b.start && idx < b.end)
            .unwrap_or_else(|| panic!("item {idx} outside every block"))
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{IfOp, IrInstruction};

    use super::*;

    #[test]
    fn test_straight_line_single_block() {
        let mut code = IrCode::new(1, 0);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(1));
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
        let cfg = ControlFlowGraph::build(&code);
        assert_eq!(cfg.num_blocks(), 1);
        assert!(cfg.succs(0).is_empty());
        assert!(!cfg.editable());
    }

    #[test]
    fn test_conditional_branch_edges() {
        // if-eqz v0 -> L; return-void; L: return-void
        let mut code = IrCode::new(1, 0);
        let branch = code.add_insn(
            IrInstruction::new(Opcode::IfTestZ { op: IfOp::Eq }).with_src(0),
        );
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
        code.add_target(branch);
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let cfg = ControlFlowGraph::build(&code);
        assert_eq!(cfg.num_blocks(), 3);
        let succs = cfg.succs(0);
        assert_eq!(succs.len(), 2);
        assert!(succs
            .iter()
            .any(|e| e.kind == EdgeKind::Branch && e.dst == 2));
        assert!(succs.iter().any(|e| e.kind == EdgeKind::Goto && e.dst == 1));
    }

    #[test]
    fn test_switch_edges() {
        // switch v0 { 1 -> L1, 2 -> L2 }; default falls through
        let mut code = IrCode::new(1, 0);
        let sw = code.add_insn(IrInstruction::new(Opcode::Switch).with_src(0));
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid)); // default
        code.add_case_target(sw, 1);
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
        code.add_case_target(sw, 2);
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let cfg = ControlFlowGraph::build(&code);
        let succs = cfg.succs(0);
        let branch_count = succs.iter().filter(|e| e.kind == EdgeKind::Branch).count();
        let goto_count = succs.iter().filter(|e| e.kind == EdgeKind::Goto).count();
        assert_eq!(branch_count, 2);
        assert_eq!(goto_count, 1);
        // Default is the fallthrough block.
        let goto = succs.iter().find(|e| e.kind == EdgeKind::Goto).expect("goto edge");
        assert_eq!(goto.dst, 1);
    }

    #[test]
    fn test_ghost_edges_ignored_kind() {
        let mut code = IrCode::new(1, 0);
        code.add_insn(IrInstruction::new(Opcode::Nop));
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
        let mut cfg = ControlFlowGraph::build(&code);
        cfg.add_ghost_edge(0, 0);
        assert!(cfg.succs(0).iter().any(|e| e.kind == EdgeKind::Ghost));
    }
}
