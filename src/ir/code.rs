//! Method body representation.
//!
//! A body is a flat list of items: instructions interleaved with branch
//! target markers. Targets carry the identity of their source branch, which
//! keeps them valid while instructions are replaced, and lets a switch case
//! label be demoted to a plain fallthrough marker without disturbing the
//! items around it.
//!
//! Only the editing entry points ([`IrCode::replace_opcode`],
//! [`IrCode::replace_branch`], [`IrCode::remove_opcode`]) change item
//! positions; everything else reads by index or identity, so in-progress
//! iteration stays valid until a rewrite plan is applied.

use std::fmt;

use crate::ir::{InsnId, IrInstruction, Opcode, Reg, TypeDesc};

/// Kind of a branch target marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Target of a goto or conditional branch.
    Simple,
    /// Target of a switch case with the given case key.
    Case {
        /// The case key that selects this target.
        key: i32,
    },
}

/// A branch target marker inside the item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTarget {
    /// What kind of branch points here.
    pub kind: TargetKind,
    /// Identity of the branch instruction that points here.
    pub src: InsnId,
}

/// One entry of a method body.
#[derive(Debug)]
pub enum IrItem {
    /// An instruction.
    Insn(IrInstruction),
    /// A branch target marker.
    Target(BranchTarget),
    /// A position marker with no control flow meaning. Demoted targets
    /// become fallthroughs; the item is kept so positions stay stable.
    Fallthrough,
}

impl IrItem {
    /// Returns the contained instruction, if this item is one.
    #[must_use]
    pub const fn insn(&self) -> Option<&IrInstruction> {
        match self {
            Self::Insn(i) => Some(i),
            _ => None,
        }
    }
}

/// A method body: item list plus frame layout and handler metadata.
#[derive(Debug)]
pub struct IrCode {
    items: Vec<IrItem>,
    registers_size: Reg,
    ins_size: Reg,
    catch_types: Vec<TypeDesc>,
}

impl IrCode {
    /// Creates an empty body with the given frame layout.
    ///
    /// `registers_size` is the total register count; the final `ins_size`
    /// registers hold the incoming arguments.
    #[must_use]
    pub fn new(registers_size: Reg, ins_size: Reg) -> Self {
        Self {
            items: Vec::new(),
            registers_size,
            ins_size,
            catch_types: Vec::new(),
        }
    }

    /// Total register count of the frame.
    #[must_use]
    pub const fn registers_size(&self) -> Reg {
        self.registers_size
    }

    /// Number of argument registers at the top of the frame.
    #[must_use]
    pub const fn ins_size(&self) -> Reg {
        self.ins_size
    }

    /// Grows the frame by `extra` registers and returns the old size.
    pub fn grow_registers(&mut self, extra: Reg) -> Reg {
        let old = self.registers_size;
        self.registers_size += extra;
        old
    }

    /// Exception types caught by handlers in this body.
    #[must_use]
    pub fn catch_types(&self) -> &[TypeDesc] {
        &self.catch_types
    }

    /// Records an exception type caught by a handler in this body.
    pub fn add_catch_type(&mut self, t: TypeDesc) {
        self.catch_types.push(t);
    }

    /// Appends an instruction and returns its identity.
    pub fn add_insn(&mut self, insn: IrInstruction) -> InsnId {
        let id = insn.id();
        self.items.push(IrItem::Insn(insn));
        id
    }

    /// Appends a simple branch target for the given branch.
    pub fn add_target(&mut self, src: InsnId) {
        self.items.push(IrItem::Target(BranchTarget {
            kind: TargetKind::Simple,
            src,
        }));
    }

    /// Appends a switch case target for the given switch and case key.
    pub fn add_case_target(&mut self, src: InsnId, key: i32) {
        self.items.push(IrItem::Target(BranchTarget {
            kind: TargetKind::Case { key },
            src,
        }));
    }

    /// All items in order.
    #[must_use]
    pub fn items(&self) -> &[IrItem] {
        &self.items
    }

    /// The item at `idx`.
    #[must_use]
    pub fn item(&self, idx: usize) -> &IrItem {
        &self.items[idx]
    }

    /// Mutable access to the item at `idx`.
    pub fn item_mut(&mut self, idx: usize) -> &mut IrItem {
        &mut self.items[idx]
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the body has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates `(item_index, instruction)` pairs in order.
    pub fn iter_insns(&self) -> impl Iterator<Item = (usize, &IrInstruction)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| item.insn().map(|i| (idx, i)))
    }

    /// Number of instructions (targets and fallthroughs excluded).
    #[must_use]
    pub fn insn_count(&self) -> usize {
        self.iter_insns().count()
    }

    /// Estimated encoded size of the body in 16-bit code units.
    #[must_use]
    pub fn size_units(&self) -> u64 {
        self.iter_insns().map(|(_, i)| i.size_units()).sum()
    }

    /// Current item index of the instruction with the given identity.
    #[must_use]
    pub fn insn_index(&self, id: InsnId) -> Option<usize> {
        self.iter_insns()
            .find(|(_, i)| i.id() == id)
            .map(|(idx, _)| idx)
    }

    /// The instruction with the given identity.
    #[must_use]
    pub fn insn(&self, id: InsnId) -> Option<&IrInstruction> {
        self.iter_insns().find(|(_, i)| i.id() == id).map(|(_, i)| i)
    }

    /// The primary instruction a `move-result-pseudo` at `idx` receives from.
    ///
    /// # Panics
    ///
    /// Panics if there is no instruction before `idx`; a pseudo never opens
    /// a body.
    #[must_use]
    pub fn primary_of_pseudo(&self, idx: usize) -> &IrInstruction {
        self.items[..idx]
            .iter()
            .rev()
            .find_map(IrItem::insn)
            .expect("move-result-pseudo without a primary instruction")
    }

    /// Item index of the `move-result-pseudo` attached to the primary
    /// instruction at `idx`, if it has one.
    #[must_use]
    pub fn pseudo_of_primary(&self, idx: usize) -> Option<usize> {
        self.items[idx + 1..]
            .iter()
            .enumerate()
            .find_map(|(off, item)| item.insn().map(|i| (idx + 1 + off, i)))
            .filter(|(_, i)| i.opcode().is_move_result_pseudo())
            .map(|(j, _)| j)
    }

    /// Replaces a non-branch instruction with a sequence of instructions.
    ///
    /// If the old instruction delivered its result through a
    /// `move-result-pseudo`, the pseudo is removed as part of the same edit,
    /// so one replacement rewrites the primary+pseudo pair.
    ///
    /// # Panics
    ///
    /// Panics if `old` is not present or is a branch (branches go through
    /// [`IrCode::replace_branch`]).
    pub fn replace_opcode(&mut self, old: InsnId, new: Vec<IrInstruction>) {
        let idx = self
            .insn_index(old)
            .unwrap_or_else(|| panic!("replace_opcode: {old} not in body"));
        let opcode = self.items[idx]
            .insn()
            .map(IrInstruction::opcode)
            .unwrap_or(Opcode::Nop);
        assert!(
            !opcode.is_branch(),
            "replace_opcode on branch {opcode}; use replace_branch"
        );
        if opcode.has_move_result_pseudo() {
            if let Some(p) = self.pseudo_of_primary(idx) {
                self.items.remove(p);
            }
        }
        self.items.splice(idx..=idx, new.into_iter().map(IrItem::Insn));
    }

    /// Replaces a branch instruction with another branch, re-pointing every
    /// target that referenced the old branch at the new one.
    ///
    /// # Panics
    ///
    /// Panics if `old` is not present or is not a branch.
    pub fn replace_branch(&mut self, old: InsnId, new: IrInstruction) {
        let idx = self
            .insn_index(old)
            .unwrap_or_else(|| panic!("replace_branch: {old} not in body"));
        let old_op = self.items[idx]
            .insn()
            .map(IrInstruction::opcode)
            .unwrap_or(Opcode::Nop);
        assert!(old_op.is_branch(), "replace_branch on non-branch {old_op}");
        assert!(new.opcode().is_branch(), "replacement must be a branch");
        let new_id = new.id();
        for item in &mut self.items {
            if let IrItem::Target(t) = item {
                if t.src == old {
                    t.src = new_id;
                }
            }
        }
        self.items[idx] = IrItem::Insn(new);
    }

    /// Removes an instruction. Targets that referenced it are demoted to
    /// fallthroughs (control falls through where the branch used to be).
    ///
    /// # Panics
    ///
    /// Panics if `old` is not present.
    pub fn remove_opcode(&mut self, old: InsnId) {
        let idx = self
            .insn_index(old)
            .unwrap_or_else(|| panic!("remove_opcode: {old} not in body"));
        for item in &mut self.items {
            if let IrItem::Target(t) = item {
                if t.src == old {
                    *item = IrItem::Fallthrough;
                }
            }
        }
        self.items.remove(idx);
    }

    /// Inserts items before position `idx`.
    pub(crate) fn insert_items(&mut self, idx: usize, items: Vec<IrItem>) {
        self.items.splice(idx..idx, items);
    }

    /// Removes the item at `idx`.
    pub(crate) fn remove_item(&mut self, idx: usize) -> IrItem {
        self.items.remove(idx)
    }
}

impl fmt::Display for IrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.items.iter().enumerate() {
            match item {
                IrItem::Insn(i) => writeln!(f, "{idx:4}: {i}")?,
                IrItem::Target(t) => writeln!(f, "{idx:4}: target {:?} <- {}", t.kind, t.src)?,
                IrItem::Fallthrough => writeln!(f, "{idx:4}: fallthrough")?,
            }
        }
        Ok(())
    }
}
