//! Opcode definitions and classification predicates.
//!
//! The opcode set is the register-based subset the optimizer operates on:
//! constant loads, moves, field and array accesses, literal integer
//! arithmetic, branches, switches, invokes, and returns. Opcodes carry their
//! sub-operation as payload (e.g. which comparison an `if-*` performs) so
//! that classification stays a cheap pattern match.

use std::fmt;

use strum::EnumIter;

/// Comparison performed by a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum IfOp {
    /// Branch when equal.
    Eq,
    /// Branch when not equal.
    Ne,
    /// Branch when less than.
    Lt,
    /// Branch when greater than or equal.
    Ge,
    /// Branch when greater than.
    Gt,
    /// Branch when less than or equal.
    Le,
}

impl IfOp {
    /// Evaluates the comparison on two concrete values.
    #[must_use]
    pub fn evaluate(self, left: i64, right: i64) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
            Self::Le => left <= right,
        }
    }
}

/// Integer operation performed by a literal-operand arithmetic instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum LitOp {
    /// `add-int/lit`: `dest = src + lit`.
    Add,
    /// `rsub-int`: `dest = lit - src` (reverse subtraction).
    Rsub,
    /// `mul-int/lit`: `dest = src * lit`.
    Mul,
    /// `div-int/lit`: `dest = src / lit`. Pairs with a move-result-pseudo
    /// because the division can throw.
    Div,
    /// `rem-int/lit`: `dest = src % lit`. Pairs with a move-result-pseudo.
    Rem,
    /// `and-int/lit`: bitwise and.
    And,
    /// `or-int/lit`: bitwise or.
    Or,
    /// `xor-int/lit`: bitwise xor.
    Xor,
    /// `shl-int/lit8`: shift left.
    Shl,
    /// `shr-int/lit8`: arithmetic shift right.
    Shr,
    /// `ushr-int/lit8`: logical shift right.
    Ushr,
}

/// Width of the literal operand of a [`LitOp`] instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LitWidth {
    /// 8-bit literal encoding.
    Lit8,
    /// 16-bit literal encoding.
    Lit16,
}

/// Dispatch kind of an invoke instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// `invoke-virtual`: virtual dispatch through the receiver's class.
    Virtual,
    /// `invoke-super`: dispatch to the superclass implementation. Only valid
    /// within the class the call textually lives in.
    Super,
    /// `invoke-direct`: non-virtual call to a private method or constructor.
    Direct,
    /// `invoke-static`: call to a static method.
    Static,
    /// `invoke-interface`: dispatch through an interface reference.
    Interface,
}

/// An opcode of the register-based instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation.
    Nop,

    /// Load a 32-bit constant into a register.
    Const,
    /// Load a 64-bit constant into a register pair.
    ConstWide,

    /// Copy a narrow register.
    Move,
    /// Copy a wide register pair.
    MoveWide,
    /// Copy an object reference register.
    MoveObject,

    /// Receive the narrow result of the preceding invoke.
    MoveResult,
    /// Receive the wide result of the preceding invoke.
    MoveResultWide,
    /// Receive the object result of the preceding invoke.
    MoveResultObject,

    /// Synthetic: receive the narrow result of the preceding primary
    /// instruction (field get, array get, literal div/rem).
    MoveResultPseudo,
    /// Synthetic: wide variant of [`Opcode::MoveResultPseudo`].
    MoveResultPseudoWide,
    /// Synthetic: object variant of [`Opcode::MoveResultPseudo`].
    MoveResultPseudoObject,

    /// Read a static field (narrow).
    Sget,
    /// Read a static field (wide).
    SgetWide,
    /// Read a static field (object).
    SgetObject,
    /// Write a static field (narrow).
    Sput,
    /// Write a static field (wide).
    SputWide,
    /// Write a static field (object).
    SputObject,

    /// Read an instance field (narrow).
    Iget,
    /// Read an instance field (wide).
    IgetWide,
    /// Read an instance field (object).
    IgetObject,
    /// Write an instance field (narrow).
    Iput,
    /// Write an instance field (wide).
    IputWide,
    /// Write an instance field (object).
    IputObject,

    /// Read an array element (narrow).
    Aget,
    /// Read an array element (wide).
    AgetWide,
    /// Read an array element (object).
    AgetObject,
    /// Write an array element (narrow).
    Aput,
    /// Write an array element (wide).
    AputWide,
    /// Write an array element (object).
    AputObject,

    /// Integer arithmetic with an inline literal operand.
    BinopLit {
        /// The arithmetic operation performed.
        op: LitOp,
        /// Encoding width of the literal.
        width: LitWidth,
    },

    /// Two-register conditional branch.
    IfTest {
        /// The comparison performed.
        op: IfOp,
    },
    /// One-register conditional branch against zero.
    IfTestZ {
        /// The comparison performed against zero.
        op: IfOp,
    },

    /// Unconditional branch.
    Goto,
    /// Multi-way branch on a register value.
    Switch,

    /// Method invocation.
    Invoke {
        /// The dispatch kind.
        kind: InvokeKind,
    },

    /// Return from a void method.
    ReturnVoid,
    /// Return a narrow value.
    Return,
    /// Return a wide value.
    ReturnWide,
    /// Return an object reference.
    ReturnObject,

    /// Throw the exception object in a register.
    Throw,
}

impl Opcode {
    /// Returns `true` for any control transfer that carries a branch target
    /// (goto, conditional branches, switch).
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Self::Goto | Self::IfTest { .. } | Self::IfTestZ { .. } | Self::Switch
        )
    }

    /// Returns `true` for `if-*` conditional branches.
    #[must_use]
    pub const fn is_conditional_branch(self) -> bool {
        matches!(self, Self::IfTest { .. } | Self::IfTestZ { .. })
    }

    /// Returns `true` for the switch opcode.
    #[must_use]
    pub const fn is_switch(self) -> bool {
        matches!(self, Self::Switch)
    }

    /// Returns `true` for plain register moves (narrow, wide, object).
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(self, Self::Move | Self::MoveWide | Self::MoveObject)
    }

    /// Returns `true` for `move-result` following an invoke.
    #[must_use]
    pub const fn is_move_result(self) -> bool {
        matches!(
            self,
            Self::MoveResult | Self::MoveResultWide | Self::MoveResultObject
        )
    }

    /// Returns `true` for the synthetic `move-result-pseudo` family.
    #[must_use]
    pub const fn is_move_result_pseudo(self) -> bool {
        matches!(
            self,
            Self::MoveResultPseudo | Self::MoveResultPseudoWide | Self::MoveResultPseudoObject
        )
    }

    /// Returns `true` for static field reads.
    #[must_use]
    pub const fn is_sget(self) -> bool {
        matches!(self, Self::Sget | Self::SgetWide | Self::SgetObject)
    }

    /// Returns `true` for static field writes.
    #[must_use]
    pub const fn is_sput(self) -> bool {
        matches!(self, Self::Sput | Self::SputWide | Self::SputObject)
    }

    /// Returns `true` for instance field reads.
    #[must_use]
    pub const fn is_iget(self) -> bool {
        matches!(self, Self::Iget | Self::IgetWide | Self::IgetObject)
    }

    /// Returns `true` for instance field writes.
    #[must_use]
    pub const fn is_iput(self) -> bool {
        matches!(self, Self::Iput | Self::IputWide | Self::IputObject)
    }

    /// Returns `true` for array element reads.
    #[must_use]
    pub const fn is_aget(self) -> bool {
        matches!(self, Self::Aget | Self::AgetWide | Self::AgetObject)
    }

    /// Returns `true` for any field write (static or instance).
    #[must_use]
    pub const fn is_put(self) -> bool {
        self.is_sput() || self.is_iput()
    }

    /// Returns `true` for any field access (get or put, static or instance).
    #[must_use]
    pub const fn is_field_access(self) -> bool {
        self.is_sget() || self.is_sput() || self.is_iget() || self.is_iput()
    }

    /// Returns `true` for `div-int/lit`.
    #[must_use]
    pub const fn is_div_int_lit(self) -> bool {
        matches!(self, Self::BinopLit { op: LitOp::Div, .. })
    }

    /// Returns `true` for `rem-int/lit`.
    #[must_use]
    pub const fn is_rem_int_lit(self) -> bool {
        matches!(self, Self::BinopLit { op: LitOp::Rem, .. })
    }

    /// Returns `true` for invoke instructions.
    #[must_use]
    pub const fn is_invoke(self) -> bool {
        matches!(self, Self::Invoke { .. })
    }

    /// Returns `true` for return instructions.
    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(
            self,
            Self::ReturnVoid | Self::Return | Self::ReturnWide | Self::ReturnObject
        )
    }

    /// Returns `true` when the instruction ends its block without successors
    /// (returns and throws).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.is_return() || matches!(self, Self::Throw)
    }

    /// Returns `true` when this primary instruction delivers its result
    /// through a trailing `move-result-pseudo`.
    ///
    /// Field gets, array gets, and literal div/rem all deliver through the
    /// pseudo because they may throw before the destination is written.
    #[must_use]
    pub const fn has_move_result_pseudo(self) -> bool {
        self.is_sget() || self.is_iget() || self.is_aget() || self.is_div_int_lit() || self.is_rem_int_lit()
    }

    /// Returns `true` when the destination register is a wide pair.
    #[must_use]
    pub const fn dest_is_wide(self) -> bool {
        matches!(
            self,
            Self::ConstWide
                | Self::MoveWide
                | Self::MoveResultWide
                | Self::MoveResultPseudoWide
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinopLit { op, width } => {
                let name = match op {
                    LitOp::Add => "add-int",
                    LitOp::Rsub => "rsub-int",
                    LitOp::Mul => "mul-int",
                    LitOp::Div => "div-int",
                    LitOp::Rem => "rem-int",
                    LitOp::And => "and-int",
                    LitOp::Or => "or-int",
                    LitOp::Xor => "xor-int",
                    LitOp::Shl => "shl-int",
                    LitOp::Shr => "shr-int",
                    LitOp::Ushr => "ushr-int",
                };
                let suffix = match width {
                    LitWidth::Lit8 => "/lit8",
                    LitWidth::Lit16 => "/lit16",
                };
                write!(f, "{name}{suffix}")
            }
            Self::IfTest { op } | Self::IfTestZ { op } => {
                let name = match op {
                    IfOp::Eq => "eq",
                    IfOp::Ne => "ne",
                    IfOp::Lt => "lt",
                    IfOp::Ge => "ge",
                    IfOp::Gt => "gt",
                    IfOp::Le => "le",
                };
                if matches!(self, Self::IfTestZ { .. }) {
                    write!(f, "if-{name}z")
                } else {
                    write!(f, "if-{name}")
                }
            }
            Self::Invoke { kind } => {
                let name = match kind {
                    InvokeKind::Virtual => "virtual",
                    InvokeKind::Super => "super",
                    InvokeKind::Direct => "direct",
                    InvokeKind::Static => "static",
                    InvokeKind::Interface => "interface",
                };
                write!(f, "invoke-{name}")
            }
            other => {
                let name = match other {
                    Self::Nop => "nop",
                    Self::Const => "const",
                    Self::ConstWide => "const-wide",
                    Self::Move => "move",
                    Self::MoveWide => "move-wide",
                    Self::MoveObject => "move-object",
                    Self::MoveResult => "move-result",
                    Self::MoveResultWide => "move-result-wide",
                    Self::MoveResultObject => "move-result-object",
                    Self::MoveResultPseudo => "move-result-pseudo",
                    Self::MoveResultPseudoWide => "move-result-pseudo-wide",
                    Self::MoveResultPseudoObject => "move-result-pseudo-object",
                    Self::Sget => "sget",
                    Self::SgetWide => "sget-wide",
                    Self::SgetObject => "sget-object",
                    Self::Sput => "sput",
                    Self::SputWide => "sput-wide",
                    Self::SputObject => "sput-object",
                    Self::Iget => "iget",
                    Self::IgetWide => "iget-wide",
                    Self::IgetObject => "iget-object",
                    Self::Iput => "iput",
                    Self::IputWide => "iput-wide",
                    Self::IputObject => "iput-object",
                    Self::Aget => "aget",
                    Self::AgetWide => "aget-wide",
                    Self::AgetObject => "aget-object",
                    Self::Aput => "aput",
                    Self::AputWide => "aput-wide",
                    Self::AputObject => "aput-object",
                    Self::Goto => "goto",
                    Self::Switch => "switch",
                    Self::ReturnVoid => "return-void",
                    Self::Return => "return",
                    Self::ReturnWide => "return-wide",
                    Self::ReturnObject => "return-object",
                    Self::Throw => "throw",
                    Self::BinopLit { .. } | Self::IfTest { .. } | Self::IfTestZ { .. } | Self::Invoke { .. } => {
                        unreachable!("handled above")
                    }
                };
                write!(f, "{name}")
            }
        }
    }
}
