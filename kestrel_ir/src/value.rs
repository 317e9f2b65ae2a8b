//! Opaque handles for IR entities.
//!
//! All references into the IR are u32 indices, not pointers.
//! Every instruction has exactly one result slot, so a value and the
//! instruction defining it share an index.

/// Reference to a value (the result of an instruction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueRef(pub(crate) u32);

impl ValueRef {
    /// Raw index into the instruction arena.
    pub fn index(self) -> u32 {
        self.0
    }

    /// The instruction that defines this value.
    pub fn inst(self) -> InstRef {
        InstRef(self.0)
    }
}

/// Reference to an instruction in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstRef(pub(crate) u32);

impl InstRef {
    /// Raw index into the instruction arena.
    pub fn index(self) -> u32 {
        self.0
    }

    /// The value produced by this instruction.
    pub fn result(self) -> ValueRef {
        ValueRef(self.0)
    }
}

/// Reference to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockRef(pub(crate) u32);

impl BlockRef {
    /// Raw index into the block arena.
    pub fn index(self) -> u32 {
        self.0
    }
}
