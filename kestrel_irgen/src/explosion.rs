//! Explosions: ordered, claim-once sequences of low-level values.

use kestrel_ir::value::ValueRef;

/// How far aggregates are taken apart when a value is exploded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosionKind {
    /// Follow the value schema. An aggregate stays a single address.
    Minimal,
    /// Flatten everything. An aggregate is loaded into its leaf scalars.
    Maximal,
}

/// Values are appended at the back and claimed front to back. Every value
/// must be claimed exactly once; `finish` checks that nothing is left over.
#[derive(Debug)]
pub struct Explosion {
    kind: ExplosionKind,
    values: Vec<ValueRef>,
    next: usize,
}

impl Explosion {
    pub fn new(kind: ExplosionKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
            next: 0,
        }
    }

    pub fn from_values(kind: ExplosionKind, values: Vec<ValueRef>) -> Self {
        Self {
            kind,
            values,
            next: 0,
        }
    }

    pub fn kind(&self) -> ExplosionKind {
        self.kind
    }

    /// Total number of values ever added.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values not yet claimed.
    pub fn remaining(&self) -> usize {
        self.values.len() - self.next
    }

    pub fn add(&mut self, value: ValueRef) {
        self.values.push(value);
    }

    pub fn add_all(&mut self, values: impl IntoIterator<Item = ValueRef>) {
        self.values.extend(values);
    }

    pub fn claim_next(&mut self) -> ValueRef {
        assert!(
            self.next < self.values.len(),
            "claimed past the end of an explosion of {} values",
            self.values.len()
        );
        let value = self.values[self.next];
        self.next += 1;
        value
    }

    pub fn claim(&mut self, count: usize) -> Vec<ValueRef> {
        assert!(
            count <= self.remaining(),
            "claimed {count} values from an explosion with {} left",
            self.remaining()
        );
        let claimed = self.values[self.next..self.next + count].to_vec();
        self.next += count;
        claimed
    }

    pub fn claim_all(&mut self) -> Vec<ValueRef> {
        self.claim(self.remaining())
    }

    /// Consumption boundary: every value must have been claimed.
    pub fn finish(self, what: &str) {
        assert!(
            self.remaining() == 0,
            "{what} left {} of {} exploded values unclaimed",
            self.remaining(),
            self.values.len()
        );
    }
}
