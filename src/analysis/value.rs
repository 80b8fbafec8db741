use crate::jvm::code::ValueKind;
use crate::util::Width;
use std::fmt;

/// What is known about a value on the stack or in a local
///
/// The lattice is tiny: every value is either a plain value of some kind, the uninitialized
/// receiver of the routine being analyzed, or unusable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AbstractValue {
    /// Empty slot, second half of a `long`/`double` local, or the meet of incompatible values
    Uninitialized,

    /// The receiver (local 0 on entry) before it has been initialized
    SelfSentinel,

    Ordinary(ValueKind),
}

impl AbstractValue {
    /// Kind of the value, if it can be used at all
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            AbstractValue::Uninitialized => None,
            AbstractValue::SelfSentinel => Some(ValueKind::Reference),
            AbstractValue::Ordinary(kind) => Some(*kind),
        }
    }

    pub fn is_self(&self) -> bool {
        matches!(self, AbstractValue::SelfSentinel)
    }

    pub fn is_reference(&self) -> bool {
        self.kind() == Some(ValueKind::Reference)
    }

    /// Greatest lower bound of two values
    ///
    /// The sentinel merged with another reference is just a reference: the only place the
    /// distinction matters is when the value is definitely the receiver.
    pub fn meet(self, other: AbstractValue) -> AbstractValue {
        use AbstractValue::*;

        match (self, other) {
            (v1, v2) if v1 == v2 => v1,
            (SelfSentinel, Ordinary(ValueKind::Reference))
            | (Ordinary(ValueKind::Reference), SelfSentinel) => Ordinary(ValueKind::Reference),
            _ => Uninitialized,
        }
    }
}

impl Width for AbstractValue {
    fn width(&self) -> usize {
        self.kind().map_or(1, |kind| kind.width())
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            AbstractValue::Uninitialized => ".",
            AbstractValue::SelfSentinel => "*",
            AbstractValue::Ordinary(ValueKind::Int) => "I",
            AbstractValue::Ordinary(ValueKind::Float) => "F",
            AbstractValue::Ordinary(ValueKind::Long) => "J",
            AbstractValue::Ordinary(ValueKind::Double) => "D",
            AbstractValue::Ordinary(ValueKind::Reference) => "R",
        };
        f.write_str(repr)
    }
}
