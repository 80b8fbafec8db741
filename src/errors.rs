use crate::jvm::code::Label;
use crate::jvm::{BinaryName, UnqualifiedName};
use crate::listing::ListingError;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The initializer does not have the shape needed to split it
    ///
    /// This is recoverable: callers are expected to fall back to a coarser strategy (eg. replacing
    /// the whole class) when they see it.
    Structural(StructuralError),

    /// Malformed code
    Analysis {
        owner: BinaryName,
        position: usize,
        kind: AnalysisErrorKind,
    },

    /// Frame count does not match instruction count (indicates a bug)
    InternalInvariant { frames: usize, instructions: usize },

    Listing(ListingError),
    Io(std::io::Error),
}

impl Error {
    /// Should the caller fall back to another strategy (as opposed to giving up)?
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Structural(_))
    }
}

impl From<StructuralError> for Error {
    fn from(err: StructuralError) -> Error {
        Error::Structural(err)
    }
}

impl From<ListingError> for Error {
    fn from(err: ListingError) -> Error {
        Error::Listing(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Structural(err) => write!(f, "{}", err),
            Error::Analysis {
                owner,
                position,
                kind,
            } => write!(f, "{} (in {} at instruction {})", kind, owner, position),
            Error::InternalInvariant {
                frames,
                instructions,
            } => write!(
                f,
                "internal error: {} frames computed for {} instructions",
                frames, instructions
            ),
            Error::Listing(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

/// Reasons an initializer cannot be split
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// There is no `<init>` call on the uninitialized `this`
    NoChainingCall,

    /// The uninitialized `this` was consumed (or leaked) before the chaining call
    SelfEscaped { self_load: usize, call: usize },

    /// A second `<init>` call on `this` follows the chaining call
    MultipleChainingCalls { first: usize, second: usize },

    /// Something other than `this` is already on the stack when `this` is loaded
    NonEmptyStack { self_load: usize, depth: usize },

    /// A jump crosses from one segment into another
    BranchLeavesSegment { position: usize, target: Label },

    /// An exception handler covers code from more than one segment
    HandlerStraddlesSplit { start: Label, end: Label, handler: Label },

    /// The argument code touches local 0, which holds the snapshot array once extracted
    SnapshotSlotClobbered { position: usize },

    /// A synthesized routine does not stand on its own (eg. it reads a local only set in code that
    /// was left behind)
    FragmentNotSelfContained {
        fragment: UnqualifiedName,
        position: usize,
        kind: AnalysisErrorKind,
    },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralError::NoChainingCall => f.write_str("no chaining call found"),
            StructuralError::SelfEscaped { .. } => {
                f.write_str("self reference escaped before chaining call")
            }
            StructuralError::MultipleChainingCalls { first, second } => write!(
                f,
                "multiple chaining calls (at instructions {} and {})",
                first, second
            ),
            StructuralError::NonEmptyStack { self_load, depth } => write!(
                f,
                "stack is not empty when loading self at instruction {} (depth {})",
                self_load, depth
            ),
            StructuralError::BranchLeavesSegment { position, target } => write!(
                f,
                "jump at instruction {} to {} leaves its segment",
                position, target
            ),
            StructuralError::HandlerStraddlesSplit {
                start,
                end,
                handler,
            } => write!(
                f,
                "exception handler {} (covering {} to {}) straddles the split",
                handler, start, end
            ),
            StructuralError::SnapshotSlotClobbered { position } => write!(
                f,
                "argument code uses local 0 at instruction {}",
                position
            ),
            StructuralError::FragmentNotSelfContained {
                fragment,
                position,
                kind,
            } => write!(
                f,
                "{} is not self-contained: {} at instruction {}",
                fragment, kind, position
            ),
        }
    }
}

/// Ways in which code can be malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    InvalidType,
    InvalidIndex(u16),
    UninitializedLocal(u16),
    UnknownLabel(Label),
    DuplicateLabel(Label),
    IncompatibleStacks { expected: usize, found: usize },
    FallsOffEnd,
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisErrorKind::EmptyStack => f.write_str("stack underflow"),
            AnalysisErrorKind::InvalidWidth(width) => {
                write!(f, "operand has unexpected width {}", width)
            }
            AnalysisErrorKind::InvalidType => f.write_str("operand has the wrong kind"),
            AnalysisErrorKind::InvalidIndex(slot) => write!(f, "local {} is out of range", slot),
            AnalysisErrorKind::UninitializedLocal(slot) => {
                write!(f, "local {} is read before being set", slot)
            }
            AnalysisErrorKind::UnknownLabel(label) => write!(f, "label {} is never placed", label),
            AnalysisErrorKind::DuplicateLabel(label) => {
                write!(f, "label {} is placed more than once", label)
            }
            AnalysisErrorKind::IncompatibleStacks { expected, found } => write!(
                f,
                "stack heights {} and {} meet at the same instruction",
                expected, found
            ),
            AnalysisErrorKind::FallsOffEnd => f.write_str("control falls off the end of the code"),
        }
    }
}
