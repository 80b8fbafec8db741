//! Splitting initializers around their chaining call
//!
//! The JVM requires every initializer to call some other initializer (of the superclass, or
//! another one of the same class) on the uninitialized `this` before doing anything else with it.
//! That call can't be moved into another method, since the verifier won't let an uninitialized
//! `this` be passed around. What _can_ be moved out is everything around the call:
//!
//! ```text
//!   aload 0           <- self load
//!   iconst_1          \
//!   dup                |
//!   istore 1           |  argument code: becomes `init$args`
//!   ...                |
//!   iload 2           /
//!   invokespecial ... <- chaining call: stays where it is
//!   aload 0           \
//!   iload 1            |  body: becomes `init$body`
//!   invokevirtual ...  |
//!   return            /
//! ```
//!
//! [`deconstruct`] finds the chaining call (using the frames from [`crate::analysis`]) and
//! synthesizes two static routines:
//!
//!   - `init$args(Object[] snapshot, params...) -> Object[]` evaluates the arguments of the
//!     chaining call and returns them boxed in an array. Writes to locals are mirrored into
//!     `snapshot` (element `k` holds local `k`; element 0 is never written). Written parameters
//!     are mirrored again at the end, so they are in `snapshot` whichever path was taken.
//!
//!   - `init$body(Owner self, params...) -> void` runs the rest of the initializer.
//!
//! When the shape of the initializer makes this impossible, the result is a [`StructuralError`],
//! which callers handle by falling back to some coarser strategy.

mod args;
mod body;
mod rewrite;
mod scan;

pub use rewrite::{rewrite, CodeEmitter};
pub use scan::{find_chaining_call, ChainingCall, SelfLoadRecord};

use crate::analysis::analyze;
use crate::errors::{Error, StructuralError};
use crate::jvm::code::{ExceptionHandler, Label, MethodRef, Routine};
use crate::jvm::BinaryName;
use args::build_args_routine;
use body::build_body_routine;
use std::collections::HashMap;

/// Result of splitting an initializer
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    /// Position of the `aload 0` that loads the receiver of the chaining call
    pub self_load: usize,

    /// Position of the chaining call
    pub delegation_position: usize,

    /// Initializer being chained to
    pub delegation: MethodRef,

    pub args: ArgsRoutine,
    pub body: BodyRoutine,
}

/// Synthesized `init$args`
#[derive(Debug, Clone, PartialEq)]
pub struct ArgsRoutine {
    pub routine: Routine,

    /// Locals that the argument code writes, and which are mirrored into the snapshot array
    /// (sorted, without duplicates)
    pub mirrored_slots: Vec<u16>,

    /// Local used to build the returned array
    pub result_slot: u16,
}

/// Synthesized `init$body`
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRoutine {
    pub routine: Routine,

    /// How far local slots of the original code were moved
    ///
    /// The explicit `self` parameter takes over local 0 from the receiver, so this is zero.
    pub slot_shift: u16,
}

/// Split an initializer around its chaining call
pub fn deconstruct(owner: &BinaryName, routine: &Routine) -> Result<SplitResult, Error> {
    let frames = analyze(owner, routine)?;
    if frames.len() != routine.instructions.len() {
        return Err(Error::InternalInvariant {
            frames: frames.len(),
            instructions: routine.instructions.len(),
        });
    }

    let chaining_call = find_chaining_call(owner, routine, &frames)?;
    let self_load = chaining_call.self_load.position;
    let call = chaining_call.position;
    let delegation = chaining_call.method;
    log::debug!(
        "{}.{}: self load at {}, chaining call at {}",
        owner,
        routine.name,
        self_load,
        call
    );

    let depth_below = chaining_call.self_load.depth_after_load - 1;
    if depth_below != 0 {
        return Err(StructuralError::NonEmptyStack {
            self_load,
            depth: depth_below,
        }
        .into());
    }

    let partition = Partition { self_load, call };
    partition.check_branches(routine)?;
    let (args_handlers, body_handlers) = partition.split_handlers(routine)?;

    for position in self_load + 1..call {
        if let Some((0, _)) = routine.instructions[position].local_slots() {
            return Err(StructuralError::SnapshotSlotClobbered { position }.into());
        }
    }

    let args = build_args_routine(owner, routine, self_load, call, &delegation, args_handlers);
    let body = build_body_routine(owner, routine, call, body_handlers);
    check_self_contained(owner, &args.routine)?;
    check_self_contained(owner, &body.routine)?;

    log::debug!(
        "{}.{}: split into {} argument and {} body instructions (mirroring locals {:?})",
        owner,
        routine.name,
        args.routine.instructions.len(),
        body.routine.instructions.len(),
        args.mirrored_slots
    );

    Ok(SplitResult {
        self_load,
        delegation_position: call,
        delegation,
        args,
        body,
    })
}

/// Make sure a synthesized routine can be analyzed on its own
fn check_self_contained(owner: &BinaryName, routine: &Routine) -> Result<(), Error> {
    match analyze(owner, routine) {
        Ok(_) => Ok(()),
        Err(Error::Analysis { position, kind, .. }) => {
            Err(StructuralError::FragmentNotSelfContained {
                fragment: routine.name.clone(),
                position,
                kind,
            }
            .into())
        }
        Err(other) => Err(other),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Segment {
    Prefix,
    Args,
    Call,
    Body,
}

/// Positions of the self load and chaining call, which cut the code into segments
struct Partition {
    self_load: usize,
    call: usize,
}

impl Partition {
    fn segment(&self, position: usize) -> Segment {
        if position <= self.self_load {
            Segment::Prefix
        } else if position < self.call {
            Segment::Args
        } else if position == self.call {
            Segment::Call
        } else {
            Segment::Body
        }
    }

    fn label_segment(
        &self,
        labels: &HashMap<Label, usize>,
        label: &Label,
    ) -> Option<Segment> {
        labels.get(label).map(|position| self.segment(*position))
    }

    /// Every jump must land in the segment it starts from
    fn check_branches(&self, routine: &Routine) -> Result<(), StructuralError> {
        let labels = routine.label_positions();
        for (position, insn) in routine.instructions.iter().enumerate() {
            let segment = self.segment(position);
            for target in insn.jump_targets() {
                if self.label_segment(&labels, &target) != Some(segment) {
                    return Err(StructuralError::BranchLeavesSegment { position, target });
                }
            }
        }
        Ok(())
    }

    /// Sort exception handlers into those for the argument code and those for the body
    ///
    /// Handlers in the prefix are dropped along with the prefix. Handlers spanning segments
    /// can't be split.
    fn split_handlers(
        &self,
        routine: &Routine,
    ) -> Result<(Vec<ExceptionHandler>, Vec<ExceptionHandler>), StructuralError> {
        let labels = routine.label_positions();
        let mut args_handlers = vec![];
        let mut body_handlers = vec![];

        for handler in &routine.handlers {
            let straddles = StructuralError::HandlerStraddlesSplit {
                start: handler.start,
                end: handler.end,
                handler: handler.handler,
            };
            let (start, end) = match (labels.get(&handler.start), labels.get(&handler.end)) {
                (Some(start), Some(end)) => (*start, *end),
                _ => return Err(straddles),
            };
            if end <= start {
                continue;
            }

            let segment = self.segment(start);
            if self.segment(end - 1) != segment
                || self.label_segment(&labels, &handler.handler) != Some(segment)
            {
                return Err(straddles);
            }
            match segment {
                Segment::Args => args_handlers.push(handler.clone()),
                Segment::Body => body_handlers.push(handler.clone()),
                Segment::Prefix => (),
                Segment::Call => return Err(straddles),
            }
        }

        Ok((args_handlers, body_handlers))
    }
}
