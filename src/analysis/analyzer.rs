use super::{AbstractValue, Frame};
use crate::errors::{AnalysisErrorKind, Error};
use crate::jvm::code::{Instruction, Label, Routine, ValueKind};
use crate::jvm::BinaryName;
use std::collections::{HashMap, VecDeque};

/// Frames for every instruction in a routine
///
/// Instructions that can never be reached have no frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frames {
    frames: Vec<Option<Frame>>,
}

impl Frames {
    /// Number of frames (one per instruction, reachable or not)
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame before the instruction at the given position, if that instruction is reachable
    pub fn get(&self, position: usize) -> Option<&Frame> {
        self.frames.get(position).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Frame>> + '_ {
        self.frames.iter().map(Option::as_ref)
    }
}

/// Compute the frame before every instruction in the routine
///
/// This is a standard fixed point: frames flow forward along fall through, jumps, and exception
/// edges, and are met at join points until nothing changes. Since the lattice of values has
/// height 2, every position is revisited at most a couple of times.
///
/// The first value in local 0 (the receiver of an instance method) is tracked as the
/// [`AbstractValue::SelfSentinel`].
pub fn analyze(owner: &BinaryName, routine: &Routine) -> Result<Frames, Error> {
    let error = |position: usize, kind: AnalysisErrorKind| Error::Analysis {
        owner: owner.clone(),
        position,
        kind,
    };

    let instructions = &routine.instructions;
    if instructions.is_empty() {
        return Err(error(0, AnalysisErrorKind::FallsOffEnd));
    }

    // Resolve labels up front
    let mut label_positions: HashMap<Label, usize> = HashMap::new();
    for (position, insn) in instructions.iter().enumerate() {
        if let Instruction::Label(label) = insn {
            if label_positions.insert(*label, position).is_some() {
                return Err(error(position, AnalysisErrorKind::DuplicateLabel(*label)));
            }
        }
    }
    let resolve = |position: usize, label: &Label| -> Result<usize, Error> {
        label_positions
            .get(label)
            .copied()
            .ok_or_else(|| error(position, AnalysisErrorKind::UnknownLabel(*label)))
    };

    let mut handlers: Vec<(usize, usize, usize)> = vec![];
    for handler in &routine.handlers {
        handlers.push((
            resolve(0, &handler.start)?,
            resolve(0, &handler.end)?,
            resolve(0, &handler.handler)?,
        ));
    }

    let mut frames: Vec<Option<Frame>> = vec![None; instructions.len()];
    let mut queued: Vec<bool> = vec![false; instructions.len()];
    frames[0] = Some(entry_frame(routine));

    let mut worklist = VecDeque::new();
    worklist.push_back(0);
    queued[0] = true;

    let mut visits = 0;
    while let Some(position) = worklist.pop_front() {
        queued[position] = false;
        visits += 1;

        let frame_before = match &frames[position] {
            Some(frame) => frame.clone(),
            None => continue,
        };
        let insn = &instructions[position];
        log::trace!("{:>4}: {:<40} {}", position, format!("{:?}", insn), frame_before);

        let mut successors: Vec<(usize, Frame)> = vec![];

        // Exception edges carry the locals before the instruction
        for (start, end, handler) in &handlers {
            if *start <= position && position < *end {
                let handler_frame = Frame {
                    locals: frame_before.locals.clone(),
                    stack: vec![AbstractValue::Ordinary(ValueKind::Reference)],
                };
                successors.push((*handler, handler_frame));
            }
        }

        let mut frame_after = frame_before;
        frame_after
            .execute(insn, &routine.descriptor.return_type)
            .map_err(|kind| error(position, kind))?;

        for target in insn.jump_targets() {
            successors.push((resolve(position, &target)?, frame_after.clone()));
        }
        if insn.falls_through() {
            if position + 1 == instructions.len() {
                return Err(error(position, AnalysisErrorKind::FallsOffEnd));
            }
            successors.push((position + 1, frame_after));
        }

        for (successor, incoming) in successors {
            let changed = match &mut frames[successor] {
                Some(existing) => existing
                    .merge(&incoming)
                    .map_err(|kind| error(successor, kind))?,
                slot @ None => {
                    *slot = Some(incoming);
                    true
                }
            };
            if changed && !queued[successor] {
                queued[successor] = true;
                worklist.push_back(successor);
            }
        }
    }

    log::trace!(
        "analyzed {}.{} in {} visits of {} instructions",
        owner,
        routine.name,
        visits,
        instructions.len()
    );

    if frames.len() != instructions.len() {
        return Err(Error::InternalInvariant {
            frames: frames.len(),
            instructions: instructions.len(),
        });
    }
    Ok(Frames { frames })
}

/// Frame on entry to the routine
///
/// Locals are sized to fit every slot the code touches. Local 0 starts out holding the sentinel
/// if it holds a reference (for a static routine, this is the first parameter).
fn entry_frame(routine: &Routine) -> Frame {
    let mut locals = vec![AbstractValue::Uninitialized; routine.max_locals()];

    if !routine.is_static() {
        locals[0] = AbstractValue::SelfSentinel;
    }
    for (slot, parameter) in routine.parameter_slots() {
        let kind = ValueKind::of(parameter);
        locals[slot as usize] = if slot == 0 && kind == ValueKind::Reference {
            AbstractValue::SelfSentinel
        } else {
            AbstractValue::Ordinary(kind)
        };
    }

    Frame {
        locals,
        stack: vec![],
    }
}
