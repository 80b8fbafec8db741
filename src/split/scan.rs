use crate::analysis::{AbstractValue, Frame, Frames};
use crate::errors::StructuralError;
use crate::jvm::code::{Instruction, InvokeType, MethodRef, Routine};
use crate::jvm::BinaryName;
use crate::util::Width;

/// Most recent load of the uninitialized `this` onto the stack
///
/// Once the stack shrinks below the depth it had just after the load, the loaded reference has
/// been consumed by something and the record has escaped. Escaping is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfLoadRecord {
    /// Position of the `aload 0`
    pub position: usize,

    /// Stack depth right after the load
    pub depth_after_load: usize,

    escaped: bool,
}

impl SelfLoadRecord {
    pub fn new(position: usize, depth_after_load: usize) -> SelfLoadRecord {
        SelfLoadRecord {
            position,
            depth_after_load,
            escaped: false,
        }
    }

    pub fn escaped(&self) -> bool {
        self.escaped
    }

    /// Account for the stack depth before some later instruction
    pub fn observe_depth(&mut self, depth: usize) {
        if depth < self.depth_after_load {
            self.escaped = true;
        }
    }
}

/// Chaining call found by [`find_chaining_call`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainingCall {
    /// Self load feeding the call
    pub self_load: SelfLoadRecord,

    /// Position of the `invokespecial`
    pub position: usize,

    /// Initializer being called
    pub method: MethodRef,
}

/// Find the single `<init>` call on the uninitialized `this`
///
/// Instructions are visited in order (unreachable ones are skipped). Up to the chaining call, any
/// instruction consuming `this` other than as the receiver of the chaining call, the receiver of
/// a `putfield` to one of the owner's own fields, or the operand of a `pop` counts as a leak.
pub fn find_chaining_call(
    owner: &BinaryName,
    routine: &Routine,
    frames: &Frames,
) -> Result<ChainingCall, StructuralError> {
    let mut last_self_load: Option<SelfLoadRecord> = None;
    let mut leaked_at: Option<usize> = None;
    let mut chosen: Option<ChainingCall> = None;

    for (position, (insn, frame)) in routine.instructions.iter().zip(frames.iter()).enumerate() {
        let frame = match frame {
            Some(frame) => frame,
            None => continue,
        };

        if let Some(first) = &chosen {
            if self_initializer_call(insn, frame).is_some() {
                return Err(StructuralError::MultipleChainingCalls {
                    first: first.position,
                    second: position,
                });
            }
            continue;
        }

        if let Some(record) = &mut last_self_load {
            record.observe_depth(frame.depth());
        }

        if let Instruction::ALoad(0) = insn {
            if frame.locals.first() == Some(&AbstractValue::SelfSentinel) {
                log::trace!("self load at {}", position);
                last_self_load = Some(SelfLoadRecord::new(position, frame.depth() + 1));
                continue;
            }
        }

        let self_call = self_initializer_call(insn, frame);
        let receiver_depth = self_call.map(|(depth, _)| depth);
        if leaked_at.is_none() && leaks_self(owner, insn, frame, receiver_depth) {
            log::debug!("self reference leaks at {} ({:?})", position, insn);
            leaked_at = Some(position);
        }

        if let Some((receiver_depth, method)) = self_call {
            let record = match last_self_load {
                Some(record) => record,
                None => {
                    return Err(StructuralError::SelfEscaped {
                        self_load: position,
                        call: position,
                    })
                }
            };
            let feeds_call = record.depth_after_load + receiver_depth == frame.depth();
            if record.escaped() || leaked_at.is_some() || !feeds_call {
                return Err(StructuralError::SelfEscaped {
                    self_load: record.position,
                    call: position,
                });
            }
            chosen = Some(ChainingCall {
                self_load: record,
                position,
                method: method.clone(),
            });
        }
    }

    chosen.ok_or(StructuralError::NoChainingCall)
}

/// If this is an `<init>` call whose receiver is the uninitialized `this`, how far down the stack
/// is the receiver (and which initializer is called)?
fn self_initializer_call<'a>(
    insn: &'a Instruction,
    frame: &Frame,
) -> Option<(usize, &'a MethodRef)> {
    match insn {
        Instruction::Invoke(InvokeType::Special, method) if method.is_init() => {
            let depth = method.descriptor.parameters.len();
            if frame.peek(depth) == Some(AbstractValue::SelfSentinel) {
                Some((depth, method))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Does the instruction consume `this` in some way that lets it escape?
fn leaks_self(
    owner: &BinaryName,
    insn: &Instruction,
    frame: &Frame,
    chaining_receiver: Option<usize>,
) -> bool {
    let allowed = |depth: usize| match insn {
        Instruction::Pop | Instruction::Pop2 => true,
        Instruction::PutField(field) => depth == 1 && field.class == *owner,
        _ => Some(depth) == chaining_receiver,
    };

    (0..consumed_operands(insn, frame))
        .any(|depth| frame.peek(depth) == Some(AbstractValue::SelfSentinel) && !allowed(depth))
}

/// Number of stack entries the instruction uses up
///
/// Stack shuffles (`dup`, `swap`, and friends) only move values around, so they consume nothing.
fn consumed_operands(insn: &Instruction, frame: &Frame) -> usize {
    use Instruction::*;

    match insn {
        IStore(_) | LStore(_) | FStore(_) | DStore(_) | AStore(_) => 1,
        IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => 2,
        IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => 3,
        Pop => 1,
        Pop2 => match frame.peek(0) {
            Some(top) if top.width() == 2 => 1,
            _ => 2,
        },
        IAdd | LAdd | FAdd | DAdd | ISub | LSub | FSub | DSub | IMul | LMul | FMul | DMul
        | IDiv | LDiv | FDiv | DDiv | IRem | LRem | FRem | DRem | ISh(_) | LSh(_) | IAnd
        | LAnd | IOr | LOr | IXor | LXor | LCmp | FCmp(_) | DCmp(_) => 2,
        INeg | LNeg | FNeg | DNeg | I2L | I2F | I2D | L2I | L2F | L2D | F2I | F2L | F2D | D2I
        | D2L | D2F | I2B | I2C | I2S => 1,
        If(_, _) | IfNull(_, _) | TableSwitch { .. } | LookupSwitch { .. } => 1,
        IfICmp(_, _) | IfACmp(_, _) => 2,
        IReturn | LReturn | FReturn | DReturn | AReturn | AThrow => 1,
        PutStatic(_) | GetField(_) => 1,
        PutField(_) => 2,
        Invoke(invoke_type, method) => {
            method.descriptor.parameters.len() + usize::from(invoke_type.has_receiver())
        }
        InvokeDynamic(call) => call.descriptor.parameters.len(),
        NewArray(_) | ANewArray(_) | ArrayLength | CheckCast(_) | InstanceOf(_) => 1,
        MonitorEnter | MonitorExit => 1,
        MultiANewArray(_, dimensions) => *dimensions as usize,
        _ => 0,
    }
}
