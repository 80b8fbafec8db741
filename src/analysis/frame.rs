use super::AbstractValue;
use crate::errors::AnalysisErrorKind;
use crate::jvm::code::{Instruction, ValueKind};
use crate::jvm::FieldType;
use crate::util::Width;
use std::fmt;

/// Snapshot of the stack and local variables before an instruction executes
///
/// The stack has one entry per value (a `long` is one entry). Locals have one entry per slot, so
/// a `long` or `double` local is followed by an [`AbstractValue::Uninitialized`] slot.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame {
    /// Local variables, indexed by slot
    pub locals: Vec<AbstractValue>,

    /// Values on the stack (top of the stack is last)
    pub stack: Vec<AbstractValue>,
}

impl Frame {
    /// Number of values on the stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Look at the value `depth` entries below the top of the stack (`0` is the top)
    pub fn peek(&self, depth: usize) -> Option<AbstractValue> {
        let index = self.stack.len().checked_sub(depth + 1)?;
        self.stack.get(index).copied()
    }

    /// Meet another frame into this one, returning whether anything changed
    pub fn merge(&mut self, other: &Frame) -> Result<bool, AnalysisErrorKind> {
        if self.stack.len() != other.stack.len() {
            return Err(AnalysisErrorKind::IncompatibleStacks {
                expected: self.stack.len(),
                found: other.stack.len(),
            });
        }

        let mut changed = false;
        let pairs = self
            .locals
            .iter_mut()
            .zip(other.locals.iter())
            .chain(self.stack.iter_mut().zip(other.stack.iter()));
        for (mine, theirs) in pairs {
            let met = mine.meet(*theirs);
            if met != *mine {
                *mine = met;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Update the frame to reflect the effects of the given instruction
    ///
    /// Jumps are handled like any other instruction: only their effect on the stack is modelled
    /// here. `return_type` is the return type of the enclosing routine.
    pub fn execute(
        &mut self,
        insn: &Instruction,
        return_type: &Option<FieldType>,
    ) -> Result<(), AnalysisErrorKind> {
        execute(self, insn, return_type)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for local in &self.locals {
            write!(f, "{}", local)?;
        }
        f.write_str("] [")?;
        for value in &self.stack {
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}

fn execute(
    frame: &mut Frame,
    insn: &Instruction,
    return_type: &Option<FieldType>,
) -> Result<(), AnalysisErrorKind> {
    use AbstractValue::Ordinary;
    use Instruction::*;
    use ValueKind::{Double, Float, Int, Long, Reference};

    let Frame {
        ref mut stack,
        ref mut locals,
    } = frame;

    match insn {
        Label(_) | Nop => (),
        AConstNull => stack.push(Ordinary(Reference)),
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            stack.push(Ordinary(Int));
        }
        LConst0 | LConst1 => stack.push(Ordinary(Long)),
        FConst0 | FConst1 | FConst2 => stack.push(Ordinary(Float)),
        DConst0 | DConst1 => stack.push(Ordinary(Double)),
        BiPush(_) | SiPush(_) => stack.push(Ordinary(Int)),
        Ldc(constant) => stack.push(Ordinary(constant.kind())),

        ILoad(_) | LLoad(_) | FLoad(_) | DLoad(_) | ALoad(_) => {
            if let Some((kind, slot)) = insn.local_load() {
                // The sentinel survives being loaded
                let value = get_local_expecting_kind(locals, slot, kind)?;
                stack.push(value);
            }
        }

        IALoad | BALoad | CALoad | SALoad => array_load(stack, Int)?,
        LALoad => array_load(stack, Long)?,
        FALoad => array_load(stack, Float)?,
        DALoad => array_load(stack, Double)?,
        AALoad => array_load(stack, Reference)?,

        IStore(_) | LStore(_) | FStore(_) | DStore(_) | AStore(_) => {
            if let Some((kind, slot)) = insn.local_store() {
                let value = pop_expecting_kind(stack, kind)?;
                set_local(locals, slot, value)?;
            }
        }

        IAStore | BAStore | CAStore | SAStore => array_store(stack, Int)?,
        LAStore => array_store(stack, Long)?,
        FAStore => array_store(stack, Float)?,
        DAStore => array_store(stack, Double)?,
        AAStore => array_store(stack, Reference)?,

        Pop => {
            let _ = pop_expecting_width(stack, 1)?;
        }

        Pop2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let _ = pop_expecting_width(stack, 1)?;
                }

                // Form 2
                2 => (),

                other => return Err(AnalysisErrorKind::InvalidWidth(other)),
            }
        }

        Dup => {
            let arg1 = pop_expecting_width(stack, 1)?;
            stack.extend([arg1, arg1]);
        }

        DupX1 => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            stack.extend([arg1, arg2, arg1]);
        }

        DupX2 => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop(stack)?;
            match arg2.width() {
                // Form 1
                1 => {
                    let arg3 = pop_expecting_width(stack, 1)?;
                    stack.extend([arg1, arg3, arg2, arg1]);
                }

                // Form 2
                2 => stack.extend([arg1, arg2, arg1]),

                other => return Err(AnalysisErrorKind::InvalidWidth(other)),
            }
        }

        Dup2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    stack.extend([arg2, arg1, arg2, arg1]);
                }

                // Form 2
                2 => stack.extend([arg1, arg1]),

                other => return Err(AnalysisErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X1 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    let arg3 = pop_expecting_width(stack, 1)?;
                    stack.extend([arg2, arg1, arg3, arg2, arg1]);
                }

                // Form 2
                2 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    stack.extend([arg1, arg2, arg1]);
                }

                other => return Err(AnalysisErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    let arg3 = pop(stack)?;
                    match arg3.width() {
                        // Form 1
                        1 => {
                            let arg4 = pop_expecting_width(stack, 1)?;
                            stack.extend([arg2, arg1, arg4, arg3, arg2, arg1]);
                        }

                        // Form 3
                        2 => stack.extend([arg2, arg1, arg3, arg2, arg1]),

                        other => return Err(AnalysisErrorKind::InvalidWidth(other)),
                    }
                }
                2 => {
                    let arg2 = pop(stack)?;
                    match arg2.width() {
                        // Form 2
                        1 => {
                            let arg3 = pop_expecting_width(stack, 1)?;
                            stack.extend([arg1, arg3, arg2, arg1]);
                        }

                        // Form 4
                        2 => stack.extend([arg1, arg2, arg1]),

                        other => return Err(AnalysisErrorKind::InvalidWidth(other)),
                    }
                }
                other => return Err(AnalysisErrorKind::InvalidWidth(other)),
            }
        }

        Swap => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            stack.extend([arg1, arg2]);
        }

        IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor => binary(stack, Int, Int)?,
        LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor => binary(stack, Long, Long)?,
        FAdd | FSub | FMul | FDiv | FRem => binary(stack, Float, Float)?,
        DAdd | DSub | DMul | DDiv | DRem => binary(stack, Double, Double)?,
        ISh(_) => binary(stack, Int, Int)?,
        LSh(_) => {
            pop_expecting_kind(stack, Int)?;
            pop_expecting_kind(stack, Long)?;
            stack.push(Ordinary(Long));
        }
        LCmp => binary(stack, Long, Int)?,
        FCmp(_) => binary(stack, Float, Int)?,
        DCmp(_) => binary(stack, Double, Int)?,

        INeg => unary(stack, Int, Int)?,
        LNeg => unary(stack, Long, Long)?,
        FNeg => unary(stack, Float, Float)?,
        DNeg => unary(stack, Double, Double)?,
        I2L => unary(stack, Int, Long)?,
        I2F => unary(stack, Int, Float)?,
        I2D => unary(stack, Int, Double)?,
        L2I => unary(stack, Long, Int)?,
        L2F => unary(stack, Long, Float)?,
        L2D => unary(stack, Long, Double)?,
        F2I => unary(stack, Float, Int)?,
        F2L => unary(stack, Float, Long)?,
        F2D => unary(stack, Float, Double)?,
        D2I => unary(stack, Double, Int)?,
        D2L => unary(stack, Double, Long)?,
        D2F => unary(stack, Double, Float)?,
        I2B | I2C | I2S => unary(stack, Int, Int)?,

        IInc(slot, _) => {
            get_local_expecting_kind(locals, *slot, Int)?;
            set_local(locals, *slot, Ordinary(Int))?;
        }

        If(_, _) => {
            pop_expecting_kind(stack, Int)?;
        }
        IfICmp(_, _) => {
            pop_expecting_kind(stack, Int)?;
            pop_expecting_kind(stack, Int)?;
        }
        IfACmp(_, _) => {
            pop_expecting_kind(stack, Reference)?;
            pop_expecting_kind(stack, Reference)?;
        }
        IfNull(_, _) => {
            pop_expecting_kind(stack, Reference)?;
        }
        Goto(_) => (),
        TableSwitch { .. } | LookupSwitch { .. } => {
            pop_expecting_kind(stack, Int)?;
        }

        IReturn => return_value(stack, return_type, Int)?,
        LReturn => return_value(stack, return_type, Long)?,
        FReturn => return_value(stack, return_type, Float)?,
        DReturn => return_value(stack, return_type, Double)?,
        AReturn => return_value(stack, return_type, Reference)?,
        Return => {
            if return_type.is_some() {
                return Err(AnalysisErrorKind::InvalidType);
            }
        }
        AThrow => {
            pop_expecting_kind(stack, Reference)?;
        }

        GetStatic(field) => stack.push(Ordinary(ValueKind::of(&field.descriptor))),
        PutStatic(field) => {
            pop_expecting_kind(stack, ValueKind::of(&field.descriptor))?;
        }
        GetField(field) => unary(stack, Reference, ValueKind::of(&field.descriptor))?,
        PutField(field) => {
            pop_expecting_kind(stack, ValueKind::of(&field.descriptor))?;
            pop_expecting_kind(stack, Reference)?;
        }

        Invoke(invoke_type, method) => {
            for parameter in method.descriptor.parameters.iter().rev() {
                pop_expecting_kind(stack, ValueKind::of(parameter))?;
            }
            if invoke_type.has_receiver() {
                pop_expecting_kind(stack, Reference)?;
            }
            if let Some(return_type) = &method.descriptor.return_type {
                stack.push(Ordinary(ValueKind::of(return_type)));
            }
        }
        InvokeDynamic(call) => {
            for parameter in call.descriptor.parameters.iter().rev() {
                pop_expecting_kind(stack, ValueKind::of(parameter))?;
            }
            if let Some(return_type) = &call.descriptor.return_type {
                stack.push(Ordinary(ValueKind::of(return_type)));
            }
        }

        New(_) => stack.push(Ordinary(Reference)),
        NewArray(_) | ANewArray(_) => unary(stack, Int, Reference)?,
        ArrayLength => unary(stack, Reference, Int)?,
        CheckCast(_) => unary(stack, Reference, Reference)?,
        InstanceOf(_) => unary(stack, Reference, Int)?,
        MonitorEnter | MonitorExit => {
            pop_expecting_kind(stack, Reference)?;
        }
        MultiANewArray(_, dimensions) => {
            for _ in 0..*dimensions {
                pop_expecting_kind(stack, Int)?;
            }
            stack.push(Ordinary(Reference));
        }
    }

    Ok(())
}

fn unary(
    stack: &mut Vec<AbstractValue>,
    input: ValueKind,
    output: ValueKind,
) -> Result<(), AnalysisErrorKind> {
    pop_expecting_kind(stack, input)?;
    stack.push(AbstractValue::Ordinary(output));
    Ok(())
}

fn binary(
    stack: &mut Vec<AbstractValue>,
    inputs: ValueKind,
    output: ValueKind,
) -> Result<(), AnalysisErrorKind> {
    pop_expecting_kind(stack, inputs)?;
    pop_expecting_kind(stack, inputs)?;
    stack.push(AbstractValue::Ordinary(output));
    Ok(())
}

fn array_load(stack: &mut Vec<AbstractValue>, element: ValueKind) -> Result<(), AnalysisErrorKind> {
    pop_expecting_kind(stack, ValueKind::Int)?;
    pop_expecting_kind(stack, ValueKind::Reference)?;
    stack.push(AbstractValue::Ordinary(element));
    Ok(())
}

fn array_store(
    stack: &mut Vec<AbstractValue>,
    element: ValueKind,
) -> Result<(), AnalysisErrorKind> {
    pop_expecting_kind(stack, element)?;
    pop_expecting_kind(stack, ValueKind::Int)?;
    pop_expecting_kind(stack, ValueKind::Reference)?;
    Ok(())
}

fn return_value(
    stack: &mut Vec<AbstractValue>,
    return_type: &Option<FieldType>,
    kind: ValueKind,
) -> Result<(), AnalysisErrorKind> {
    pop_expecting_kind(stack, kind)?;
    match return_type {
        Some(return_type) if ValueKind::of(return_type) == kind => Ok(()),
        _ => Err(AnalysisErrorKind::InvalidType),
    }
}

fn get_local_expecting_kind(
    locals: &[AbstractValue],
    slot: u16,
    expected_kind: ValueKind,
) -> Result<AbstractValue, AnalysisErrorKind> {
    let value = locals
        .get(slot as usize)
        .copied()
        .ok_or(AnalysisErrorKind::InvalidIndex(slot))?;
    match value.kind() {
        None => Err(AnalysisErrorKind::UninitializedLocal(slot)),
        Some(kind) if kind == expected_kind => Ok(value),
        Some(_) => Err(AnalysisErrorKind::InvalidType),
    }
}

fn set_local(
    locals: &mut [AbstractValue],
    slot: u16,
    value: AbstractValue,
) -> Result<(), AnalysisErrorKind> {
    let index = slot as usize;
    if index + value.width() > locals.len() {
        return Err(AnalysisErrorKind::InvalidIndex(slot));
    }

    // Overwriting the second half of a wide local invalidates the whole local
    if let Some(previous) = index.checked_sub(1).and_then(|i| locals.get_mut(i)) {
        if previous.width() == 2 {
            *previous = AbstractValue::Uninitialized;
        }
    }

    locals[index] = value;
    if value.width() == 2 {
        locals[index + 1] = AbstractValue::Uninitialized;
    }
    Ok(())
}

fn pop(stack: &mut Vec<AbstractValue>) -> Result<AbstractValue, AnalysisErrorKind> {
    stack.pop().ok_or(AnalysisErrorKind::EmptyStack)
}

fn pop_expecting_width(
    stack: &mut Vec<AbstractValue>,
    expected_width: usize,
) -> Result<AbstractValue, AnalysisErrorKind> {
    let value = pop(stack)?;
    let found_width = value.width();
    if found_width == expected_width {
        Ok(value)
    } else {
        Err(AnalysisErrorKind::InvalidWidth(found_width))
    }
}

fn pop_expecting_kind(
    stack: &mut Vec<AbstractValue>,
    expected_kind: ValueKind,
) -> Result<AbstractValue, AnalysisErrorKind> {
    let value = pop(stack)?;
    if value.kind() == Some(expected_kind) {
        Ok(value)
    } else {
        Err(AnalysisErrorKind::InvalidType)
    }
}
