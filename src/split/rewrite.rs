use crate::jvm::code::{Constant, Instruction, InvokeType, MethodRef, ValueKind};
use crate::jvm::{FieldType, MethodDescriptor, UnqualifiedName};
use crate::util::Width;

/// Sink for generated code, with helpers for common sequences
pub trait CodeEmitter {
    /// Append one instruction
    fn push_instruction(&mut self, insn: Instruction);

    /// Push an integer constant onto the stack
    fn const_int(&mut self, integer: i32) {
        let insn = match integer {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            -128..=127 => Instruction::BiPush(integer as i8),
            -32768..=32767 => Instruction::SiPush(integer as i16),
            _ => Instruction::Ldc(Constant::Integer(integer)),
        };
        self.push_instruction(insn);
    }

    /// Get a local at a particular slot
    fn get_local(&mut self, slot: u16, field_type: &FieldType) {
        self.push_instruction(Instruction::load(ValueKind::of(field_type), slot));
    }

    /// Box the primitive on top of the stack (references are left alone)
    fn box_value(&mut self, field_type: &FieldType) {
        if let FieldType::Base(base_type) = field_type {
            let boxed = base_type.boxed_class();
            self.push_instruction(Instruction::Invoke(
                InvokeType::Static,
                MethodRef {
                    class: boxed.clone(),
                    name: UnqualifiedName::VALUEOF,
                    descriptor: MethodDescriptor {
                        parameters: vec![field_type.clone()],
                        return_type: Some(FieldType::object(boxed)),
                    },
                },
            ));
        }
    }

    /// Swap the top two values on the stack, given their types
    ///
    /// There is only a `swap` instruction for two narrow values, so the other cases go through
    /// a duplicate-and-pop.
    fn swap(&mut self, prev: &FieldType, top: &FieldType) {
        match (prev.width(), top.width()) {
            (1, 1) => self.push_instruction(Instruction::Swap),
            (2, 1) => {
                self.push_instruction(Instruction::DupX2);
                self.push_instruction(Instruction::Pop);
            }
            (1, _) => {
                self.push_instruction(Instruction::Dup2X1);
                self.push_instruction(Instruction::Pop2);
            }
            _ => {
                self.push_instruction(Instruction::Dup2X2);
                self.push_instruction(Instruction::Pop2);
            }
        }
    }
}

impl CodeEmitter for Vec<Instruction> {
    fn push_instruction(&mut self, insn: Instruction) {
        self.push(insn);
    }
}

/// Copy instructions into an emitter
///
/// After each instruction is copied, `after` gets to emit extra code for it.
pub fn rewrite<'a, E, F>(
    source: impl IntoIterator<Item = &'a Instruction>,
    emitter: &mut E,
    mut after: F,
) where
    E: CodeEmitter,
    F: FnMut(&Instruction, &mut E),
{
    for insn in source {
        emitter.push_instruction(insn.clone());
        after(insn, emitter);
    }
}
