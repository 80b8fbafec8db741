use super::{Instruction, Label};
use crate::jvm::{BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, UnqualifiedName};
use std::collections::HashMap;

/// Entry of a method's exception table
///
/// The protected range is `[start, end)`, in terms of the positions of the labels in the
/// instruction stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,

    /// `None` catches everything (as for `finally` blocks)
    pub catch_type: Option<BinaryName>,
}

/// Method along with its code
///
/// The instruction stream is the unit of analysis: positions of instructions are just their
/// indices in [`Routine::instructions`].
#[derive(Clone, Debug, PartialEq)]
pub struct Routine {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub access_flags: MethodAccessFlags,

    /// Declared checked exceptions (the `Exceptions` attribute)
    pub exceptions: Vec<BinaryName>,

    pub instructions: Vec<Instruction>,
    pub handlers: Vec<ExceptionHandler>,
}

impl Routine {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Is this an instance initializer?
    pub fn is_initializer(&self) -> bool {
        self.name.is_init() && !self.is_static()
    }

    /// Number of local variable slots needed
    ///
    /// This is the larger of the slots taken by the parameters (including `this`) and the highest
    /// slot touched by any instruction.
    pub fn max_locals(&self) -> usize {
        let parameters = self.descriptor.parameter_length(!self.is_static());
        self.instructions
            .iter()
            .filter_map(Instruction::local_slots)
            .map(|(slot, width)| slot as usize + width)
            .fold(parameters, usize::max)
    }

    /// Parameters along with the local slot each one arrives in
    pub fn parameter_slots(&self) -> Vec<(u16, &FieldType)> {
        self.descriptor
            .parameter_slots(!self.is_static())
            .into_iter()
            .zip(self.descriptor.parameters.iter())
            .collect()
    }

    /// Positions of all labels placed in the instruction stream
    ///
    /// If a label is placed twice, the first placement wins. Use [`Routine::duplicate_label`] to
    /// detect that case.
    pub fn label_positions(&self) -> HashMap<Label, usize> {
        let mut positions = HashMap::new();
        for (position, insn) in self.instructions.iter().enumerate() {
            if let Instruction::Label(label) = insn {
                positions.entry(*label).or_insert(position);
            }
        }
        positions
    }

    /// Find a label that is placed more than once
    pub fn duplicate_label(&self) -> Option<Label> {
        let mut seen = HashMap::new();
        for insn in &self.instructions {
            if let Instruction::Label(label) = insn {
                if seen.insert(*label, ()).is_some() {
                    return Some(*label);
                }
            }
        }
        None
    }
}
