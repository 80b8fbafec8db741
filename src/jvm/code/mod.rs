//! Bytecode representation
//!
//! ### Structure
//!
//! Unlike a class file, where code is an array of bytes with relative jump offsets, a method body
//! here is a flat sequence of [`Instruction`]s (see the [instruction set][0]) in which jump
//! targets are symbolic [`Label`]s. The position of a label is given by a [`Instruction::Label`]
//! pseudo-instruction. This keeps the stream easy to analyze instruction by instruction, and easy
//! to cut into pieces and copy elsewhere: a label moves with the instructions around it.
//!
//! A [`Routine`] bundles an instruction stream with everything else needed to interpret it: the
//! owning class, the method descriptor, access flags (is there a `this`?), and the exception
//! table.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod instructions;
mod label;
mod routine;

pub use instructions::*;
pub use label::*;
pub use routine::*;
