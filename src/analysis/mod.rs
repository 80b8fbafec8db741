//! Abstract interpretation of initializer code
//!
//! To split an initializer, we need to know, for every instruction, where the uninitialized `this`
//! is: which stack entries and which locals hold it. Bytecode doesn't say this directly, since the
//! same value can be copied around with `dup`, stored into locals, and reach an instruction along
//! several paths. So we interpret the code abstractly: instead of concrete values, stack entries
//! and locals hold an [`AbstractValue`] which only records the kind of value, except for the
//! receiver which is tracked as a distinct [`AbstractValue::SelfSentinel`].
//!
//! The result is a [`Frame`] (stack and locals) before every instruction, computed by
//! [`analyze`]. At join points (jump targets, exception handlers) incoming frames are met
//! pointwise, so a local that holds `this` along one path and some other reference along another
//! just holds a reference.

mod analyzer;
mod frame;
mod value;

pub use analyzer::*;
pub use frame::*;
pub use value::*;
