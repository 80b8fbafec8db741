//! Split JVM instance initializers around their chaining call
//!
//! Hot-patching a class whose constructors changed is awkward: the JVM insists that the first
//! thing done with a fresh `this` is a call to another initializer, and that call can't be moved
//! elsewhere. This crate takes an initializer apart so that everything except that call can be.
//!
//!   - [`jvm`] models methods and their bytecode
//!   - [`listing`] reads and prints routines in a textual assembly format
//!   - [`analysis`] tracks the uninitialized `this` through the code
//!   - [`split`] finds the chaining call and synthesizes `init$args` and `init$body`

pub mod analysis;
mod errors;
pub mod jvm;
pub mod listing;
pub mod split;
pub mod util;

pub use analysis::analyze;
pub use errors::*;
pub use split::deconstruct;
