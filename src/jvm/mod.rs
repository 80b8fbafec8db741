//! Model of JVM methods, as much as is needed to take initializers apart
//!
//! ### Simple example
//!
//! Consider the following Java constructor:
//!
//! ```java,ignore,no_run
//! public Point(int x, int y) {
//!     super();
//!     this.x = x;
//! }
//! ```
//!
//! Its code can be modelled as follows:
//!
//! ```
//! use ctorsplit::jvm::code::{Instruction::*, InvokeType, MethodRef, FieldRef, Routine};
//! use ctorsplit::jvm::*;
//!
//! let point = BinaryName::from_str("me/alec/Point").unwrap();
//! let constructor = Routine {
//!     owner: point.clone(),
//!     name: UnqualifiedName::INIT,
//!     descriptor: MethodDescriptor::parse("(II)V").unwrap(),
//!     access_flags: MethodAccessFlags::PUBLIC,
//!     exceptions: vec![],
//!     instructions: vec![
//!         ALoad(0),
//!         Invoke(InvokeType::Special, MethodRef {
//!             class: BinaryName::OBJECT,
//!             name: UnqualifiedName::INIT,
//!             descriptor: MethodDescriptor::parse("()V").unwrap(),
//!         }),
//!         ALoad(0),
//!         ILoad(1),
//!         PutField(FieldRef {
//!             class: point,
//!             name: UnqualifiedName::from_str("x").unwrap(),
//!             descriptor: FieldType::int(),
//!         }),
//!         Return,
//!     ],
//!     handlers: vec![],
//! };
//! assert_eq!(constructor.max_locals(), 3);
//! ```

mod access_flags;
pub mod code;
mod descriptors;
mod names;

pub use access_flags::*;
pub use descriptors::*;
pub use names::*;
