//! Textual listings of routines
//!
//! There is no class file reader here: code comes in and goes out as a small assembly-like text
//! format, close to what `javap -c` or Jasmin show. For example:
//!
//! ```text
//! .class com/example/Child
//! .method public <init>(IZ)V
//!     aload_0
//!     iload_2
//!     ifeq L0
//!     iconst_3
//!     goto L1
//! L0:
//!     bipush 7
//! L1:
//!     invokespecial com/example/Base.<init> (I)V
//!     return
//! .end method
//! ```
//!
//! Everything after a `#` (outside of a string literal) is a comment. Labels are written `L<n>`
//! and placed on their own line. Exception handlers are declared with
//! `.catch <class or any> from L<n> to L<n> using L<n>` anywhere inside the method.
//!
//! Printing a [`Listing`] (with `Display`) produces text that [`parse`] reads back.

mod parser;
mod printer;

pub use parser::parse;

use crate::jvm::code::Routine;
use std::fmt;

/// Sequence of routines, possibly from several classes
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub routines: Vec<Routine>,
}

impl Listing {
    /// Instance initializers in the listing
    pub fn initializers(&self) -> impl Iterator<Item = &Routine> + '_ {
        self.routines.iter().filter(|routine| routine.is_initializer())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingError {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ListingError {}
