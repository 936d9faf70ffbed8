// Items in the util crate are imported at the root level, so repetition of the
// module names isn't seen by users outside the crate (and is important for
// context)
#![allow(clippy::module_name_repetitions)]

//! Function interfaces that sit in front of system-specific implementations

mod system;

pub use system::*;
