//! Child-process plumbing shared by the build and smoke steps.

pub mod process;
