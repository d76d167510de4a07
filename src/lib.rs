//! Batch static analysis of error handling in C/C++ code: for every call to
//! a watched function, decide how its error signal was handled and persist
//! one category per call site.

pub mod classify;
pub mod cli;
pub mod shared;
