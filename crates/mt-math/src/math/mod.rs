//! Core math modules.

pub mod matrix;
pub mod transition;
