//! On-disk path definitions for inventory artefacts.
//!
//! This module defines the fixed file and directory names inside entity directories.
//! It contains **no I/O logic** - only names and typed path construction.

pub mod common;
pub mod items;
