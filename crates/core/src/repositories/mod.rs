//! Repository management modules.
//!
//! This module contains the services for the two entity kinds, items and rooms, and the
//! file primitives they share.

pub mod items;
pub mod rooms;
pub(crate) mod shared;
