//! Database query modules.

pub mod fragments;
pub mod tags;
pub mod videos;
