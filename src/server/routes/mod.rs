//! Route handlers for the HTTP API.

pub mod fragments;
pub mod health;
pub mod tags;
pub mod videos;
