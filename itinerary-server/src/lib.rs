//! Itinerary search server.
//!
//! Computes routes through a multi-region 3D grid world: A* inside each
//! region over moves generated by pluggable movement modes, and cheapest
//! chains of fixed-cost tunnels between regions. Terrain is read through a
//! cache served by a single owner thread; searches run as supervised
//! sessions on the tokio runtime.

pub mod domain;
pub mod modes;
pub mod planner;
pub mod results;
pub mod session;
pub mod terrain;
pub mod web;
