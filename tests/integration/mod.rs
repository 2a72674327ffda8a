//! Integration test suite for the swarm engine.
//!
//! These tests drive the engine against real temporary repositories through
//! the `git` executable, with a bare repository standing in for the remote
//! where one is needed.
//!
//! # Test Categories
//!
//! - `lifecycle`: create, merge, land and cleanup of swarm branches
//! - `conflict`: merge conflicts and aborting them
//! - `locking`: serialization of concurrent operations
//! - `scheduling`: ready fronts and waves over a stored swarm

mod fixtures;

mod conflict;
mod locking;
