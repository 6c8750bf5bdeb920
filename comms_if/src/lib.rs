//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands read from the command stream
pub mod tc;

/// Message definitions for equipment (odometry and velocity commands)
pub mod eqpt;

/// Network module
pub mod net;
