//! Book catalog application library
//!
//! Hosts the catalog modules and the bootstrap shared by the server binary
//! and the command line.

pub mod app;
pub mod modules;

pub use modules::*;
