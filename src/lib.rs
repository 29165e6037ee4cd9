// Main library entry point for pyxref.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;
