// Core domain model: the classification engine and the database encoder.

pub mod classify;
pub mod context;
pub mod cst;
pub mod encode;
pub mod error;
pub mod line;
pub mod mark;
pub mod walk;
