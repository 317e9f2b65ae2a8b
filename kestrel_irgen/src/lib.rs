//! kestrel_irgen: Function-type ABI lowering and call emission.
//!
//! Lowers typed source functions to kestrel IR under a single simplified
//! calling convention. Function values are two-word closures, aggregates
//! are passed and returned by address, and the low-level signatures derived
//! from function types are cached per type.

pub mod ast;
pub mod builtin;
pub mod config;
pub mod error;
pub mod explosion;
pub mod expr;
pub mod func;
pub mod irgen_function;
pub mod irgen_module;
pub mod rvalue;
pub mod schema;
pub mod type_info;

pub use config::{IrGenOptions, TargetLayout};
pub use error::{IrGenError, Result};
pub use irgen_module::IrGenModule;
