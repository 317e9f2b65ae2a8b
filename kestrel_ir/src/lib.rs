//! kestrel_ir: Low-level intermediate representation for the kestrel backend.

pub mod builder;
pub mod display;
pub mod function;
pub mod instruction;
pub mod module;
pub mod types;
pub mod value;
pub mod verifier;

#[cfg(test)]
mod tests;
