//! Instruction encoders for the trampoline compilers

pub mod aarch64;
pub mod x86;
