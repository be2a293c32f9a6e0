pub mod backend;
pub mod cpu;
pub mod instructions;
