pub mod assembler;
pub mod config;
pub mod context;

pub use assembler::{Assembler, assemble};
pub use config::AssembleConfig;
pub use context::AssembleContext;
