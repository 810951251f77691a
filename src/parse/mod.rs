pub mod bin;
pub mod instr;
pub mod list;

pub use bin::SpirvBinary;
pub use instr::{Instr, Instrs, Instruction, InstructionBuilder, Operands};
pub use list::{FileBreak, InstList};
