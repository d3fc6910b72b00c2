pub mod reassembly;
mod receiver;

pub use reassembly::{find_eos, Decoded, Progress, ReassemblyState};
pub use receiver::StreamReassembler;
