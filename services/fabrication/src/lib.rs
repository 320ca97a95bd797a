//! Fabrication workers and the machine status registry (spec.md §4.5,
//! §2).

mod registry;
mod worker;

pub use registry::{MachineRegistry, MachineState};
pub use worker::FabricationWorker;
