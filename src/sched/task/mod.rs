//! Modelo de threads e processos

pub mod lifecycle;
pub mod process;
pub mod thread;

pub use lifecycle::{SpawnFlags, ThreadSpec};
pub use process::{
    HeapRange, Process, ProcessInfo, SecurityLevel, SignalHandler, SignalSet, SignalTable, SIGNAL_COUNT,
};
pub use thread::{
    CpuState, Stack, Thread, ThreadAccounting, ThreadInfo, ThreadPriority, ThreadState, ThreadType,
};
