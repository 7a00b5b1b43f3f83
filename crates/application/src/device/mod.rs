mod handle;
mod worker;

pub use handle::{DeviceHandle, WorkerMessage};
pub use worker::{DeviceWorker, WorkerContext};
