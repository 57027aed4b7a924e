#[allow(clippy::module_inception)]
pub mod backend;
pub mod jack;

pub use self::backend::{choose_device, Backend, InputPort, OutputPort};
