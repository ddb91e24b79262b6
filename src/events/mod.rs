//! Bus de eventos de workflow

pub mod bus;

pub use bus::{EventSubscriber, WorkflowEventBus};
