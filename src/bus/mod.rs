//! Concurrency substrate (§4.I, §5): the typed command bus, topic event
//! bus, and frame hub that fan state and frames out to every consumer.
//! Each is a process-singleton, held behind an `Arc` by whoever needs it.

pub mod command_bus;
pub mod event_bus;
pub mod frame_hub;

pub use command_bus::{CommandBus, CommandHandler, CommandResult};
pub use event_bus::{EventBus, EventFilter, Subscription};
pub use frame_hub::FrameHub;
