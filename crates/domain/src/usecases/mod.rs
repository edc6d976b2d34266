//! Application use cases / business logic

pub mod bot;
pub mod compose;
pub mod schedule;

pub use bot::{BotError, PersonaBot};
pub use compose::{PostComposer, SYSTEM_INSTRUCTION};
pub use schedule::{CadenceScheduler, CycleRunner, ScheduleConfig};
