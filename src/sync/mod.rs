pub mod channel;
pub mod event;
pub mod poll;

pub use channel::{ChannelEvent, ChannelHandle};
pub use event::{ClientIntent, CommandEntry, ConfigPatch, LiveConfig, Stats, StatsPatch, SyncEvent};
