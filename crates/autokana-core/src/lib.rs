pub mod accumulator;
pub mod binding;
pub mod config;
pub mod host;
pub mod kana;

pub use accumulator::{Decision, KanaAccumulator, ReadingEvent, ReadingState};
pub use binding::Binding;
pub use config::{load_options, Options, OptionsUpdate, Script};
pub use host::{FieldEvent, FieldEventKind, FieldId, Host, HostError, Subscription};
