pub use config::{ConfigFile, ConfigManager, ConfigSchema, Settings};
pub use connection::{ConnectionManager, ConnectionState, ConsoleKind};
pub use cue::{Cue, EosCue, EosCueList, EosRegistry, QlabCue, QlabRegistry};
pub use error::{
    ConfigError, ConnectionError, ParseError, QueryError, RegistryError, SyncError,
    TimecodeError, TransportError,
};
pub use osc::{
    AddressPrompt, Correlator, Dispatcher, OscArg, QueryTimeouts, Reply, ServerAddress,
    Transport,
};
pub use show_sync::{ConsoleSession, ShowSync, SyncReport};
pub use sync::{sync_eos, sync_qlab};
pub use timecode::TimeCode;

pub mod config;
pub mod connection;
pub mod cue;
pub mod error;
pub mod osc;
mod show_sync;
pub mod sync;
pub mod timecode;
