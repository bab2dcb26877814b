pub mod cue;
pub mod cue_registry;

pub use cue::{Cue, EosCue, EosCueList, QlabCue};
pub use cue_registry::{EosRegistry, QlabRegistry};
