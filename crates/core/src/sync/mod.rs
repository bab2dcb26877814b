pub mod eos;
pub mod qlab;
pub mod reply;

pub use eos::{sync_eos, CueIdentity, CueListIdentity};
pub use qlab::{connect_workspace, discover_workspace, sync_qlab, QlabReply};
pub use reply::AttributeValue;
