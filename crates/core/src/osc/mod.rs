pub mod correlator;
pub mod dispatcher;
pub mod transport;

pub use correlator::{Correlator, QueryTimeouts, Reply};
pub use dispatcher::{address_matches, Dispatcher, Handler};
pub use transport::{AddressPrompt, OscArg, ServerAddress, Transport};
