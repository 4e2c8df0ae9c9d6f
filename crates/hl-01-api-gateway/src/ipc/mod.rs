//! Bus side of the gateway: the correlator that publishes commands and the
//! dispatcher that routes responses back to waiting callers.

pub mod correlator;
pub mod dispatcher;

pub use correlator::Correlator;
pub use dispatcher::ResponseDispatcher;
