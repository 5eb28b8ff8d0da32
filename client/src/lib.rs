mod logging;
mod store;
mod sync;

pub use logging::*;
pub use store::client::*;
pub use sync::controller::*;
pub use sync::state::*;
