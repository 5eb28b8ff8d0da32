mod listen;
mod status;
mod toggle;

pub use listen::listen;
pub use status::status;
pub use toggle::toggle;
