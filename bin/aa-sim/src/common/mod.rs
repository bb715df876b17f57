mod error;
mod logging;
mod outcome;
mod scenario;

pub use error::*;
pub use logging::*;
pub use outcome::*;
pub use scenario::*;
