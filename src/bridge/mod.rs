//! Agent bridge: process launch, event decoding, classification and
//! result aggregation.

mod agent;
mod error;
mod events;
mod process;
mod result;
mod runner;
mod session;
mod stream;

pub use agent::*;
pub use error::*;
pub use events::*;
pub use process::*;
pub use result::*;
pub use runner::*;
pub use session::*;
pub use stream::*;
