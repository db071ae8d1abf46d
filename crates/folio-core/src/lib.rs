pub mod envelope;
pub mod founder;
pub mod health;
pub mod oplog;
pub mod prefs;
pub mod ratio;
pub mod stopwatch;
pub mod store;
pub mod types;

pub use envelope::*;
pub use founder::*;
pub use health::*;
pub use oplog::*;
pub use prefs::*;
pub use ratio::*;
pub use stopwatch::*;
pub use store::*;
pub use types::*;
