//! CLI commands implementation

pub mod index;
pub mod init;
pub mod response;
pub mod search;
pub mod status;

pub use index::*;
pub use init::*;
pub use response::*;
pub use search::*;
pub use status::*;
