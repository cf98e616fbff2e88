pub mod error;
pub mod manifest;
pub mod merge;
pub mod pacing;
pub mod render;
pub mod script;
pub mod subtitle;
pub mod timeline;

pub use error::*;
pub use merge::*;
pub use script::*;
pub use timeline::*;
