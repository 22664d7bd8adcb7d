pub mod embed;
pub mod error;
pub mod format;
pub mod persist;
pub mod reader;
pub mod sections;
pub mod translator;

pub use embed::*;
pub use error::{Error, Result};
pub use format::*;
pub use persist::save;
pub use reader::*;
pub use sections::*;
pub use translator::*;
