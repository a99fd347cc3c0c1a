pub mod error;
pub mod http;
pub mod message;
pub mod param;
pub mod reflection;

pub use error::*;
pub use message::*;
pub use param::*;
pub use reflection::*;
