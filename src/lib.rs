pub mod api;
pub mod attr;
pub mod context;
pub mod error;
pub mod lexer;
pub mod schema;
pub mod serialization;
pub mod source;
pub mod template;
pub mod utils;

pub use api::{analyze, analyze_path, Analysis};
pub use error::{Result, TycoError};
pub use serialization::Value;
