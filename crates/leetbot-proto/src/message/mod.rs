//! IRC message model, parser and encoder.

mod nom_parser;
mod parse;
mod serialize;
mod types;

pub use self::serialize::encode;
pub use self::types::{Message, Tag};
