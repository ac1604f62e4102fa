//! # Vault Value
//!
//! Dynamic values for presentation resource trees.
//!
//! This crate provides:
//! - A tagged `Value` covering every JSON shape, with integers and floats kept apart
//! - An insertion-ordered `Map` used for property and extension bags
//! - Lossless JSON text conversion that preserves object key order
//!
//! ## Usage
//!
//! ```
//! use vault_value::Value;
//!
//! let value = Value::from_json_str(r#"{"id":"p1","type":"Page","width":1200}"#).unwrap();
//! assert_eq!(value.get_text("type"), Some("Page"));
//!
//! let text = value.to_json_string(false).unwrap();
//! assert_eq!(Value::from_json_str(&text).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod json;
mod value;

pub use error::{ValueError, ValueResult};
pub use value::{Map, Value};
