//! An insertion-ordered map with caller-controlled sorting and JSON output
//! that follows the map's key order.
//!
//! ```
//! use sortmap::{SortMap, Value};
//!
//! let mut map = SortMap::<String, Value>::new();
//! map.insert("number".into(), 3.into());
//! map.insert("string".into(), "x".into());
//! map.insert("number".into(), 4.into());
//!
//! assert_eq!(map.keys(), ["number", "string"]);
//! assert_eq!(map.to_json_string().unwrap(), r#"{"number":4,"string":"x"}"#);
//! ```

mod finite;

mod encode;
pub use encode::*;

mod error;
pub use error::*;

mod map;
pub use map::*;

mod pair;
pub use pair::*;

mod sort;

mod value;
pub use value::*;
