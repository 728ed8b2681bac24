//! LLSD values and the notation codec used for LEAP payloads.
//!
//! - [`Value`] : nested maps, arrays and scalars, maps insertion-ordered
//! - [`to_notation`] / [`from_notation`] : the byte-exact wire notation
//! - [`ParseError`] : decode failures with offset and a bounded dump
//!
//! `from_notation(&to_notation(&v)) == v` for every value without NaN reals.

pub mod error;
pub mod json;
pub mod notation;
pub mod value;

pub use error::{ParseError, DIAGNOSTIC_WIDTH};
pub use notation::{from_notation, to_notation, write_notation};
pub use value::{Map, Value};
