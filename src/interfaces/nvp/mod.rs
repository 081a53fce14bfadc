//! Length-prefixed name/value wire format.
//!
//! Every field travels as `NAME[LEN]=VALUE`, fields joined by `&`. `LEN` is
//! the byte length of `VALUE`, which lets values carry `&` and `=` verbatim.

pub mod codec;
pub mod mask;

pub use codec::{FieldToken, RequestBuilder, decode_map, decode_record, encode_field, encode_record};
pub use mask::MaskingPolicy;
