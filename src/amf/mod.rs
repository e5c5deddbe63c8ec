//! Action Message Format (AMF) encoding and decoding.
//!
//! RTMP command messages carry their arguments AMF-encoded. AMF0 is the
//! format almost every encoder and player speaks; AMF3 appears inside AMF0
//! streams behind an "avmplus object" marker and when a client negotiates
//! `objectEncoding = 3`. Both formats share the [`AmfValue`] representation
//! so callers above this module never need to know which wire format
//! produced a given value.

pub mod amf0;
pub mod amf3;
pub mod value;

pub use amf0::{decode, decode_all, encode, encode_all, Amf0Decoder, Amf0Encoder};
pub use amf3::{Amf3Decoder, Amf3Encoder};
pub use value::AmfValue;
