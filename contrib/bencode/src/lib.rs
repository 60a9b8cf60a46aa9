//! Library for parsing and producing bencoded data.
//!
//! The decoder is strict: dictionary keys must be sorted and unique, integers
//! must be canonical (no leading zeros, no negative zero) and the whole input
//! must be consumed. This is what makes re-encoding a decoded `info`
//! dictionary byte-identical to the wire form, and therefore what makes
//! infohash computation deterministic.
//!
//! # Examples
//!
//! Decoding bencoded data:
//!
//! ```rust
//! use bencode::Bencode;
//!
//! let data = b"d12:lucky_numberi7ee"; // cspell:disable-line
//! let bencode = Bencode::decode(data).unwrap();
//!
//! assert_eq!(
//!     bencode.as_dict().unwrap().lookup(b"lucky_number").unwrap().as_int(),
//!     Some(7)
//! );
//! ```
//!
//! Encoding bencoded data:
//!
//! ```rust
//! use bencode::{ben_bytes, ben_int, ben_map};
//!
//! let message = (ben_map! {
//!     "lucky_number" => ben_int!(7),
//!     "lucky_string" => ben_bytes!("7")
//! })
//! .encode();
//!
//! let data = b"d12:lucky_numberi7e12:lucky_string1:7e"; // cspell:disable-line
//! assert_eq!(&message[..], &data[..]);
//! ```

mod decode;
mod encode;
mod error;
mod value;

pub use crate::decode::{dict_entry_span, value_span};
pub use crate::error::{ParseError, ParseResult};
pub use crate::value::{Bencode, Dict};

const BEN_END: u8 = b'e';
const DICT_START: u8 = b'd';
const LIST_START: u8 = b'l';
const INT_START: u8 = b'i';

const BYTE_LEN_LOW: u8 = b'0';
const BYTE_LEN_HIGH: u8 = b'9';
const BYTE_LEN_END: u8 = b':';

/// Nesting depth accepted by the decoder. Torrent metadata and KRPC messages
/// are shallow; anything deeper is hostile input.
const MAX_RECURSION: usize = 32;

/// Construct a [`Bencode`] dictionary by supplying string references as keys
/// and [`Bencode`] values.
#[macro_export]
macro_rules! ben_map {
    ( $($key:expr => $val:expr),* $(,)? ) => {
        {
            let mut dict = $crate::Dict::new();
            $(
                dict.insert($key.as_bytes().to_vec(), $val);
            )*
            $crate::Bencode::Dict(dict)
        }
    }
}

/// Construct a [`Bencode`] list from a list of [`Bencode`] values.
#[macro_export]
macro_rules! ben_list {
    ( $($ben:expr),* $(,)? ) => {
        $crate::Bencode::List(vec![$($ben),*])
    }
}

/// Construct [`Bencode`] bytes from anything convertible to a byte vector.
#[macro_export]
macro_rules! ben_bytes {
    ( $ben:expr ) => {
        $crate::Bencode::Bytes(Vec::from($ben))
    };
}

/// Construct a [`Bencode`] integer from an `i64`.
#[macro_export]
macro_rules! ben_int {
    ( $ben:expr ) => {
        $crate::Bencode::Int($ben)
    };
}
