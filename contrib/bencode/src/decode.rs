use std::ops::Range;
use std::str;

use crate::error::{ParseError, ParseResult};
use crate::value::{Bencode, Dict};

pub(crate) fn decode(bytes: &[u8], pos: usize, depth: usize) -> ParseResult<(Bencode, usize)> {
    if depth >= crate::MAX_RECURSION {
        return Err(ParseError::RecursionExceeded { pos });
    }

    match peek_byte(bytes, pos)? {
        crate::INT_START => {
            let (value, next_pos) = decode_int(bytes, pos + 1, crate::BEN_END)?;
            Ok((Bencode::Int(value), next_pos))
        }
        crate::LIST_START => decode_list(bytes, pos + 1, depth),
        crate::DICT_START => decode_dict(bytes, pos + 1, depth),
        crate::BYTE_LEN_LOW..=crate::BYTE_LEN_HIGH => {
            let (value, next_pos) = decode_bytes(bytes, pos)?;
            Ok((Bencode::Bytes(value.to_vec()), next_pos))
        }
        _ => Err(ParseError::InvalidByte { pos }),
    }
}

fn decode_int(bytes: &[u8], pos: usize, delim: u8) -> ParseResult<(i64, usize)> {
    let (_, begin_decode) = bytes.split_at(pos.min(bytes.len()));

    let Some(relative_end_pos) = begin_decode.iter().position(|n| *n == delim) else {
        return Err(ParseError::IntNoDelimiter { pos });
    };
    let int_byte_slice = &begin_decode[..relative_end_pos];

    if int_byte_slice.len() > 1 {
        // Negative zero is not allowed (this would not be caught when converting)
        if int_byte_slice[0] == b'-' && int_byte_slice[1] == b'0' {
            return Err(ParseError::IntNegativeZero { pos });
        }

        // Zero padding is illegal, and unspecified for key lengths (we disallow both)
        if int_byte_slice[0] == b'0' {
            return Err(ParseError::IntZeroPadding { pos });
        }
    }

    let Ok(int_str) = str::from_utf8(int_byte_slice) else {
        return Err(ParseError::IntUnparsable { pos });
    };

    // Position of end of integer type, next byte is the start of the next value
    let absolute_end_pos = pos + relative_end_pos;
    let next_pos = absolute_end_pos + 1;
    match int_str.parse::<i64>() {
        Ok(n) => Ok((n, next_pos)),
        Err(_) => Err(ParseError::IntUnparsable { pos }),
    }
}

fn decode_bytes(bytes: &[u8], pos: usize) -> ParseResult<(&[u8], usize)> {
    let (num_bytes, start_pos) = decode_int(bytes, pos, crate::BYTE_LEN_END)?;

    let Ok(num_bytes) = usize::try_from(num_bytes) else {
        return Err(ParseError::LengthOverflow { pos });
    };

    if num_bytes > bytes.len() - start_pos.min(bytes.len()) {
        return Err(ParseError::LengthOverflow { pos });
    }

    let next_pos = start_pos + num_bytes;
    Ok((&bytes[start_pos..next_pos], next_pos))
}

fn decode_list(bytes: &[u8], pos: usize, depth: usize) -> ParseResult<(Bencode, usize)> {
    let mut values = Vec::new();

    let mut curr_pos = pos;
    let mut curr_byte = peek_byte(bytes, curr_pos)?;

    while curr_byte != crate::BEN_END {
        let (value, next_pos) = decode(bytes, curr_pos, depth + 1)?;

        values.push(value);

        curr_pos = next_pos;
        curr_byte = peek_byte(bytes, curr_pos)?;
    }

    Ok((Bencode::List(values), curr_pos + 1))
}

fn decode_dict(bytes: &[u8], pos: usize, depth: usize) -> ParseResult<(Bencode, usize)> {
    let mut dict = Dict::new();

    let mut curr_pos = pos;
    let mut curr_byte = peek_byte(bytes, curr_pos)?;

    while curr_byte != crate::BEN_END {
        let (key_bytes, next_pos) = decode_bytes(bytes, curr_pos)?;

        // Keys must arrive in strict lexicographic byte order; a repeated key
        // is a duplicate, an earlier key is a sort violation.
        match dict.last_key() {
            Some(last_key) if key_bytes == last_key => {
                return Err(ParseError::KeyDuplicate { pos: curr_pos });
            }
            Some(last_key) if key_bytes < last_key => {
                return Err(ParseError::KeyOrdering { pos: curr_pos });
            }
            _ => (),
        }
        curr_pos = next_pos;

        let (value, next_pos) = decode(bytes, curr_pos, depth + 1)?;
        dict.push_sorted(key_bytes.to_vec(), value);

        curr_pos = next_pos;
        curr_byte = peek_byte(bytes, curr_pos)?;
    }

    Ok((Bencode::Dict(dict), curr_pos + 1))
}

fn peek_byte(bytes: &[u8], pos: usize) -> ParseResult<u8> {
    bytes.get(pos).copied().ok_or(ParseError::UnexpectedEnd { pos })
}

/// Returns the byte range covering the single bencode value that starts at
/// `pos`, without building the value.
///
/// Parsing a torrent file needs the verbatim slice of the `info` value so the
/// infohash can be computed over the exact wire bytes instead of a re-encoding.
///
/// # Errors
///
/// Will return a [`ParseError`] if no well-formed value starts at `pos`.
pub fn value_span(bytes: &[u8], pos: usize) -> ParseResult<Range<usize>> {
    let end = skip_value(bytes, pos, 0)?;
    Ok(pos..end)
}

/// Returns the byte range of the value stored under `key` in the top-level
/// dictionary, or `None` when the key is absent.
///
/// This is the torrent-file entry point: the span of the `info` value is the
/// exact input to the infohash SHA-1.
///
/// # Errors
///
/// Will return a [`ParseError`] if `bytes` does not start with a well-formed
/// dictionary.
pub fn dict_entry_span(bytes: &[u8], key: &[u8]) -> ParseResult<Option<Range<usize>>> {
    if peek_byte(bytes, 0)? != crate::DICT_START {
        return Err(ParseError::InvalidByte { pos: 0 });
    }

    let mut curr_pos = 1;
    while peek_byte(bytes, curr_pos)? != crate::BEN_END {
        let (entry_key, next_pos) = decode_bytes(bytes, curr_pos)?;
        let value_span = value_span(bytes, next_pos)?;

        if entry_key == key {
            return Ok(Some(value_span));
        }

        curr_pos = value_span.end;
    }

    Ok(None)
}

fn skip_value(bytes: &[u8], pos: usize, depth: usize) -> ParseResult<usize> {
    if depth >= crate::MAX_RECURSION {
        return Err(ParseError::RecursionExceeded { pos });
    }

    match peek_byte(bytes, pos)? {
        crate::INT_START => Ok(decode_int(bytes, pos + 1, crate::BEN_END)?.1),
        crate::LIST_START | crate::DICT_START => {
            let is_dict = bytes[pos] == crate::DICT_START;
            let mut curr_pos = pos + 1;
            while peek_byte(bytes, curr_pos)? != crate::BEN_END {
                if is_dict {
                    curr_pos = decode_bytes(bytes, curr_pos)?.1;
                }
                curr_pos = skip_value(bytes, curr_pos, depth + 1)?;
            }
            Ok(curr_pos + 1)
        }
        crate::BYTE_LEN_LOW..=crate::BYTE_LEN_HIGH => Ok(decode_bytes(bytes, pos)?.1),
        _ => Err(ParseError::InvalidByte { pos }),
    }
}
