//! NumPy `.npy` channel files.
//!
//! ```text
//! \x93NUMPY <major> <minor> <header_len: u16 LE (v1) | u32 LE (v2, v3)>
//! {'descr': '<f4', 'fortran_order': False, 'shape': (512, 512), }   (space padded, '\n' terminated)
//! <raw elements, C order>
//! ```

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::array::{ArrayData, ChannelArray};
use crate::util::{ElementType, Error, Result, Shape};

/// File magic.
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header (magic + version + length + dict) is padded to this alignment.
const HEADER_ALIGN: usize = 64;

/// Parsed `.npy` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NpyHeader {
    pub version: (u8, u8),
    pub element_type: ElementType,
    /// Stored elements are big-endian.
    pub big_endian: bool,
    pub fortran_order: bool,
    pub shape: Shape,
    /// Offset of the first data byte.
    pub data_offset: usize,
}

impl NpyHeader {
    /// Parse the preamble and header dict. `name` is used in error messages.
    pub fn parse(bytes: &[u8], name: &str) -> Result<Self> {
        let bad = |reason: String| Error::invalid_channel(name, reason);

        if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
            return Err(bad("missing NUMPY magic".into()));
        }
        let version = (bytes[6], bytes[7]);
        let (header_len, header_start) = match version.0 {
            1 => (LittleEndian::read_u16(&bytes[8..10]) as usize, 10),
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err(bad("truncated preamble".into()));
                }
                (LittleEndian::read_u32(&bytes[8..12]) as usize, 12)
            }
            major => return Err(bad(format!("unsupported npy version {major}.{}", version.1))),
        };
        let data_offset = header_start + header_len;
        if data_offset > bytes.len() {
            return Err(bad(format!("header length {header_len} runs past end of file")));
        }
        let dict = std::str::from_utf8(&bytes[header_start..data_offset])?;

        let descr = dict_value(dict, "descr")
            .and_then(quoted)
            .ok_or_else(|| bad("header has no 'descr'".into()))?;
        let (big_endian, element_type) = parse_descr(descr).ok_or_else(|| Error::TypeMismatch {
            expected: "numeric dtype (u1..u8, i1..i8, f2, f4, f8)".into(),
            actual: descr.to_string(),
        })?;

        let fortran_order = match dict_value(dict, "fortran_order") {
            Some(v) if v.starts_with("True") => true,
            Some(v) if v.starts_with("False") => false,
            _ => return Err(bad("header has no 'fortran_order'".into())),
        };

        let shape = dict_value(dict, "shape")
            .and_then(parse_shape)
            .ok_or_else(|| bad("header has no valid 'shape'".into()))?;

        Ok(Self {
            version,
            element_type,
            big_endian,
            fortran_order,
            shape,
            data_offset,
        })
    }
}

/// Text following `'key':` in a header dict.
fn dict_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let single = format!("'{key}'");
    let double = format!("\"{key}\"");
    let (at, len) = dict
        .find(&single)
        .map(|i| (i, single.len()))
        .or_else(|| dict.find(&double).map(|i| (i, double.len())))?;
    let rest = dict[at + len..].trim_start();
    rest.strip_prefix(':').map(str::trim_start)
}

/// Contents of a leading quoted string.
fn quoted(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &text[1..];
    body.find(quote).map(|end| &body[..end])
}

/// `'<f4'` -> (big endian, type). `|` and `=` mean native order.
fn parse_descr(descr: &str) -> Option<(bool, ElementType)> {
    let (order, code) = match descr.chars().next()? {
        c @ ('<' | '>' | '|' | '=') => (c, &descr[1..]),
        _ => ('=', descr),
    };
    let big = match order {
        '>' => true,
        '<' => false,
        _ => cfg!(target_endian = "big"),
    };
    ElementType::from_type_code(code).map(|ty| (big, ty))
}

/// `(512, 512)` or `(3,)` or `()`.
fn parse_shape(text: &str) -> Option<Shape> {
    let body = text.strip_prefix('(')?;
    let body = &body[..body.find(')')?];
    let mut dims = Vec::new();
    for part in body.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        // numpy on some platforms writes `512L`
        dims.push(part.trim_end_matches('L').parse().ok()?);
    }
    Some(Shape::from(dims))
}

/// Decode an `.npy` payload into a channel array.
///
/// Only C-order arrays are accepted; Fortran order is rejected.
pub fn decode_npy(bytes: &[u8], name: &str) -> Result<ChannelArray> {
    let header = NpyHeader::parse(bytes, name)?;
    if header.fortran_order {
        return Err(Error::invalid_channel(name, "fortran_order arrays are not supported"));
    }

    let payload = &bytes[header.data_offset..];
    let expected = header
        .shape
        .checked_num_elements()
        .and_then(|n| n.checked_mul(header.element_type.num_bytes()))
        .ok_or_else(|| Error::invalid_channel(name, format!("shape {} is too large", header.shape)))?;
    if payload.len() != expected {
        return Err(Error::invalid_channel(
            name,
            format!(
                "shape {} of {} needs {} data bytes, found {}",
                header.shape,
                header.element_type,
                expected,
                payload.len()
            ),
        ));
    }

    let swap = header.big_endian != cfg!(target_endian = "big");
    let data = ArrayData::from_bytes(header.element_type, payload, swap)?;
    ChannelArray::new(header.shape, data)
}

/// Encode a channel array as a version 1.0 `.npy` file in native byte order.
pub fn encode_npy(array: &ChannelArray) -> Vec<u8> {
    let ty = array.element_type();
    let order = if ty.num_bytes() == 1 {
        '|'
    } else if cfg!(target_endian = "big") {
        '>'
    } else {
        '<'
    };

    let dims = array.shape().sizes();
    let shape = match dims {
        [one] => format!("({one},)"),
        _ => format!("({})", dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")),
    };
    let mut dict = format!(
        "{{'descr': '{order}{}', 'fortran_order': False, 'shape': {shape}, }}",
        ty.type_code()
    );
    // pad so the data starts on an aligned offset, newline last
    let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    dict.extend(std::iter::repeat(' ').take(padding));
    dict.push('\n');

    let data = array.data().as_bytes();
    let mut out = Vec::with_capacity(unpadded + padding + data.len());
    // writes into a Vec cannot fail
    let _ = write_npy(&mut out, &dict, data);
    out
}

fn write_npy(out: &mut Vec<u8>, dict: &str, data: &[u8]) -> std::io::Result<()> {
    out.write_all(NPY_MAGIC)?;
    out.write_u8(1)?;
    out.write_u8(0)?;
    out.write_u16::<LittleEndian>(dict.len() as u16)?;
    out.write_all(dict.as_bytes())?;
    out.write_all(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built file as numpy 1.x writes it for `np.arange(6, dtype='>i2').reshape(2, 3)`.
    fn big_endian_i16() -> Vec<u8> {
        let mut dict = "{'descr': '>i2', 'fortran_order': False, 'shape': (2, 3), }".to_string();
        while (10 + dict.len() + 1) % 64 != 0 {
            dict.push(' ');
        }
        dict.push('\n');
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        bytes.extend_from_slice(dict.as_bytes());
        for v in 0i16..6 {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_big_endian() {
        let array = decode_npy(&big_endian_i16(), "x.npy").unwrap();
        assert_eq!(array.shape().sizes(), &[2, 3]);
        assert_eq!(array.as_slice::<i16>(), Some(&[0i16, 1, 2, 3, 4, 5][..]));
    }

    #[test]
    fn test_encode_decode() {
        let array = ChannelArray::from_vec((4, 2), (0..8).map(|v| v as f32 * 0.5).collect()).unwrap();
        let bytes = encode_npy(&array);
        let header = NpyHeader::parse(&bytes, "x.npy").unwrap();
        assert_eq!(header.data_offset % 64, 0);
        assert_eq!(header.version, (1, 0));
        assert_eq!(decode_npy(&bytes, "x.npy").unwrap(), array);
    }

    #[test]
    fn test_header_variants() {
        assert_eq!(parse_shape("(3,)"), Some(Shape::from(vec![3])));
        assert_eq!(parse_shape("()"), Some(Shape::scalar()));
        assert_eq!(parse_shape("(512L, 512L)"), Some(Shape::image(512, 512)));
        assert_eq!(parse_descr("|u1"), Some((cfg!(target_endian = "big"), ElementType::Uint8)));
        assert_eq!(parse_descr(">f8"), Some((true, ElementType::Float64)));
        assert_eq!(parse_descr("<c8"), None);
        assert_eq!(dict_value("{\"descr\": '<f4'}", "descr"), Some("'<f4'}"));
    }

    #[test]
    fn test_rejects() {
        assert!(matches!(decode_npy(b"not an npy file", "x.npy"), Err(Error::InvalidChannel { .. })));

        let fortran = String::from_utf8(big_endian_i16()[10..].to_vec())
            .unwrap()
            .replace("False", "True ");
        let mut bytes = big_endian_i16()[..10].to_vec();
        bytes.extend_from_slice(fortran.as_bytes());
        assert!(matches!(decode_npy(&bytes, "x.npy"), Err(Error::InvalidChannel { .. })));

        let mut truncated = big_endian_i16();
        truncated.pop();
        assert!(matches!(decode_npy(&truncated, "x.npy"), Err(Error::InvalidChannel { .. })));

        let complex = big_endian_i16().iter().map(|&b| if b == b'i' { b'c' } else { b }).collect::<Vec<_>>();
        assert!(matches!(decode_npy(&complex, "x.npy"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_overflowing_shape() {
        let dict = "{'descr': '<f4', 'fortran_order': False, 'shape': (4294967296, 4294967296, 16), }\n";
        let mut bytes = Vec::new();
        write_npy(&mut bytes, dict, &[0u8; 64]).unwrap();
        match decode_npy(&bytes, "hmi_m.npy") {
            Err(Error::InvalidChannel { name, .. }) => assert_eq!(name, "hmi_m.npy"),
            other => panic!("expected invalid channel, got {other:?}"),
        }
    }
}
