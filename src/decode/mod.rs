//! Channel decoding at the retrieval boundary.
//!
//! A member's postfix (`aia_0171.npy`) selects the decoder through its
//! extension. Decoded channels of one sample are stacked into a
//! [`SampleTensor`].

mod array;
mod npy;

pub use array::{ArrayData, ChannelArray, SampleTensor};
pub use npy::{decode_npy, encode_npy, NpyHeader, NPY_MAGIC};

use crate::util::{Error, Result};

/// Payload formats a channel member may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelFormat {
    /// NumPy array file.
    Npy,
}

impl ChannelFormat {
    /// Format named by the postfix extension.
    pub fn from_postfix(postfix: &str) -> Result<Self> {
        match postfix.rsplit_once('.') {
            Some((_, "npy")) => Ok(Self::Npy),
            _ => Err(Error::UnsupportedFormat(postfix.to_string())),
        }
    }

    /// File extension, without the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Npy => "npy",
        }
    }

    /// Decode a payload of this format.
    pub fn decode(self, bytes: &[u8], name: &str) -> Result<ChannelArray> {
        match self {
            Self::Npy => decode_npy(bytes, name),
        }
    }
}

/// Turns raw member bytes into a channel array.
pub trait ChannelDecoder: Send + Sync {
    /// Decode the member with the given postfix.
    fn decode(&self, postfix: &str, bytes: &[u8]) -> Result<ChannelArray>;
}

/// Default decoder: picks the [`ChannelFormat`] from the postfix extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtensionDecoder;

impl ChannelDecoder for ExtensionDecoder {
    fn decode(&self, postfix: &str, bytes: &[u8]) -> Result<ChannelArray> {
        ChannelFormat::from_postfix(postfix)?.decode(bytes, postfix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_postfix() {
        assert_eq!(ChannelFormat::from_postfix("aia_0171.npy").unwrap(), ChannelFormat::Npy);
        assert_eq!(ChannelFormat::Npy.extension(), "npy");
        let err = ChannelFormat::from_postfix("aia_0171.fits").unwrap_err();
        assert_eq!(err.to_string(), "Unknown data type for file: aia_0171.fits");
        assert!(ChannelFormat::from_postfix("npy").is_err());
    }

    #[test]
    fn test_extension_decoder() {
        let array = ChannelArray::from_vec((1, 2), vec![3u16, 4]).unwrap();
        let decoder: &dyn ChannelDecoder = &ExtensionDecoder;
        assert_eq!(decoder.decode("hmi_m.npy", &encode_npy(&array)).unwrap(), array);
        assert!(matches!(decoder.decode("hmi_m.png", &[]), Err(Error::UnsupportedFormat(_))));
    }
}
