//! The get-info byte-buffer convention.
//!
//! Every object kind answers info queries the same way: a raw `u32` key is
//! decoded into the object's key enum, the answer is produced as an
//! [`InfoValue`], and [`write_info`] copies its encoding into the caller's
//! buffer (or only reports the size when no buffer is given).

use crate::core::error::{FilterError, FilterResult};
use crate::core::types::{ImageDescriptor, RawImageDescriptor};

/// One answer to an info query, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    U32(u32),
    U64(u64),
    /// Encoded as a `u32` 0 or 1
    Bool(bool),
    /// Encoded as UTF-8 followed by a NUL byte
    Text(String),
    Descriptor(RawImageDescriptor),
    /// Already-encoded bytes
    Bytes(Vec<u8>),
}

impl InfoValue {
    /// Encoded bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            InfoValue::U32(v) => v.to_ne_bytes().to_vec(),
            InfoValue::U64(v) => v.to_ne_bytes().to_vec(),
            InfoValue::Bool(v) => u32::from(*v).to_ne_bytes().to_vec(),
            InfoValue::Text(s) => {
                let mut bytes = Vec::with_capacity(s.len() + 1);
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
                bytes
            }
            InfoValue::Descriptor(desc) => bytemuck::bytes_of(desc).to_vec(),
            InfoValue::Bytes(bytes) => bytes.clone(),
        }
    }

    /// Size of the encoding in bytes.
    pub fn encoded_size(&self) -> usize {
        match self {
            InfoValue::U32(_) | InfoValue::Bool(_) => 4,
            InfoValue::U64(_) => 8,
            InfoValue::Text(s) => s.len() + 1,
            InfoValue::Descriptor(_) => std::mem::size_of::<RawImageDescriptor>(),
            InfoValue::Bytes(bytes) => bytes.len(),
        }
    }
}

/// Copy the encoding of `value` into `buffer`.
///
/// Returns the encoded size whether or not a buffer is given. A buffer
/// shorter than the encoding is rejected and left untouched.
pub fn write_info(value: &InfoValue, buffer: Option<&mut [u8]>) -> FilterResult<usize> {
    let size = value.encoded_size();
    if let Some(buffer) = buffer {
        if buffer.len() < size {
            return Err(FilterError::BufferTooSmall {
                required: size,
                provided: buffer.len(),
            });
        }
        buffer[..size].copy_from_slice(&value.encode());
    }
    Ok(size)
}

fn exact<const N: usize>(bytes: &[u8]) -> FilterResult<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(FilterError::BufferTooSmall {
            required: N,
            provided: bytes.len(),
        })
}

/// Decode a `u32` answer.
pub fn decode_u32(bytes: &[u8]) -> FilterResult<u32> {
    Ok(u32::from_ne_bytes(exact::<4>(bytes)?))
}

/// Decode a `u64` answer.
pub fn decode_u64(bytes: &[u8]) -> FilterResult<u64> {
    Ok(u64::from_ne_bytes(exact::<8>(bytes)?))
}

/// Decode a NUL-terminated string answer.
pub fn decode_string(bytes: &[u8]) -> FilterResult<String> {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|e| FilterError::Internal(format!("info string is not UTF-8: {}", e)))
}

/// Decode an image descriptor answer.
pub fn decode_descriptor(bytes: &[u8]) -> FilterResult<ImageDescriptor> {
    let size = std::mem::size_of::<RawImageDescriptor>();
    if bytes.len() < size {
        return Err(FilterError::BufferTooSmall {
            required: size,
            provided: bytes.len(),
        });
    }
    let raw: RawImageDescriptor = bytemuck::pod_read_unaligned(&bytes[..size]);
    ImageDescriptor::from_raw(&raw)
}

macro_rules! info_keys {
    ($(#[$meta:meta])* $name:ident, $object:literal { $($variant:ident = $code:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum $name {
            $($variant = $code,)+
        }

        impl $name {
            /// Numeric key.
            pub fn code(self) -> u32 {
                self as u32
            }
        }

        impl TryFrom<u32> for $name {
            type Error = FilterError;

            fn try_from(key: u32) -> FilterResult<Self> {
                match key {
                    $($code => Ok($name::$variant),)+
                    _ => Err(FilterError::UnknownInfoKey { object: $object, key }),
                }
            }
        }
    };
}

info_keys!(
    /// Context info keys.
    ContextInfo, "context" {
        KernelsSourceDir = 0x1,
        KernelsCacheDir = 0x2,
    }
);

info_keys!(
    /// Device info keys.
    DeviceInfo, "device" {
        Name = 0x1,
        Vendor = 0x2,
        MemorySize = 0x3,
    }
);

info_keys!(
    /// Image info keys.
    ImageInfo, "image" {
        Descriptor = 0x301,
        DataSizeBytes = 0x302,
    }
);

info_keys!(
    /// Filter info keys.
    FilterInfo, "filter" {
        Type = 0x0,
        ParameterCount = 0x1,
        Description = 0x2,
        Joinable = 0x3,
    }
);

info_keys!(
    /// Per-parameter info keys, queried by parameter index.
    ParameterInfo, "parameter" {
        Name = 0x1202,
        Type = 0x1203,
        Description = 0x1204,
        Value = 0x1205,
    }
);
