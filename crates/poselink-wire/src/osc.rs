//! OSC 1.0 message framing
//!
//! Message = Address + Type Tags + Arguments, every part padded to 4 bytes.
//! Only the argument types PoseLink peers exchange are supported.

use bytes::{BufMut, BytesMut};

use poselink_core::{PoseLinkError, PoseLinkResult};

/// Maximum encoded message size (MTU-friendly)
pub const MAX_PACKET_SIZE: usize = 1400;

/// OSC argument
#[derive(Clone, Debug, PartialEq)]
pub enum OscArg {
    /// `s` - NUL-terminated string
    String(String),
    /// `i` - big-endian int32
    Int(i32),
    /// `f` - big-endian float32
    Float(f32),
}

impl OscArg {
    fn type_tag(&self) -> u8 {
        match self {
            OscArg::String(_) => b's',
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
        }
    }
}

/// Single OSC message
#[derive(Clone, Debug, PartialEq)]
pub struct OscMessage {
    /// Address pattern, e.g. `/VRnotrame/transform`
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Create a message without arguments
    pub fn new(address: impl Into<String>) -> Self {
        OscMessage {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Create a message carrying one string argument
    pub fn with_string(address: impl Into<String>, value: impl Into<String>) -> Self {
        OscMessage {
            address: address.into(),
            args: vec![OscArg::String(value.into())],
        }
    }

    pub fn push(mut self, arg: OscArg) -> Self {
        self.args.push(arg);
        self
    }

    /// First string argument, if any
    pub fn first_string(&self) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            OscArg::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Serialize to datagram bytes
    pub fn encode(&self) -> PoseLinkResult<Vec<u8>> {
        if !self.address.starts_with('/') {
            return Err(PoseLinkError::InvalidOsc(format!(
                "address must start with '/': {:?}",
                self.address
            )));
        }

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        put_padded_str(&mut buf, &self.address)?;

        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(|a| a.type_tag() as char));
        put_padded_str(&mut buf, &tags)?;

        for arg in &self.args {
            match arg {
                OscArg::String(s) => put_padded_str(&mut buf, s)?,
                OscArg::Int(v) => buf.put_i32(*v),
                OscArg::Float(v) => buf.put_f32(*v),
            }
        }

        if buf.len() > MAX_PACKET_SIZE {
            return Err(PoseLinkError::InvalidOsc(format!(
                "message too large: {} > {}",
                buf.len(),
                MAX_PACKET_SIZE
            )));
        }

        Ok(buf.to_vec())
    }

    /// Parse a datagram
    pub fn parse(buf: &[u8]) -> PoseLinkResult<Self> {
        if buf.len() < 4 || buf.len() % 4 != 0 {
            return Err(PoseLinkError::InvalidOsc(format!(
                "length {} is not a positive multiple of 4",
                buf.len()
            )));
        }

        let (address, mut offset) = read_padded_str(buf, 0)?;
        if !address.starts_with('/') {
            return Err(PoseLinkError::InvalidOsc(format!(
                "address must start with '/': {:?}",
                address
            )));
        }

        // Messages without a type tag string carry no arguments
        if offset == buf.len() {
            return Ok(OscMessage::new(address));
        }

        let (tags, next) = read_padded_str(buf, offset)?;
        offset = next;
        let tags = tags
            .strip_prefix(',')
            .ok_or_else(|| PoseLinkError::InvalidOsc("type tags must start with ','".into()))?;

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.bytes() {
            let arg = match tag {
                b's' => {
                    let (s, next) = read_padded_str(buf, offset)?;
                    offset = next;
                    OscArg::String(s)
                }
                b'i' => {
                    let word = read_word(buf, offset)?;
                    offset += 4;
                    OscArg::Int(i32::from_be_bytes(word))
                }
                b'f' => {
                    let word = read_word(buf, offset)?;
                    offset += 4;
                    OscArg::Float(f32::from_be_bytes(word))
                }
                other => {
                    return Err(PoseLinkError::InvalidOsc(format!(
                        "unsupported type tag '{}'",
                        other as char
                    )))
                }
            };
            args.push(arg);
        }

        Ok(OscMessage { address, args })
    }

    fn encoded_len(&self) -> usize {
        let args: usize = self
            .args
            .iter()
            .map(|a| match a {
                OscArg::String(s) => padded_len(s.len()),
                _ => 4,
            })
            .sum();
        padded_len(self.address.len()) + padded_len(self.args.len() + 1) + args
    }
}

/// Size of a string plus its NUL terminator, rounded up to 4
fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

fn put_padded_str(buf: &mut BytesMut, s: &str) -> PoseLinkResult<()> {
    if s.as_bytes().contains(&0) {
        return Err(PoseLinkError::InvalidOsc("string contains NUL".into()));
    }
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, padded_len(s.len()) - s.len());
    Ok(())
}

fn read_padded_str(buf: &[u8], offset: usize) -> PoseLinkResult<(String, usize)> {
    let rest = buf.get(offset..).unwrap_or_default();
    let nul = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| PoseLinkError::InvalidOsc("unterminated string".into()))?;

    let s = std::str::from_utf8(&rest[..nul])
        .map_err(|e| PoseLinkError::InvalidOsc(e.to_string()))?
        .to_string();

    let next = offset + padded_len(nul);
    if next > buf.len() {
        return Err(PoseLinkError::BufferTooShort {
            expected: next,
            actual: buf.len(),
        });
    }
    Ok((s, next))
}

fn read_word(buf: &[u8], offset: usize) -> PoseLinkResult<[u8; 4]> {
    buf.get(offset..offset + 4)
        .and_then(|w| w.try_into().ok())
        .ok_or(PoseLinkError::BufferTooShort {
            expected: offset + 4,
            actual: buf.len(),
        })
}
