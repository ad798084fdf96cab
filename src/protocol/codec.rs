// Frame codec: fixed-width big-endian primitives over a byte stream
//
// Wire encodings:
//   Bool   1 byte, 0 = false, anything else = true
//   Int32  4 bytes, big-endian
//   Int64  8 bytes, big-endian
//   String Int32 byte length, then that many UTF-8 bytes, no terminator

use std::io::{Read, Write};
use crate::common::error::{Error, Result};
use crate::common::types::MAX_STRING_LEN;

/// A single encoded value on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    String(String),
}

impl Frame {
    /// Number of bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Frame::Bool(_) => 1,
            Frame::Int32(_) => 4,
            Frame::Int64(_) => 8,
            Frame::String(s) => 4 + s.len(),
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        match self {
            Frame::Bool(v) => writer.write_bool(*v),
            Frame::Int32(v) => writer.write_i32_frame(*v),
            Frame::Int64(v) => writer.write_i64_frame(*v),
            Frame::String(s) => writer.write_string(s),
        }
    }
}

/// Frame encoding for any byte sink.
pub trait FrameWrite: Write {
    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_all(&[value as u8])?;
        Ok(())
    }

    fn write_i32_frame(&mut self, value: i32) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i64_frame(&mut self, value: i64) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Write a size or offset as an Int64 frame.
    fn write_size(&mut self, value: u64) -> Result<()> {
        let value = i64::try_from(value)
            .map_err(|_| Error::Protocol(format!("size {} does not fit in Int64", value)))?;
        self.write_i64_frame(value)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > MAX_STRING_LEN {
            return Err(Error::Protocol(format!(
                "string of {} bytes exceeds limit of {}",
                bytes.len(),
                MAX_STRING_LEN
            )));
        }
        self.write_i32_frame(bytes.len() as i32)?;
        self.write_all(bytes)?;
        Ok(())
    }
}

impl<W: Write + ?Sized> FrameWrite for W {}

/// Frame decoding for any byte source. Every read consumes exactly the bytes
/// of one frame; a stream that ends early fails with `ConnectionClosed`.
pub trait FrameRead: Read {
    fn read_frame_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_exact(buf).map_err(Error::from_read)
    }

    fn read_bool(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        self.read_frame_bytes(&mut buf)?;
        Ok(buf[0] != 0)
    }

    fn read_i32_frame(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_frame_bytes(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_i64_frame(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_frame_bytes(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Read an Int64 frame that must hold a size or offset.
    fn read_size(&mut self) -> Result<u64> {
        let value = self.read_i64_frame()?;
        u64::try_from(value).map_err(|_| Error::Protocol(format!("negative size {}", value)))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32_frame()?;
        let len = usize::try_from(len)
            .map_err(|_| Error::Protocol(format!("negative string length {}", len)))?;
        if len > MAX_STRING_LEN {
            return Err(Error::Protocol(format!(
                "string length {} exceeds limit of {}",
                len, MAX_STRING_LEN
            )));
        }

        let mut bytes = vec![0u8; len];
        self.read_frame_bytes(&mut bytes)?;
        String::from_utf8(bytes).map_err(|e| Error::Protocol(format!("invalid UTF-8 string: {}", e)))
    }
}

impl<R: Read + ?Sized> FrameRead for R {}
