// Transfer request/response messages built from codec frames
//
// Every connection starts with an opcode string followed by the request body:
//
//   upload   -> String filename, Int64 size, Bool is_new_file
//               <- Int64 resume offset, then `size - offset` raw bytes ->
//   download -> String filename
//               <- Bool exists [, Int64 size]
//               -> Int64 resume offset, then `size - offset` raw bytes <-
//   ping     -> nothing further; the server closes the connection

use std::io::{Read, Write};
use crate::common::error::{Error, Result};
use crate::common::types::Opcode;
use super::codec::{Frame, FrameRead, FrameWrite};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub filename: String,
    pub declared_size: u64,
    /// Truncate any existing destination before appending.
    pub is_new_file: bool,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, declared_size: u64, is_new_file: bool) -> Self {
        Self {
            filename: filename.into(),
            declared_size,
            is_new_file,
        }
    }

    /// Frames sent ahead of the content, opcode included.
    pub fn frames(&self) -> Result<Vec<Frame>> {
        let size = i64::try_from(self.declared_size).map_err(|_| {
            Error::Protocol(format!("size {} does not fit in Int64", self.declared_size))
        })?;
        Ok(vec![
            Frame::String(Opcode::Upload.as_str().to_string()),
            Frame::String(self.filename.clone()),
            Frame::Int64(size),
            Frame::Bool(self.is_new_file),
        ])
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for frame in self.frames()? {
            frame.write_to(writer)?;
        }
        Ok(())
    }

    /// Read the body that follows an `upload` opcode.
    pub fn read_body<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let filename = reader.read_string()?;
        let declared_size = reader.read_size()?;
        let is_new_file = reader.read_bool()?;
        Ok(Self {
            filename,
            declared_size,
            is_new_file,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub filename: String,
}

impl DownloadRequest {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_string(Opcode::Download.as_str())?;
        writer.write_string(&self.filename)?;
        Ok(())
    }

    pub fn read_body<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            filename: reader.read_string()?,
        })
    }
}

/// A decoded request, as seen by the server dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Upload(UploadRequest),
    Download(DownloadRequest),
    Ping,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Upload(_) => Opcode::Upload,
            Request::Download(_) => Opcode::Download,
            Request::Ping => Opcode::Ping,
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        match self {
            Request::Upload(req) => req.write_to(writer),
            Request::Download(req) => req.write_to(writer),
            Request::Ping => writer.write_string(Opcode::Ping.as_str()),
        }
    }

    /// Read the opcode and, for transfer opcodes, the request body.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let opcode = reader.read_string()?;
        match Opcode::parse(&opcode) {
            Some(Opcode::Upload) => Ok(Request::Upload(UploadRequest::read_body(reader)?)),
            Some(Opcode::Download) => Ok(Request::Download(DownloadRequest::read_body(reader)?)),
            Some(Opcode::Ping) => Ok(Request::Ping),
            None => Err(Error::UnknownOpcode(opcode)),
        }
    }
}

/// Server's answer to a download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadReply {
    Missing,
    Present { size: u64 },
}

impl DownloadReply {
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        match self {
            DownloadReply::Missing => writer.write_bool(false),
            DownloadReply::Present { size } => {
                writer.write_bool(true)?;
                writer.write_size(*size)
            }
        }
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        if reader.read_bool()? {
            Ok(DownloadReply::Present {
                size: reader.read_size()?,
            })
        } else {
            Ok(DownloadReply::Missing)
        }
    }

    /// Bytes this reply occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            DownloadReply::Missing => 1,
            DownloadReply::Present { .. } => 1 + 8,
        }
    }
}

/// Byte count already present on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResumeOffset(pub u64);

impl ResumeOffset {
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_size(self.0)
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(ResumeOffset(reader.read_size()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_upload_request_layout() {
        let req = UploadRequest::new("a.bin", 20000, true);
        let mut buf = Vec::new();
        req.write_to(&mut buf).unwrap();

        let expected_len: usize = req.frames().unwrap().iter().map(Frame::encoded_len).sum();
        assert_eq!(buf.len(), expected_len);
        assert_eq!(&buf[..10], b"\0\0\0\x06upload");
        assert_eq!(&buf[10..19], b"\0\0\0\x05a.bin");
        assert_eq!(&buf[19..27], &20000i64.to_be_bytes());
        assert_eq!(buf[27], 1);

        let decoded = Request::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, Request::Upload(req));
    }

    #[test]
    fn test_upload_size_beyond_int64_rejected() {
        let req = UploadRequest::new("huge.bin", u64::MAX, false);
        assert!(matches!(req.frames(), Err(Error::Protocol(_))));

        let mut buf = Vec::new();
        assert!(req.write_to(&mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_download_request_decodes() {
        let mut buf = Vec::new();
        DownloadRequest::new("notes.txt").write_to(&mut buf).unwrap();

        let decoded = Request::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.opcode(), Opcode::Download);
        assert_eq!(decoded, Request::Download(DownloadRequest::new("notes.txt")));
    }

    #[test]
    fn test_ping_has_no_body() {
        let mut buf = Vec::new();
        Request::Ping.write_to(&mut buf).unwrap();
        assert_eq!(buf, b"\0\0\0\x04ping");
        assert_eq!(Request::read_from(&mut Cursor::new(buf)).unwrap(), Request::Ping);
    }

    #[test]
    fn test_unknown_opcode() {
        let mut buf = Vec::new();
        buf.write_string("delete").unwrap();
        let err = Request::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::UnknownOpcode(op) if op == "delete"));
    }

    #[test]
    fn test_download_reply_missing_is_single_bool() {
        let mut buf = Vec::new();
        DownloadReply::Missing.write_to(&mut buf).unwrap();
        assert_eq!(buf, vec![0]);
        assert_eq!(buf.len(), DownloadReply::Missing.encoded_len());
        assert_eq!(
            DownloadReply::read_from(&mut Cursor::new(buf)).unwrap(),
            DownloadReply::Missing
        );
    }

    #[test]
    fn test_download_reply_present() {
        let reply = DownloadReply::Present { size: 8192 };
        let mut buf = Vec::new();
        reply.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), reply.encoded_len());
        assert_eq!(DownloadReply::read_from(&mut Cursor::new(buf)).unwrap(), reply);
    }

    #[test]
    fn test_truncated_upload_body() {
        let mut buf = Vec::new();
        buf.write_string("upload").unwrap();
        buf.write_string("a.bin").unwrap();
        buf.extend_from_slice(&[0, 0, 0]);
        let err = Request::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
