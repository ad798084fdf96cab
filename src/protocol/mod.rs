// Protocol module - frame codec and message definitions

pub mod codec;
pub mod messages;

pub use codec::{Frame, FrameRead, FrameWrite};
pub use messages::{DownloadReply, DownloadRequest, Request, ResumeOffset, UploadRequest};
