//! Mux frame codec.
//!
//! Frame format:
//! ```text
//! +---------+-------+-----------------+----------------------+
//! | Version |  Cmd  |  Length (2B BE) |  Stream ID (4B BE)   |
//! +---------+-------+-----------------+----------------------+
//! |                      Payload                             |
//! +----------------------------------------------------------+
//! ```

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub const FRAME_VERSION: u8 = 1;
pub const FRAME_HEADER_SIZE: usize = 8;
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cmd {
    /// Open a stream.
    Syn = 0,
    /// Close a stream.
    Fin = 1,
    /// Stream data.
    Psh = 2,
    /// Keepalive, ignored.
    Nop = 3,
}

impl TryFrom<u8> for Cmd {
    type Error = io::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cmd::Syn),
            1 => Ok(Cmd::Fin),
            2 => Ok(Cmd::Psh),
            3 => Ok(Cmd::Nop),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown mux command {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub cmd: Cmd,
    pub stream_id: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn syn(stream_id: u32) -> Self {
        Self::control(Cmd::Syn, stream_id)
    }

    pub fn fin(stream_id: u32) -> Self {
        Self::control(Cmd::Fin, stream_id)
    }

    pub fn psh(stream_id: u32, payload: Bytes) -> Self {
        Self {
            cmd: Cmd::Psh,
            stream_id,
            payload,
        }
    }

    fn control(cmd: Cmd, stream_id: u32) -> Self {
        Self {
            cmd,
            stream_id,
            payload: Bytes::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MuxCodec;

impl Decoder for MuxCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        if src[0] != FRAME_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported mux version {}", src[0]),
            ));
        }
        let cmd = Cmd::try_from(src[1])?;
        let len = u16::from_be_bytes([src[2], src[3]]) as usize;
        if src.len() < FRAME_HEADER_SIZE + len {
            src.reserve(FRAME_HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let stream_id = src.get_u32();
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame {
            cmd,
            stream_id,
            payload,
        }))
    }
}

impl Encoder<Frame> for MuxCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), io::Error> {
        if frame.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "mux payload too large",
            ));
        }
        dst.reserve(FRAME_HEADER_SIZE + frame.payload.len());
        dst.put_u8(FRAME_VERSION);
        dst.put_u8(frame.cmd as u8);
        dst.put_u16(frame.payload.len() as u16);
        dst.put_u32(frame.stream_id);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let mut buf = BytesMut::new();
        MuxCodec
            .encode(Frame::psh(0x0102_0304, Bytes::from_static(b"hi")), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[1, 2, 0, 2, 1, 2, 3, 4, b'h', b'i']);
    }

    #[test]
    fn decode_waits_for_full_frame() {
        let mut buf = BytesMut::new();
        MuxCodec
            .encode(Frame::psh(7, Bytes::from_static(b"payload")), &mut buf)
            .unwrap();
        let mut partial = buf.split_to(10);

        assert!(MuxCodec.decode(&mut partial).unwrap().is_none());
        partial.unsplit(buf);
        let frame = MuxCodec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(frame.stream_id, 7);
        assert_eq!(&frame.payload[..], b"payload");
        assert!(partial.is_empty());
    }

    #[test]
    fn back_to_back_frames() {
        let mut buf = BytesMut::new();
        MuxCodec.encode(Frame::syn(3), &mut buf).unwrap();
        MuxCodec.encode(Frame::fin(3), &mut buf).unwrap();

        assert_eq!(MuxCodec.decode(&mut buf).unwrap().unwrap().cmd, Cmd::Syn);
        assert_eq!(MuxCodec.decode(&mut buf).unwrap().unwrap().cmd, Cmd::Fin);
        assert!(MuxCodec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn rejects_unknown_version_and_command() {
        let mut bad_version = BytesMut::from(&[9u8, 0, 0, 0, 0, 0, 0, 1][..]);
        assert!(MuxCodec.decode(&mut bad_version).is_err());

        let mut bad_cmd = BytesMut::from(&[1u8, 42, 0, 0, 0, 0, 0, 1][..]);
        assert!(MuxCodec.decode(&mut bad_cmd).is_err());
    }
}
