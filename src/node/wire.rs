//! Framed request/response messages for remote nodes
//!
//! A frame is a 4-byte big-endian body length followed by the body. Bodies
//! are binrw structs starting with the `RSN1` magic. One request and one
//! response travel over each connection.

use super::{NodeError, Result};
use binrw::{binrw, BinRead, BinWrite};
use std::io::{Cursor, Read, Write};

#[binrw]
#[brw(repr = u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Write = 0,
    Read = 1,
    Shutdown = 2,
}

#[binrw]
#[brw(repr = u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    NotFound = 1,
    Error = 2,
}

#[binrw]
#[brw(big, magic = b"RSN1")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub action: Action,
    #[br(temp)]
    #[bw(try_calc = u32::try_from(key.len()))]
    key_len: u32,
    #[br(count = key_len)]
    pub key: Vec<u8>,
    #[br(temp)]
    #[bw(try_calc = u32::try_from(value.len()))]
    value_len: u32,
    #[br(count = value_len)]
    pub value: Vec<u8>,
}

impl Request {
    pub fn put(key: &str, value: &[u8]) -> Self {
        Self {
            action: Action::Write,
            key: key.as_bytes().to_vec(),
            value: value.to_vec(),
        }
    }

    pub fn get(key: &str) -> Self {
        Self {
            action: Action::Read,
            key: key.as_bytes().to_vec(),
            value: Vec::new(),
        }
    }

    pub fn shutdown() -> Self {
        Self {
            action: Action::Shutdown,
            key: Vec::new(),
            value: Vec::new(),
        }
    }

    /// Key as UTF-8
    pub fn key_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.key).map_err(|_| NodeError::InvalidKey {
            key: String::from_utf8_lossy(&self.key).into_owned(),
        })
    }
}

#[binrw]
#[brw(big, magic = b"RSN1")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    #[br(temp)]
    #[bw(try_calc = u32::try_from(payload.len()))]
    payload_len: u32,
    #[br(count = payload_len)]
    pub payload: Vec<u8>,
}

impl Response {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: Vec::new(),
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            status: Status::Error,
            payload: message.to_string().into_bytes(),
        }
    }

    /// Payload of an error response as text
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Write one length-prefixed frame
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len()).map_err(|_| NodeError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;
    writer
        .write_all(&len.to_be_bytes())
        .and_then(|_| writer.write_all(body))
        .and_then(|_| writer.flush())
        .map_err(NodeError::Wire)
}

/// Read one length-prefixed frame, refusing bodies above `max_len`
pub fn read_frame<R: Read>(reader: &mut R, max_len: usize) -> Result<Vec<u8>> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).map_err(NodeError::Wire)?;

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(NodeError::FrameTooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).map_err(NodeError::Wire)?;
    Ok(body)
}

/// Encode `message` and send it as one frame
pub fn send<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: Write,
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut body = Cursor::new(Vec::new());
    message.write_be(&mut body)?;
    write_frame(writer, body.get_ref())
}

/// Receive one frame and decode it
pub fn receive<R, T>(reader: &mut R, max_len: usize) -> Result<T>
where
    R: Read,
    T: for<'a> BinRead<Args<'a> = ()>,
{
    let body = read_frame(reader, max_len)?;
    Ok(T::read_be(&mut Cursor::new(body))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let mut buffer = Vec::new();
        send(&mut buffer, &Request::put("k1", &[9, 8])).unwrap();

        assert_eq!(
            buffer,
            vec![
                0, 0, 0, 17, // frame length
                b'R', b'S', b'N', b'1', // magic
                0,    // write
                0, 0, 0, 2, b'k', b'1', // key
                0, 0, 0, 2, 9, 8, // value
            ]
        );
    }

    #[test]
    fn test_request_roundtrip() {
        let request = Request::get("object");
        let mut buffer = Vec::new();
        send(&mut buffer, &request).unwrap();

        let decoded: Request = receive(&mut buffer.as_slice(), 1024).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.key_str().unwrap(), "object");
    }

    #[test]
    fn test_response_with_payload_multiple_of_buffer() {
        let response = Response::ok(vec![0xAB; 8192]);
        let mut buffer = Vec::new();
        send(&mut buffer, &response).unwrap();

        let decoded: Response = receive(&mut buffer.as_slice(), 1 << 20).unwrap();
        assert_eq!(decoded.status, Status::Ok);
        assert_eq!(decoded.payload.len(), 8192);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut buffer = Vec::new();
        send(&mut buffer, &Response::ok(vec![0; 100])).unwrap();

        assert!(matches!(
            receive::<_, Response>(&mut buffer.as_slice(), 16),
            Err(NodeError::FrameTooLarge { max: 16, .. })
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"XXXX\0\0\0\0\0").unwrap();

        assert!(matches!(
            receive::<_, Response>(&mut buffer.as_slice(), 1024),
            Err(NodeError::Codec(_))
        ));
    }

    #[test]
    fn test_truncated_frame() {
        let bytes = [0u8, 0, 0, 10, 1, 2];
        assert!(matches!(
            read_frame(&mut &bytes[..], 1024),
            Err(NodeError::Wire(_))
        ));
    }
}
