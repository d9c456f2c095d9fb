//! Encoder and decoder for registry frames.

use crate::error::ProtocolError;
use crate::message::{Opcode, Request, Response, ResponseShape};
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, BytesMut};
use std::net::Ipv4Addr;

/// Encodes requests and responses into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into a frame.
    pub fn encode_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        let opcode = request.opcode();
        let mut buf = BytesMut::with_capacity(1 + opcode.request_body_len());
        buf.put_u8(opcode as u8);

        match request {
            Request::Socket { ip, port } => {
                buf.put_u32(u32::from(*ip));
                buf.put_u16(*port);
            }
            Request::Connect { handle, ip, port } | Request::Bind { handle, ip, port } => {
                buf.put_u32(*handle);
                buf.put_u32(u32::from(*ip));
                buf.put_u16(*port);
            }
            Request::Listen { handle } | Request::Accept { handle } | Request::Close { handle } => {
                buf.put_u32(*handle);
            }
            Request::Send { handle, payload } => {
                if payload.len() > MAX_PAYLOAD_SIZE {
                    return Err(ProtocolError::PayloadTooLarge {
                        size: payload.len(),
                        max: MAX_PAYLOAD_SIZE,
                    });
                }
                buf.reserve(payload.len());
                buf.put_u32(*handle);
                buf.put_u16(payload.len() as u16);
                buf.put_slice(payload);
            }
            Request::Recv { handle, len } => {
                buf.put_u32(*handle);
                buf.put_u16(*len);
            }
        }

        Ok(buf)
    }

    /// Encodes a response into a frame.
    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(response.shape().encoded_len());

        match response {
            Response::Handle(handle) => buf.put_u32(*handle),
            Response::Status(status) => buf.put_u16(*status),
            Response::Accepted { handle, ip, port } => {
                buf.put_u32(*handle);
                buf.put_u32(u32::from(*ip));
                buf.put_u16(*port);
            }
            Response::Data { status, payload } => {
                if payload.len() > MAX_PAYLOAD_SIZE {
                    return Err(ProtocolError::PayloadTooLarge {
                        size: payload.len(),
                        max: MAX_PAYLOAD_SIZE,
                    });
                }
                buf.put_u16(*status);
                buf.put_slice(payload);
            }
        }

        Ok(buf)
    }
}

/// Incremental frame decoder.
///
/// Bytes read from the transport are appended with [`Decoder::extend`];
/// each `decode_*` call returns `Ok(None)` until a whole frame is buffered.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next request from the buffer.
    ///
    /// An unknown opcode is reported as soon as its byte arrives.
    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        let Some(&first) = self.buffer.first() else {
            return Ok(None);
        };
        let opcode = Opcode::try_from(first)?;

        let header_len = 1 + opcode.request_body_len();
        if self.buffer.len() < header_len {
            return Ok(None);
        }

        if opcode == Opcode::Send {
            let payload_len = u16::from_be_bytes([self.buffer[5], self.buffer[6]]) as usize;
            if self.buffer.len() < header_len + payload_len {
                return Ok(None);
            }
        }

        // Whole frame is buffered; consume it.
        self.buffer.advance(1);
        let buf = &mut self.buffer;

        let request = match opcode {
            Opcode::Socket => {
                let ip = Ipv4Addr::from(buf.get_u32());
                let port = buf.get_u16();
                Request::Socket { ip, port }
            }
            Opcode::Connect => {
                let handle = buf.get_u32();
                let ip = Ipv4Addr::from(buf.get_u32());
                let port = buf.get_u16();
                Request::Connect { handle, ip, port }
            }
            Opcode::Bind => {
                let handle = buf.get_u32();
                let ip = Ipv4Addr::from(buf.get_u32());
                let port = buf.get_u16();
                Request::Bind { handle, ip, port }
            }
            Opcode::Listen => Request::Listen {
                handle: buf.get_u32(),
            },
            Opcode::Accept => Request::Accept {
                handle: buf.get_u32(),
            },
            Opcode::Send => {
                let handle = buf.get_u32();
                let len = buf.get_u16() as usize;
                let payload = buf.split_to(len).freeze();
                Request::Send { handle, payload }
            }
            Opcode::Recv => {
                let handle = buf.get_u32();
                let len = buf.get_u16();
                Request::Recv { handle, len }
            }
            Opcode::Close => Request::Close {
                handle: buf.get_u32(),
            },
        };

        Ok(Some(request))
    }

    /// Attempts to decode the next response of the given shape.
    pub fn decode_response(
        &mut self,
        shape: ResponseShape,
    ) -> Result<Option<Response>, ProtocolError> {
        if self.buffer.len() < shape.encoded_len() {
            return Ok(None);
        }

        let buf = &mut self.buffer;
        let response = match shape {
            ResponseShape::Handle => Response::Handle(buf.get_u32()),
            ResponseShape::Status => Response::Status(buf.get_u16()),
            ResponseShape::Accepted => {
                let handle = buf.get_u32();
                let ip = Ipv4Addr::from(buf.get_u32());
                let port = buf.get_u16();
                Response::Accepted { handle, ip, port }
            }
            ResponseShape::Data(len) => {
                let status = buf.get_u16();
                let payload = buf.split_to(len as usize).freeze();
                Response::Data { status, payload }
            }
        };

        Ok(Some(response))
    }

    /// Checks that no partial frame is left behind once the stream has ended.
    pub fn finish(&self) -> Result<(), ProtocolError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Truncated {
                buffered: self.buffer.len(),
            })
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    #[test]
    fn test_socket_request_layout() {
        let request = Request::Socket {
            ip: Ipv4Addr::new(192, 168, 3, 51),
            port: 501,
        };
        let encoded = Encoder::encode_request(&request).unwrap();
        assert_eq!(&encoded[..], &[0x00, 192, 168, 3, 51, 0x01, 0xF5]);
    }

    #[test]
    fn test_connect_request_layout() {
        let request = Request::Connect {
            handle: 0x0102_0304,
            ip: Ipv4Addr::new(10, 0, 0, 1),
            port: 0xABCD,
        };
        let encoded = Encoder::encode_request(&request).unwrap();
        assert_eq!(
            &encoded[..],
            &[0x01, 0x01, 0x02, 0x03, 0x04, 10, 0, 0, 1, 0xAB, 0xCD]
        );
    }

    #[test]
    fn test_send_request_layout() {
        let request = Request::Send {
            handle: 1,
            payload: Bytes::from_static(b"ping"),
        };
        let encoded = Encoder::encode_request(&request).unwrap();
        assert_eq!(
            &encoded[..],
            &[0x05, 0, 0, 0, 1, 0x00, 0x04, b'p', b'i', b'n', b'g']
        );
    }

    #[test]
    fn test_response_layouts() {
        let encoded = Encoder::encode_response(&Response::Handle(258)).unwrap();
        assert_eq!(&encoded[..], &[0, 0, 1, 2]);

        let encoded = Encoder::encode_response(&Response::Status(0)).unwrap();
        assert_eq!(&encoded[..], &[0, 0]);

        let encoded = Encoder::encode_response(&Response::Accepted {
            handle: 1,
            ip: Ipv4Addr::new(192, 168, 3, 56),
            port: 501,
        })
        .unwrap();
        assert_eq!(&encoded[..], &[0, 0, 0, 1, 192, 168, 3, 56, 0x01, 0xF5]);

        let encoded =
            Encoder::encode_response(&Response::data(Bytes::from_static(b"bye."))).unwrap();
        assert_eq!(&encoded[..], &[0, 0, b'b', b'y', b'e', b'.']);
    }

    #[test]
    fn test_decode_request_roundtrip() {
        let request = Request::Bind {
            handle: 9,
            ip: Ipv4Addr::UNSPECIFIED,
            port: 501,
        };
        let encoded = Encoder::encode_request(&request).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);
        assert_eq!(decoder.decode_request().unwrap(), Some(request));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_send_frame() {
        let request = Request::Send {
            handle: 4,
            payload: Bytes::from_static(b"hello, world!"),
        };
        let encoded = Encoder::encode_request(&request).unwrap();

        let mut decoder = Decoder::new();

        // Header only
        decoder.extend(&encoded[..7]);
        assert!(decoder.decode_request().unwrap().is_none());
        assert_eq!(decoder.buffered(), 7);

        // Rest of the payload
        decoder.extend(&encoded[7..]);
        assert_eq!(decoder.decode_request().unwrap(), Some(request));
    }

    #[test]
    fn test_multiple_requests_in_buffer() {
        let first = Request::Accept { handle: 0 };
        let second = Request::Recv { handle: 1, len: 64 };

        let mut decoder = Decoder::new();
        decoder.extend(&Encoder::encode_request(&first).unwrap());
        decoder.extend(&Encoder::encode_request(&second).unwrap());

        assert_eq!(decoder.decode_request().unwrap(), Some(first));
        assert_eq!(decoder.decode_request().unwrap(), Some(second));
        assert!(decoder.decode_request().unwrap().is_none());
    }

    #[test]
    fn test_unknown_opcode() {
        let mut decoder = Decoder::new();
        decoder.extend(&[0x08, 0, 0, 0, 0]);
        assert!(matches!(
            decoder.decode_request(),
            Err(ProtocolError::UnknownOpcode(0x08))
        ));
    }

    #[test]
    fn test_finish_reports_truncation() {
        let mut decoder = Decoder::new();
        assert!(decoder.finish().is_ok());

        decoder.extend(&[Opcode::Connect as u8, 0, 0]);
        assert!(decoder.decode_request().unwrap().is_none());
        assert!(matches!(
            decoder.finish(),
            Err(ProtocolError::Truncated { buffered: 3 })
        ));
    }

    #[test]
    fn test_decode_data_response_waits_for_payload() {
        let mut decoder = Decoder::new();
        decoder.extend(&[0, 0, b'b', b'y']);
        assert!(decoder
            .decode_response(ResponseShape::Data(4))
            .unwrap()
            .is_none());

        decoder.extend(b"e.");
        let response = decoder
            .decode_response(ResponseShape::Data(4))
            .unwrap()
            .unwrap();
        assert_eq!(response, Response::data(Bytes::from_static(b"bye.")));
    }

    #[test]
    fn test_send_payload_too_large() {
        let request = Request::Send {
            handle: 0,
            payload: Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE + 1]),
        };
        assert!(matches!(
            Encoder::encode_request(&request),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_decoder_default() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.buffered(), 0);

        decoder.extend(b"\x03\x00");
        assert_eq!(decoder.buffered(), 2);

        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }

    proptest! {
        #[test]
        fn prop_decoder_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut decoder = Decoder::new();
            decoder.extend(&data);
            // Either a request, a need-more-data, or an opcode error.
            while let Ok(Some(_)) = decoder.decode_request() {}
        }
    }
}
