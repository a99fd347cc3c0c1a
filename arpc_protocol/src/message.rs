use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use strum_macros::{Display, EnumIter, EnumString};

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::collections::hash_map::HashMap;
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Error, ErrorKind, Result};

const MAGIC_NUMBER: u8 = 0x08;

/// metadata key carrying the error text of a failed call.
pub const SERVICE_ERROR: &str = "__arpc_error__";

/// frames above this size are refused before the body is read.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString, Primitive)]
pub enum MessageType {
    Request = 0,
    Response = 1,
}

// the `Error` variant clashes with the `TryFrom::Error` the Primitive derive emits.
#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString)]
pub enum MessageStatusType {
    Normal = 0,
    Error = 1,
}

impl FromPrimitive for MessageStatusType {
    fn from_i64(n: i64) -> Option<Self> {
        u64::try_from(n).ok().and_then(Self::from_u64)
    }

    fn from_u64(n: u64) -> Option<Self> {
        match n {
            0 => Some(MessageStatusType::Normal),
            1 => Some(MessageStatusType::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString, Primitive)]
pub enum CompressType {
    CompressNone = 0,
    Gzip = 1,
}

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString, Primitive)]
pub enum SerializeType {
    SerializeNone = 0,
    JSON = 1,
    ProtoBuffer = 2,
    MsgPack = 3,
    Thrift = 4,
}

/// define the arpc message interface.
pub trait RpcMessage {
    fn check_magic_number(&self) -> bool;
    fn get_version(&self) -> u8;
    fn set_version(&mut self, v: u8);
    fn get_message_type(&self) -> Option<MessageType>;
    fn set_message_type(&mut self, mt: MessageType);
    fn is_heartbeat(&self) -> bool;
    fn set_heartbeat(&mut self, b: bool);
    fn is_oneway(&self) -> bool;
    fn set_oneway(&mut self, b: bool);
    fn get_compress_type(&self) -> Option<CompressType>;
    fn set_compress_type(&mut self, ct: CompressType);
    fn get_message_status_type(&self) -> Option<MessageStatusType>;
    fn set_message_status_type(&mut self, mst: MessageStatusType);
    fn get_serialize_type(&self) -> Option<SerializeType>;
    fn set_serialize_type(&mut self, st: SerializeType);
    fn get_seq(&self) -> u64;
    fn set_seq(&mut self, seq: u64);
    fn get_error(&self) -> Option<String>;
}

pub type Metadata = HashMap<String, String>;

/// a commmon struct for request and response.
#[derive(Debug, Default, Clone)]
pub struct Message {
    header: [u8; 12],
    pub service_path: String,
    pub service_method: String,
    pub metadata: Metadata,
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates a new `Message` with the magic number in place.
    pub fn new() -> Message {
        let mut msg: Message = Default::default();
        msg.header[0] = MAGIC_NUMBER;
        msg
    }

    /// Creates a `Message` from a header that was read off the wire.
    pub fn with_header(h: [u8; 12]) -> Message {
        Message {
            header: h,
            ..Default::default()
        }
    }

    /// Creates the response skeleton for a request: same seq, names and codec.
    pub fn new_response(req: &Message) -> Message {
        let mut res = Message::new();
        res.set_version(req.get_version());
        res.set_message_type(MessageType::Response);
        res.header[3] = req.header[3];
        res.set_compress_type(req.get_compress_type().unwrap_or(CompressType::CompressNone));
        res.set_heartbeat(req.is_heartbeat());
        res.set_seq(req.get_seq());
        res.service_path = req.service_path.clone();
        res.service_method = req.service_method.clone();
        res
    }

    pub fn set_error(&mut self, err: &str) {
        self.set_message_status_type(MessageStatusType::Error);
        self.metadata
            .insert(SERVICE_ERROR.to_owned(), err.to_owned());
    }

    /// Serializes the message into one frame, compressing the payload if asked to.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self.get_compress_type() {
            Some(CompressType::Gzip) => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&self.payload)?;
                encoder.finish()?
            }
            Some(CompressType::CompressNone) => self.payload.clone(),
            None => return Err(Error::new(ErrorKind::Protocol, "unknown compress type")),
        };

        let mut meta = BytesMut::new();
        for (k, v) in &self.metadata {
            put_chunk(&mut meta, k.as_bytes());
            put_chunk(&mut meta, v.as_bytes());
        }

        let total_len = 4
            + self.service_path.len()
            + 4
            + self.service_method.len()
            + 4
            + meta.len()
            + 4
            + payload.len();
        if total_len > MAX_MESSAGE_SIZE {
            return Err(Error::new(
                ErrorKind::Protocol,
                format!("message of {} bytes exceeds the frame limit", total_len),
            ));
        }

        let mut buf = BytesMut::with_capacity(12 + 4 + total_len);
        buf.put_slice(&self.header);
        buf.put_u32(total_len as u32);
        put_chunk(&mut buf, self.service_path.as_bytes());
        put_chunk(&mut buf, self.service_method.as_bytes());
        put_chunk(&mut buf, &meta);
        put_chunk(&mut buf, &payload);

        Ok(buf.to_vec())
    }

    /// Reads exactly one frame from `r`.
    pub async fn decode<R>(&mut self, r: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        r.read_exact(&mut self.header).await?;
        if !self.check_magic_number() {
            return Err(Error::new(
                ErrorKind::Protocol,
                format!("wrong magic number: {:#04x}", self.header[0]),
            ));
        }

        let len = r.read_u32().await? as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::new(
                ErrorKind::Protocol,
                format!("message of {} bytes exceeds the frame limit", len),
            ));
        }
        // grows with the bytes that actually arrive, not with the claimed length.
        let mut buf = Vec::new();
        (&mut *r).take(len as u64).read_to_end(&mut buf).await?;
        if buf.len() < len {
            return Err(Error::new(
                ErrorKind::IO,
                format!("frame truncated: got {} of {} bytes", buf.len(), len),
            ));
        }

        self.parse(&buf)
    }

    /// Parses the body that follows the header and the total length.
    pub fn parse(&mut self, buf: &[u8]) -> Result<()> {
        let mut start = 0;
        self.service_path = read_str(read_chunk(buf, &mut start)?)?;
        self.service_method = read_str(read_chunk(buf, &mut start)?)?;

        let metadata_bytes = read_chunk(buf, &mut start)?;
        let mut meta_start = 0;
        while meta_start < metadata_bytes.len() {
            let key = read_str(read_chunk(metadata_bytes, &mut meta_start)?)?;
            let value = read_str(read_chunk(metadata_bytes, &mut meta_start)?)?;
            self.metadata.insert(key, value);
        }

        let payload = read_chunk(buf, &mut start)?;
        self.payload = match self.get_compress_type() {
            Some(CompressType::Gzip) => {
                let mut data = Vec::new();
                GzDecoder::new(payload).read_to_end(&mut data)?;
                data
            }
            Some(CompressType::CompressNone) => payload.to_vec(),
            None => return Err(Error::new(ErrorKind::Protocol, "unknown compress type")),
        };

        Ok(())
    }
}

impl RpcMessage for Message {
    fn check_magic_number(&self) -> bool {
        self.header[0] == MAGIC_NUMBER
    }

    fn get_version(&self) -> u8 {
        self.header[1]
    }
    fn set_version(&mut self, v: u8) {
        self.header[1] = v;
    }

    fn get_message_type(&self) -> Option<MessageType> {
        MessageType::from_u8((self.header[2] & 0x80) >> 7)
    }
    fn set_message_type(&mut self, mt: MessageType) {
        self.header[2] = (self.header[2] & !0x80) | ((mt as u8) << 7);
    }
    fn is_heartbeat(&self) -> bool {
        self.header[2] & 0x40 == 0x40
    }
    fn set_heartbeat(&mut self, b: bool) {
        if b {
            self.header[2] |= 0x40;
        } else {
            self.header[2] &= !0x40;
        }
    }
    fn is_oneway(&self) -> bool {
        self.header[2] & 0x20 == 0x20
    }
    fn set_oneway(&mut self, b: bool) {
        if b {
            self.header[2] |= 0x20;
        } else {
            self.header[2] &= !0x20;
        }
    }
    fn get_compress_type(&self) -> Option<CompressType> {
        CompressType::from_u8((self.header[2] & 0x1C) >> 2)
    }
    fn set_compress_type(&mut self, ct: CompressType) {
        self.header[2] = (self.header[2] & !0x1C) | (((ct as u8) << 2) & 0x1C);
    }
    fn get_message_status_type(&self) -> Option<MessageStatusType> {
        MessageStatusType::from_u8(self.header[2] & 0x03)
    }
    fn set_message_status_type(&mut self, mst: MessageStatusType) {
        self.header[2] = (self.header[2] & !0x03) | ((mst as u8) & 0x03);
    }
    fn get_serialize_type(&self) -> Option<SerializeType> {
        SerializeType::from_u8((self.header[3] & 0xF0) >> 4)
    }
    fn set_serialize_type(&mut self, st: SerializeType) {
        self.header[3] = (self.header[3] & !0xF0) | ((st as u8) << 4)
    }
    fn get_seq(&self) -> u64 {
        BigEndian::read_u64(&self.header[4..])
    }
    fn set_seq(&mut self, seq: u64) {
        BigEndian::write_u64(&mut self.header[4..], seq);
    }
    fn get_error(&self) -> Option<String> {
        match self.get_message_status_type() {
            Some(MessageStatusType::Error) => Some(
                self.metadata
                    .get(SERVICE_ERROR)
                    .cloned()
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}

fn put_chunk(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

fn read_chunk<'a>(buf: &'a [u8], start: &mut usize) -> Result<&'a [u8]> {
    let truncated = || Error::new(ErrorKind::Protocol, "truncated message body");

    let len_end = start.checked_add(4).filter(|end| *end <= buf.len());
    let len_end = len_end.ok_or_else(truncated)?;
    let len = BigEndian::read_u32(&buf[*start..len_end]) as usize;
    let end = len_end
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(truncated)?;

    *start = end;
    Ok(&buf[len_end..end])
}

fn read_str(buf: &[u8]) -> Result<String> {
    Ok(String::from_utf8(buf.to_vec())?)
}
