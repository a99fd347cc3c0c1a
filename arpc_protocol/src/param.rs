use std::fmt::Debug;

use bytes::BytesMut;
use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, ErrorKind, Result, SerializeType};

/// Arguments and replies of an arpc call.
///
/// `#[derive(RpcParam)]` from `arpc_derive` implements this for serde types.
pub trait RpcParam: Debug {
    fn into_bytes(&self, st: SerializeType) -> Result<Vec<u8>>;
    fn from_slice(&mut self, st: SerializeType, data: &[u8]) -> Result<()>;
}

/// Raw bytes pass through untouched whatever the serialize type says.
impl RpcParam for BytesMut {
    fn into_bytes(&self, _: SerializeType) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
    fn from_slice(&mut self, _: SerializeType, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

pub fn serde_into_bytes<T>(param: &T, st: SerializeType) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    match st {
        SerializeType::JSON => serde_json::to_vec(param).map_err(Error::from),
        SerializeType::MsgPack => rmp_serde::to_vec_named(param)
            .map_err(|err| Error::new(ErrorKind::Serialization, err)),
        _ => Err(unsupported(st)),
    }
}

pub fn serde_from_slice<T>(st: SerializeType, data: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    match st {
        SerializeType::JSON => serde_json::from_slice(data).map_err(Error::from),
        SerializeType::MsgPack => {
            rmp_serde::from_slice(data).map_err(|err| Error::new(ErrorKind::Serialization, err))
        }
        _ => Err(unsupported(st)),
    }
}

fn unsupported(st: SerializeType) -> Error {
    Error::new(
        ErrorKind::Serialization,
        format!("unsupported serialize type: {}", st),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pair {
        #[serde(rename = "A")]
        a: i64,
        #[serde(rename = "B")]
        b: i64,
    }

    #[test]
    fn json_uses_field_names() {
        let data = serde_into_bytes(&Pair { a: 9, b: 4 }, SerializeType::JSON).unwrap();
        assert_eq!(r#"{"A":9,"B":4}"#, std::str::from_utf8(&data).unwrap());
    }

    #[test]
    fn msgpack_reads_back() {
        let data = serde_into_bytes(&Pair { a: -3, b: 7 }, SerializeType::MsgPack).unwrap();
        let pair: Pair = serde_from_slice(SerializeType::MsgPack, &data).unwrap();
        assert_eq!(Pair { a: -3, b: 7 }, pair);
    }

    #[test]
    fn protobuf_is_not_a_serde_format() {
        let err = serde_into_bytes(&Pair { a: 1, b: 2 }, SerializeType::ProtoBuffer).unwrap_err();
        assert_eq!(ErrorKind::Serialization, err.kind());
    }

    #[test]
    fn raw_bytes_pass_through() {
        let raw = BytesMut::from(&b"{\"A\":1}"[..]);
        assert_eq!(b"{\"A\":1}".to_vec(), raw.into_bytes(SerializeType::JSON).unwrap());

        let mut reply = BytesMut::new();
        reply.from_slice(SerializeType::ProtoBuffer, b"\x08\x24").unwrap();
        assert_eq!(&b"\x08\x24"[..], &reply[..]);
    }
}
