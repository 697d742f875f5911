//! JSON message codec for the shard RPC service.
//!
//! Messages are plain serde types; each gRPC frame carries one JSON document.

use bytes::{Buf, BufMut};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// Encodes `E` and decodes `D`. Clients use `JsonCodec<Request, Response>`, servers the reverse.
#[derive(Debug)]
pub struct JsonCodec<E, D> {
    _marker: PhantomData<fn(E) -> D>,
}

impl<E, D> Default for JsonCodec<E, D> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E, D> Codec for JsonCodec<E, D>
where
    E: Serialize + Send + 'static,
    D: DeserializeOwned + Send + 'static,
{
    type Encode = E;
    type Decode = D;
    type Encoder = JsonEncoder<E>;
    type Decoder = JsonDecoder<D>;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder(PhantomData)
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(PhantomData)
    }
}

#[derive(Debug)]
pub struct JsonEncoder<E>(PhantomData<fn(E)>);

impl<E: Serialize> Encoder for JsonEncoder<E> {
    type Item = E;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, buf: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        let bytes = serde_json::to_vec(&item)
            .map_err(|e| Status::internal(format!("Failed to encode message: {}", e)))?;
        buf.put_slice(&bytes);
        Ok(())
    }
}

#[derive(Debug)]
pub struct JsonDecoder<D>(PhantomData<fn() -> D>);

impl<D: DeserializeOwned> Decoder for JsonDecoder<D> {
    type Item = D;
    type Error = Status;

    fn decode(&mut self, buf: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let bytes = buf.copy_to_bytes(buf.remaining());
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Status::internal(format!("Failed to decode message: {}", e)))
    }
}
