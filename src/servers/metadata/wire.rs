//! Framing of the `BitTorrent` peer protocol, reduced to what a metadata
//! leech needs.
//!
//! Three layers are spoken on one TCP stream:
//!
//! 1. the fixed 68-byte handshake ([`Handshake`]);
//! 2. length-prefixed messages (4-byte big-endian length, 1-byte message
//!    id). Only message id 20 (the extension protocol, BEP 10) is consumed;
//!    a zero-length frame is a keep-alive;
//! 3. `ut_metadata` extension messages (BEP 9): a bencoded header followed,
//!    for `data` messages, by the raw piece bytes ([`MetadataMessage`]).
use bencode::{ben_int, ben_map, Bencode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use torrust_dht_crawler_primitives::info_hash::InfoHash;

use crate::servers::metadata::error::Error;

/// The protocol string of the handshake.
pub const PROTOCOL_ID: &[u8; 19] = b"BitTorrent protocol";

/// Total size of the handshake on the wire.
pub const HANDSHAKE_LEN: usize = 68;

/// Reserved byte 5, bit 0x10: the peer speaks the extension protocol.
const EXTENSION_PROTOCOL_BIT: u8 = 0x10;

/// The message id of extension-protocol messages.
pub const EXTENDED_MESSAGE_ID: u8 = 20;

/// The extension id of the extension handshake itself.
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

/// The extension id this client advertises for `ut_metadata`.
pub const LOCAL_UT_METADATA_ID: u8 = 1;

/// Frames larger than this cannot be part of a metadata exchange and abort
/// the leech.
pub const MAX_FRAME_SIZE: usize = 128 * 1024;

/// The fixed-size `BitTorrent` handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: InfoHash,
    pub peer_id: [u8; 20],
    pub supports_extension_protocol: bool,
}

impl Handshake {
    /// A handshake as this client sends it: extension protocol advertised.
    #[must_use]
    pub fn new(info_hash: InfoHash, peer_id: [u8; 20]) -> Handshake {
        Handshake {
            info_hash,
            peer_id,
            supports_extension_protocol: true,
        }
    }

    /// Serialises to the 68-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; HANDSHAKE_LEN] {
        let mut bytes = [0u8; HANDSHAKE_LEN];

        bytes[0] = 19;
        bytes[1..20].copy_from_slice(PROTOCOL_ID);
        if self.supports_extension_protocol {
            bytes[25] |= EXTENSION_PROTOCOL_BIT;
        }
        bytes[28..48].copy_from_slice(&self.info_hash.bytes());
        bytes[48..68].copy_from_slice(&self.peer_id);

        bytes
    }

    /// Parses the 68-byte wire form.
    ///
    /// # Errors
    ///
    /// Will return [`Error::BadHandshake`] if the protocol string is wrong.
    pub fn decode(bytes: &[u8; HANDSHAKE_LEN]) -> Result<Handshake, Error> {
        if bytes[0] != 19 || &bytes[1..20] != PROTOCOL_ID {
            return Err(Error::BadHandshake);
        }

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&bytes[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&bytes[48..68]);

        Ok(Handshake {
            info_hash: InfoHash(info_hash),
            peer_id,
            supports_extension_protocol: bytes[25] & EXTENSION_PROTOCOL_BIT != 0,
        })
    }
}

/// Reads the peer's handshake.
///
/// # Errors
///
/// Will return an [`enum@Error`] on connection loss or a malformed handshake.
pub async fn read_handshake<S>(stream: &mut S) -> Result<Handshake, Error>
where
    S: AsyncRead + Unpin,
{
    let mut bytes = [0u8; HANDSHAKE_LEN];
    stream.read_exact(&mut bytes).await.map_err(map_eof)?;

    Handshake::decode(&bytes)
}

/// Reads one length-prefixed message. A keep-alive comes back as an empty
/// payload.
///
/// # Errors
///
/// Will return an [`enum@Error`] on connection loss or an oversized frame.
pub async fn read_frame<S>(stream: &mut S) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    let len = stream.read_u32().await.map_err(map_eof)? as usize;

    if len == 0 {
        return Ok(Vec::new());
    }
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge { len });
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(map_eof)?;

    Ok(payload)
}

fn map_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        Error::Io(e)
    }
}

/// Writes one extension-protocol message.
///
/// # Errors
///
/// Will return an [`enum@Error`] on connection loss.
pub async fn write_extended<S>(stream: &mut S, extension_id: u8, payload: &[u8]) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len() + 2).expect("extension payloads are bounded far below u32::MAX");

    stream.write_u32(len).await?;
    stream.write_u8(EXTENDED_MESSAGE_ID).await?;
    stream.write_u8(extension_id).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;

    Ok(())
}

/// The extension handshake payload this client sends:
/// `d1:md11:ut_metadatai1eee`.
#[must_use]
pub fn extension_handshake() -> Vec<u8> {
    (ben_map! {
        "m" => ben_map! { "ut_metadata" => ben_int!(i64::from(LOCAL_UT_METADATA_ID)) }
    })
    .encode()
}

/// The fields of a peer's extension handshake the leech cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionHandshake {
    /// The peer's message id for `ut_metadata`, when supported.
    pub ut_metadata: Option<u8>,
    /// The declared total metadata size.
    pub metadata_size: Option<i64>,
}

impl ExtensionHandshake {
    /// Parses an extension handshake payload.
    ///
    /// # Errors
    ///
    /// Will return an [`enum@Error`] if the payload is not a bencoded
    /// dictionary.
    pub fn parse(payload: &[u8]) -> Result<ExtensionHandshake, Error> {
        let value = Bencode::decode(payload)?;
        let dict = value.as_dict().ok_or(Error::UtMetadataUnsupported)?;

        let ut_metadata = dict
            .lookup(b"m")
            .and_then(Bencode::as_dict)
            .and_then(|m| m.lookup(b"ut_metadata"))
            .and_then(Bencode::as_int)
            .and_then(|id| u8::try_from(id).ok());

        let metadata_size = dict.lookup(b"metadata_size").and_then(Bencode::as_int);

        Ok(ExtensionHandshake { ut_metadata, metadata_size })
    }
}

/// One `ut_metadata` message (BEP 9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataMessage {
    Request { piece: i64 },
    Data { piece: i64, total_size: Option<i64>, payload: Vec<u8> },
    Reject { piece: i64 },
}

impl MetadataMessage {
    /// The encoded payload of a `request` for `piece`.
    #[must_use]
    pub fn request(piece: i64) -> Vec<u8> {
        (ben_map! {
            "msg_type" => ben_int!(0),
            "piece" => ben_int!(piece)
        })
        .encode()
    }

    /// Parses a `ut_metadata` payload: a bencoded header, followed by raw
    /// piece bytes for `data` messages.
    ///
    /// # Errors
    ///
    /// Will return an [`enum@Error`] if the header does not decode or names
    /// an unknown `msg_type`.
    pub fn parse(payload: &[u8]) -> Result<MetadataMessage, Error> {
        let (header, consumed) = Bencode::decode_prefix(payload)?;
        let header = header.as_dict().ok_or(Error::UtMetadataUnsupported)?;

        let msg_type = header.lookup(b"msg_type").and_then(Bencode::as_int);
        let piece = header.lookup(b"piece").and_then(Bencode::as_int).unwrap_or(-1);

        match msg_type {
            Some(0) => Ok(MetadataMessage::Request { piece }),
            Some(1) => Ok(MetadataMessage::Data {
                piece,
                total_size: header.lookup(b"total_size").and_then(Bencode::as_int),
                payload: payload[consumed..].to_vec(),
            }),
            Some(2) => Ok(MetadataMessage::Reject { piece }),
            _ => Err(Error::UnexpectedPiece { piece }),
        }
    }
}

#[cfg(test)]
mod tests {
    use torrust_dht_crawler_primitives::info_hash::InfoHash;

    use super::{extension_handshake, ExtensionHandshake, Handshake, MetadataMessage};
    use crate::servers::metadata::error::Error;

    #[test]
    fn the_handshake_round_trips_through_its_wire_form() {
        let handshake = Handshake::new(InfoHash([0xAA; 20]), [0x42; 20]);

        let bytes = handshake.encode();

        assert_eq!(bytes.len(), 68);
        assert_eq!(bytes[0], 19);
        assert_eq!(&bytes[1..20], b"BitTorrent protocol");
        assert_eq!(bytes[25] & 0x10, 0x10);
        assert_eq!(Handshake::decode(&bytes).unwrap(), handshake);
    }

    #[test]
    fn a_handshake_with_a_wrong_protocol_string_is_rejected() {
        let mut bytes = Handshake::new(InfoHash([0xAA; 20]), [0x42; 20]).encode();
        bytes[1] = b'X';

        assert!(matches!(Handshake::decode(&bytes).unwrap_err(), Error::BadHandshake));
    }

    #[test]
    fn the_extension_bit_is_observable_on_decode() {
        let mut bytes = Handshake::new(InfoHash([0xAA; 20]), [0x42; 20]).encode();
        bytes[25] = 0;

        assert!(!Handshake::decode(&bytes).unwrap().supports_extension_protocol);
    }

    #[test]
    fn the_extension_handshake_payload_is_the_canonical_one() {
        assert_eq!(extension_handshake(), b"d1:md11:ut_metadatai1eee".to_vec());
    }

    #[test]
    fn a_peer_extension_handshake_is_parsed() {
        let parsed = ExtensionHandshake::parse(b"d1:md11:ut_metadatai3ee13:metadata_sizei31235ee").unwrap();

        assert_eq!(parsed.ut_metadata, Some(3));
        assert_eq!(parsed.metadata_size, Some(31235));
    }

    #[test]
    fn a_peer_without_ut_metadata_parses_to_none() {
        let parsed = ExtensionHandshake::parse(b"d1:mdee").unwrap();

        assert_eq!(parsed.ut_metadata, None);
    }

    #[test]
    fn a_data_message_splits_header_and_payload() {
        let mut payload = b"d8:msg_typei1e5:piecei0e10:total_sizei8ee".to_vec();
        payload.extend_from_slice(b"8 bytes!");

        let parsed = MetadataMessage::parse(&payload).unwrap();

        assert_eq!(
            parsed,
            MetadataMessage::Data {
                piece: 0,
                total_size: Some(8),
                payload: b"8 bytes!".to_vec(),
            }
        );
    }

    #[test]
    fn a_reject_message_is_parsed() {
        let parsed = MetadataMessage::parse(b"d8:msg_typei2e5:piecei4ee").unwrap();

        assert_eq!(parsed, MetadataMessage::Reject { piece: 4 });
    }

    #[test]
    fn a_request_payload_is_canonical() {
        assert_eq!(MetadataMessage::request(2), b"d8:msg_typei0e5:piecei2ee".to_vec());
    }

    #[test]
    fn an_unknown_msg_type_is_rejected() {
        assert!(MetadataMessage::parse(b"d8:msg_typei9e5:piecei0ee").is_err());
    }
}
