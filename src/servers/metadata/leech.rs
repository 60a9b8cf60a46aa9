//! The per-infohash metadata leech.
//!
//! A leech is a one-shot `BitTorrent` session: connect, handshake, negotiate
//! `ut_metadata`, download every metadata piece, verify the SHA-1 against the
//! infohash, parse, disconnect. Any protocol violation, integrity failure or
//! expired deadline aborts the session; the peer is never blacklisted.
use std::net::SocketAddr;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use torrust_dht_crawler_primitives::info_hash::InfoHash;
use tracing::trace;

use crate::servers::metadata::error::Error;
use crate::servers::metadata::wire::{
    extension_handshake, read_frame, read_handshake, write_extended, ExtensionHandshake, Handshake, MetadataMessage,
    EXTENDED_MESSAGE_ID, EXTENSION_HANDSHAKE_ID, LOCAL_UT_METADATA_ID,
};
use crate::servers::metadata::{CONNECT_TIMEOUT, EXCHANGE_TIMEOUT, MAX_METADATA_SIZE, MAX_PIPELINED_REQUESTS, METADATA_PIECE_SIZE};
use crate::shared::bit_torrent::metainfo::{parse_info_dict, TorrentMetadata};
use crate::shared::bit_torrent::sha1_digest;

/// The fixed client mark of the crawler's peer id.
const PEER_ID_PREFIX: &[u8; 8] = b"-TD0100-";

/// Fetches and validates the metadata of `info_hash` from one peer.
///
/// # Errors
///
/// Will return an [`enum@Error`] describing why the exchange was aborted.
pub async fn fetch_metadata(info_hash: InfoHash, peer: SocketAddr) -> Result<TorrentMetadata, Error> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(peer))
        .await
        .map_err(|_| Error::Timeout)??;

    tokio::time::timeout(EXCHANGE_TIMEOUT, exchange(stream, info_hash))
        .await
        .map_err(|_| Error::Timeout)?
}

/// The whole exchange after the TCP connect, generic over the stream so
/// tests can run it against an in-memory peer.
async fn exchange<S>(mut stream: S, info_hash: InfoHash) -> Result<TorrentMetadata, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&Handshake::new(info_hash, generate_peer_id()).encode()).await?;
    stream.flush().await?;

    let theirs = read_handshake(&mut stream).await?;
    if theirs.info_hash != info_hash {
        return Err(Error::BadHandshake);
    }
    if !theirs.supports_extension_protocol {
        return Err(Error::ExtensionsUnsupported);
    }

    write_extended(&mut stream, EXTENSION_HANDSHAKE_ID, &extension_handshake()).await?;

    let (their_ut_metadata, metadata_size) = await_extension_handshake(&mut stream).await?;
    let metadata_size = validate_metadata_size(metadata_size)?;

    let piece_count = metadata_size.div_ceil(METADATA_PIECE_SIZE);
    let mut assembly = PieceAssembly::new(metadata_size, piece_count);

    let mut next_request = 0;
    while next_request < piece_count.min(MAX_PIPELINED_REQUESTS) {
        write_extended(&mut stream, their_ut_metadata, &MetadataMessage::request(next_request as i64)).await?;
        next_request += 1;
    }

    while !assembly.is_complete() {
        let frame = read_frame(&mut stream).await?;

        // Keep-alives and ordinary torrent traffic are discarded; the peer is
        // free to send bitfields and haves we have no use for.
        if frame.len() < 2 || frame[0] != EXTENDED_MESSAGE_ID || frame[1] != LOCAL_UT_METADATA_ID {
            continue;
        }

        match MetadataMessage::parse(&frame[2..])? {
            MetadataMessage::Data { piece, payload, .. } => {
                assembly.record(piece, &payload)?;

                if next_request < piece_count {
                    write_extended(&mut stream, their_ut_metadata, &MetadataMessage::request(next_request as i64)).await?;
                    next_request += 1;
                }
            }
            MetadataMessage::Reject { piece } => {
                // Nothing to re-request from a rejecting peer; if every piece
                // is rejected the exchange dies on its deadline.
                trace!("peer rejected metadata piece {piece}");
            }
            MetadataMessage::Request { .. } => {
                // This client serves nothing.
            }
        }
    }

    let metadata = assembly.into_bytes();

    if sha1_digest(&metadata) != info_hash.bytes() {
        return Err(Error::InfoHashMismatch);
    }

    Ok(parse_info_dict(&metadata)?)
}

/// Reads frames until the peer's extension handshake arrives.
async fn await_extension_handshake<S>(stream: &mut S) -> Result<(u8, i64), Error>
where
    S: AsyncRead + Unpin,
{
    loop {
        let frame = read_frame(stream).await?;

        if frame.len() < 2 || frame[0] != EXTENDED_MESSAGE_ID || frame[1] != EXTENSION_HANDSHAKE_ID {
            continue;
        }

        let handshake = ExtensionHandshake::parse(&frame[2..])?;
        let ut_metadata = handshake.ut_metadata.ok_or(Error::UtMetadataUnsupported)?;

        return Ok((ut_metadata, handshake.metadata_size.unwrap_or(0)));
    }
}

/// Applies the size gate: declared sizes of zero, negative or above
/// [`MAX_METADATA_SIZE`] abort the leech before any piece is requested.
fn validate_metadata_size(size: i64) -> Result<usize, Error> {
    match usize::try_from(size) {
        Ok(parsed) if parsed > 0 && parsed <= MAX_METADATA_SIZE => Ok(parsed),
        _ => Err(Error::MetadataSizeOutOfRange { size }),
    }
}

fn generate_peer_id() -> [u8; 20] {
    let mut peer_id = [0u8; 20];
    peer_id[..8].copy_from_slice(PEER_ID_PREFIX);

    let suffix: Vec<u8> = rand::thread_rng().sample_iter(&Alphanumeric).take(12).collect();
    peer_id[8..].copy_from_slice(&suffix);

    peer_id
}

/// Reassembly buffer for the fixed-size metadata pieces.
struct PieceAssembly {
    buffer: Vec<u8>,
    received: Vec<bool>,
    total_size: usize,
}

impl PieceAssembly {
    fn new(total_size: usize, piece_count: usize) -> PieceAssembly {
        PieceAssembly {
            buffer: vec![0u8; total_size],
            received: vec![false; piece_count],
            total_size,
        }
    }

    /// Stores one piece. Out-of-range indexes, duplicates and payloads of
    /// the wrong size are protocol violations.
    fn record(&mut self, piece: i64, payload: &[u8]) -> Result<(), Error> {
        let index = usize::try_from(piece).map_err(|_| Error::UnexpectedPiece { piece })?;

        if index >= self.received.len() || self.received[index] || payload.len() != self.expected_len(index) {
            return Err(Error::UnexpectedPiece { piece });
        }

        let offset = index * METADATA_PIECE_SIZE;
        self.buffer[offset..offset + payload.len()].copy_from_slice(payload);
        self.received[index] = true;

        Ok(())
    }

    fn expected_len(&self, index: usize) -> usize {
        if index == self.received.len() - 1 {
            self.total_size - index * METADATA_PIECE_SIZE
        } else {
            METADATA_PIECE_SIZE
        }
    }

    fn is_complete(&self) -> bool {
        self.received.iter().all(|received| *received)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}
