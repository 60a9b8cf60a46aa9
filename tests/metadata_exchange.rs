//! Integration tests for the metadata sink.
//!
//! Each test runs the sink against a real TCP peer on the loopback interface
//! that speaks just enough of the `BitTorrent` peer protocol to serve (or
//! sabotage) a `ut_metadata` exchange.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use torrust_dht_crawler::core::statistics::Metrics;
use torrust_dht_crawler::core::IndexingResult;
use torrust_dht_crawler::servers::metadata::sink::{FetchTask, MetadataSink};
use torrust_dht_crawler::servers::metadata::wire::{Handshake, MetadataMessage, EXTENDED_MESSAGE_ID};
use torrust_dht_crawler::servers::signals::{shutdown_signal, Halted};
use torrust_dht_crawler::shared::bit_torrent::sha1_digest;
use torrust_dht_crawler_primitives::info_hash::InfoHash;

/// A loopback peer serving one metadata blob to every connection. It echoes
/// whatever infohash the leech asks for, so it can also serve bytes that do
/// NOT hash to the requested infohash.
async fn spawn_peer(metadata: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(serve(stream, metadata.clone()));
        }
    });

    addr
}

async fn serve(mut stream: TcpStream, metadata: Vec<u8>) {
    let mut handshake = [0u8; 68];
    if stream.read_exact(&mut handshake).await.is_err() {
        return;
    }
    let Ok(theirs) = Handshake::decode(&handshake) else {
        return;
    };

    let ours = Handshake::new(theirs.info_hash, [0x77; 20]);
    if stream.write_all(&ours.encode()).await.is_err() {
        return;
    }

    // The leech's extension handshake.
    if read_extended(&mut stream).await.is_none() {
        return;
    }

    let ext_handshake = format!("d1:md11:ut_metadatai3ee13:metadata_sizei{}ee", metadata.len());
    write_extended(&mut stream, 0, ext_handshake.as_bytes()).await;

    while let Some(frame) = read_extended(&mut stream).await {
        let Ok(MetadataMessage::Request { piece }) = MetadataMessage::parse(&frame[2..]) else {
            return;
        };

        let index = usize::try_from(piece).unwrap();
        let start = index * 16384;
        let end = (start + 16384).min(metadata.len());

        let mut payload = format!("d8:msg_typei1e5:piecei{piece}e10:total_sizei{}ee", metadata.len()).into_bytes();
        payload.extend_from_slice(&metadata[start..end]);

        write_extended(&mut stream, 1, &payload).await;
    }
}

async fn read_extended(stream: &mut TcpStream) -> Option<Vec<u8>> {
    loop {
        let len = stream.read_u32().await.ok()? as usize;
        if len == 0 {
            continue;
        }
        let mut frame = vec![0u8; len];
        stream.read_exact(&mut frame).await.ok()?;
        if frame[0] == EXTENDED_MESSAGE_ID {
            return Some(frame);
        }
    }
}

async fn write_extended(stream: &mut TcpStream, extension_id: u8, payload: &[u8]) {
    let len = u32::try_from(payload.len() + 2).unwrap();
    drop(stream.write_u32(len).await);
    drop(stream.write_u8(EXTENDED_MESSAGE_ID).await);
    drop(stream.write_u8(extension_id).await);
    drop(stream.write_all(payload).await);
}

struct RunningSink {
    fetch_tx: mpsc::Sender<FetchTask>,
    results_rx: mpsc::Receiver<IndexingResult>,
    stats: Arc<Metrics>,
    halt_tx: oneshot::Sender<Halted>,
    task: tokio::task::JoinHandle<()>,
}

fn start_sink() -> RunningSink {
    let stats = Arc::new(Metrics::default());
    let (results_tx, results_rx) = mpsc::channel(16);
    let (fetch_tx, fetch_rx) = mpsc::channel(16);
    let (halt_tx, rx_halt) = oneshot::channel();

    let sink = MetadataSink::new(results_tx, stats.clone());
    let task = tokio::spawn(sink.run(fetch_rx, shutdown_signal(rx_halt)));

    RunningSink {
        fetch_tx,
        results_rx,
        stats,
        halt_tx,
        task,
    }
}

fn sample_info_dict() -> Vec<u8> {
    b"d6:lengthi42e4:name9:video.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaae".to_vec()
}

#[tokio::test]
async fn a_complete_exchange_emits_one_validated_result() {
    let metadata = sample_info_dict();
    let info_hash = InfoHash(sha1_digest(&metadata));
    let peer = spawn_peer(metadata).await;

    let mut sink = start_sink();

    sink.fetch_tx.send(FetchTask { info_hash, peer }).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), sink.results_rx.recv())
        .await
        .expect("expected a result before the timeout")
        .unwrap();

    assert_eq!(result.info_hash, info_hash);
    assert_eq!(result.name, "video.mkv");
    assert_eq!(result.files.len(), 1);
    assert_eq!(result.peers, vec![peer]);

    sink.halt_tx.send(Halted::Normal).unwrap();
    sink.task.await.unwrap();
}

#[tokio::test]
async fn duplicate_submissions_for_one_infohash_yield_at_most_one_result() {
    let metadata = sample_info_dict();
    let info_hash = InfoHash(sha1_digest(&metadata));
    let peer = spawn_peer(metadata).await;

    let mut sink = start_sink();

    // Two submissions, back to back: the second is either a concurrent
    // duplicate or a recently fetched infohash. Either way it is dropped.
    sink.fetch_tx.send(FetchTask { info_hash, peer }).await.unwrap();
    sink.fetch_tx.send(FetchTask { info_hash, peer }).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(10), sink.results_rx.recv())
        .await
        .expect("expected a result before the timeout")
        .unwrap();
    assert_eq!(first.info_hash, info_hash);

    let second = tokio::time::timeout(Duration::from_millis(500), sink.results_rx.recv()).await;
    assert!(second.is_err(), "the duplicate submission must not produce a second result");

    assert_eq!(sink.stats.snapshot().leeches_started, 1);

    sink.halt_tx.send(Halted::Normal).unwrap();
    sink.task.await.unwrap();
}

#[tokio::test]
async fn a_sha1_mismatch_yields_no_result_and_allows_a_retry() {
    // 64 bytes that do not hash to the requested infohash.
    let peer = spawn_peer(vec![b'x'; 64]).await;
    let info_hash = InfoHash([0xAA; 20]);

    let mut sink = start_sink();

    sink.fetch_tx.send(FetchTask { info_hash, peer }).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), sink.results_rx.recv()).await;
    assert!(result.is_err(), "mismatched metadata must not become a result");
    assert_eq!(sink.stats.snapshot().leeches_failed, 1);

    // The infohash never made it into the recently fetched set, so another
    // sighting may try again.
    sink.fetch_tx.send(FetchTask { info_hash, peer }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sink.stats.snapshot().leeches_started, 2);

    sink.halt_tx.send(Halted::Normal).unwrap();
    sink.task.await.unwrap();
}
