use once_cell::sync::Lazy;
use overlay::dht::HashNode;
use overlay::protocol::Listener;
use pretty_assertions::assert_eq;
use skipplus_types::bincode::BinCodeSerAndDeser;
use skipplus_types::bincode::LENGTH_HEADER_SIZE;
use skipplus_types::bincode::MAGIC_BYTES;
use skipplus_types::bincode::VERSION_LENGTH;
use skipplus_types::version::VERSION;
use skipplus_types::wire::{Entry, Method, MethodResult, RpcRequest, RpcResponse, SearchOp};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

static NEXT_CORRELATION_ID: Lazy<std::sync::atomic::AtomicU64> =
    Lazy::new(|| std::sync::atomic::AtomicU64::new(1));

async fn spawn_lone_node(host: &str) -> (std::net::SocketAddr, Arc<HashNode>) {
    let node = Arc::new(HashNode::new(host, 0));
    let listener = Listener::bind(host, 0, node.clone(), 1024, 1_048_576)
        .await
        .expect("failed to bind listener");
    let address = listener.local_addr().expect("could not get local addr");
    tokio::spawn(async move { listener.serve().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    (address, node)
}

async fn call(
    reader: &mut BufReader<TcpStream>,
    method: Method,
) -> Result<MethodResult, skipplus_types::wire::RemoteError> {
    let correlation_id = NEXT_CORRELATION_ID.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let request = RpcRequest {
        correlation_id,
        method,
    };
    let bytes = request.serialize().expect("request must serialize");
    reader.write_all(&bytes).await.unwrap();

    let mut magic = [0u8; MAGIC_BYTES.len()];
    let mut version = [0u8; VERSION_LENGTH];
    let mut length = [0u8; LENGTH_HEADER_SIZE];
    timeout(Duration::from_secs(1), reader.read_exact(&mut magic))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(magic, MAGIC_BYTES);
    timeout(Duration::from_secs(1), reader.read_exact(&mut version))
        .await
        .unwrap()
        .unwrap();
    assert!(VERSION.is_compatible(
        &skipplus_types::version::Version::deserialize_magic_bytes(&version).unwrap()
    ));
    timeout(Duration::from_secs(1), reader.read_exact(&mut length))
        .await
        .unwrap()
        .unwrap();
    let data_length = u64::from_be_bytes(length);
    let mut data = vec![0u8; data_length as usize];
    timeout(Duration::from_secs(1), reader.read_exact(&mut data))
        .await
        .unwrap()
        .unwrap();

    let response = RpcResponse::deserialize(&data).expect("response must deserialize");
    assert_eq!(response.correlation_id, correlation_id);
    response.result
}

#[tokio::test]
async fn get_rs_round_trips_the_nodes_random_bit_string() {
    let (address, node) = spawn_lone_node("127.0.0.1").await;
    let stream = TcpStream::connect(address).await.unwrap();
    let mut reader = BufReader::new(stream);

    let result = call(&mut reader, Method::GetRs).await.unwrap();
    assert_eq!(result, MethodResult::Rs(node.rs()));
}

#[tokio::test]
async fn search_insert_then_lookup_on_a_lone_node() {
    let (address, _node) = spawn_lone_node("127.0.0.1").await;
    let stream = TcpStream::connect(address).await.unwrap();
    let mut reader = BufReader::new(stream);

    let entry = Entry {
        key: "planet".to_string(),
        value: "earth".to_string(),
    };
    let miss = call(
        &mut reader,
        Method::Search {
            entry: entry.clone(),
            op: SearchOp::Lookup,
        },
    )
    .await
    .unwrap();
    assert_eq!(miss, MethodResult::SearchResult(None));

    let inserted = call(
        &mut reader,
        Method::Search {
            entry: entry.clone(),
            op: SearchOp::Insert,
        },
    )
    .await
    .unwrap();
    assert_eq!(inserted, MethodResult::Unit);

    let hit = call(
        &mut reader,
        Method::Search {
            entry,
            op: SearchOp::Lookup,
        },
    )
    .await
    .unwrap();
    assert_eq!(
        hit,
        MethodResult::SearchResult(Some("earth".to_string()))
    );
}

#[tokio::test]
async fn linearise_accepts_a_remote_candidate_and_returns_unit() {
    let (address_a, _node_a) = spawn_lone_node("127.0.0.1").await;
    let (_address_b, node_b) = spawn_lone_node("127.0.0.1").await;

    let stream = TcpStream::connect(address_a).await.unwrap();
    let mut reader = BufReader::new(stream);

    let result = call(&mut reader, Method::Linearise(node_b.reference()))
        .await
        .unwrap();
    assert_eq!(result, MethodResult::Unit);
}

#[tokio::test]
async fn bootstrap_handshake_makes_both_sides_mutually_aware() {
    let (_address_a, node_a) = spawn_lone_node("127.0.0.1").await;
    let (_address_b, node_b) = spawn_lone_node("127.0.0.1").await;

    // Mirrors overlay::factory::bootstrap: the joining node learns the
    // entry's reference directly, then introduces itself back.
    node_b.linearise(node_a.reference()).await;
    node_a.linearise(node_b.reference()).await;

    assert!(node_a.neighborhood().await.contains(&node_b.reference()));
    assert!(node_b.neighborhood().await.contains(&node_a.reference()));
}

#[tokio::test]
async fn shutdown_hands_entries_off_to_a_real_predecessor() {
    let (address_a, node_a) = spawn_lone_node("127.0.0.1").await;
    let (address_b, node_b) = spawn_lone_node("127.0.0.1").await;

    // node_a is the only other node in this network, so after linearising
    // both ways it is either node_b's predecessor or its successor,
    // depending on id order (ids are derived from the OS-assigned ports).
    node_a.linearise(node_b.reference()).await;
    node_b.linearise(node_a.reference()).await;

    // Pick whichever of the two has the smaller id as the "leaving" node,
    // so its predecessor is guaranteed to be the other (real) node rather
    // than the Lowest sentinel.
    let (leaver_address, leaver, survivor) = if node_a.reference().id < node_b.reference().id {
        (address_b, node_b, node_a)
    } else {
        (address_a, node_a, node_b)
    };

    let entry = Entry {
        key: "leaving".to_string(),
        value: "value".to_string(),
    };
    let stream = TcpStream::connect(leaver_address).await.unwrap();
    let mut reader = BufReader::new(stream);
    call(
        &mut reader,
        Method::Search {
            entry: entry.clone(),
            op: SearchOp::Insert,
        },
    )
    .await
    .unwrap();

    leaver.shutdown().await;

    let via_survivor = survivor.search(entry, SearchOp::Lookup).await.unwrap();
    assert_eq!(via_survivor, Some("value".to_string()));
}
