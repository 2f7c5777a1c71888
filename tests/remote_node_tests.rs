//! Remote nodes: a store whose every node sits behind a loopback `NodeServer`

use raidstore::node::{NodeServer, NodeStore, RemoteNode};
use raidstore::{BackendKind, DamageState, FixedPlacement, ObjectStore, StoreConfig};
use tempfile::TempDir;

fn remote_store(dir: &TempDir, nodes: usize) -> ObjectStore {
    let config = StoreConfig::new(dir.path(), nodes).with_backend(BackendKind::Remote);
    ObjectStore::open(config)
        .unwrap()
        .with_placement(FixedPlacement::new(0, 2))
}

#[test]
fn test_remote_store_roundtrip_and_faults() {
    let dir = TempDir::new().unwrap();
    let mut store = remote_store(&dir, 5);
    // exact multiples of common socket buffer sizes
    let original: Vec<u8> = (0..12_288).map(|i| (i % 241) as u8).collect();
    store.write("big", &original).unwrap();

    assert_eq!(store.read("big").unwrap(), original);

    store.crash_data_nodes("big", 2).unwrap();
    assert_eq!(store.read("big").unwrap(), original);
    store.recover_all("big").unwrap();

    store.corrupt_parity_node("big").unwrap();
    let outcome = store.read_with_report("big").unwrap();
    assert_eq!(outcome.damage, DamageState::Parity);
    assert_eq!(outcome.content, original);

    store.recover_corrupted_data().unwrap();
    assert_eq!(store.read_with_report("big").unwrap().damage, DamageState::None);

    store.close().unwrap();
    assert!(dir.path().join("node_1").join("big.obj").exists());
}

#[test]
fn test_remote_store_reopens_on_local_files() {
    let dir = TempDir::new().unwrap();
    let original = b"written through sockets".to_vec();

    let mut remote = remote_store(&dir, 7);
    remote.write("k", &original).unwrap();
    remote.close().unwrap();

    let mut local = ObjectStore::open(StoreConfig::new(dir.path(), 7)).unwrap();
    assert_eq!(local.read("k").unwrap(), original);
    local.close().unwrap();
}

#[test]
fn test_standalone_server_with_client() {
    let dir = TempDir::new().unwrap();
    let server = NodeServer::bind("127.0.0.1:0", dir.path(), 1024).unwrap();
    let addr = server.local_addr();
    let handle = server.spawn().unwrap();

    let mut client = RemoteNode::connect(addr, dir.path(), 1024);
    client.write("small", &[1, 2, 3]).unwrap();
    assert_eq!(client.read("small").unwrap(), vec![1, 2, 3]);

    // the server caps request frames at 1024 bytes
    assert!(client.write("large", &[0u8; 4096]).is_err());
    assert!(client.read("large").is_err());
    client.close().unwrap();

    let mut owner = RemoteNode::spawn(&dir.path().join("other"), 1024).unwrap();
    owner.write("x", b"y").unwrap();
    let mut visitor = RemoteNode::connect(owner.addr(), dir.path().join("other"), 1024);
    assert_eq!(visitor.read("x").unwrap(), b"y".to_vec());
    // a client that did not spawn the server leaves it running
    visitor.close().unwrap();
    assert_eq!(owner.read("x").unwrap(), b"y".to_vec());
    owner.close().unwrap();

    let mut stopper = RemoteNode::connect(addr, dir.path(), 1024);
    stopper.write("after", b"still serving").unwrap();
    drop(stopper);

    shutdown(addr);
    handle.join().unwrap().unwrap();
}

fn shutdown(addr: std::net::SocketAddr) {
    use raidstore::node::wire::{self, Request, Response};
    let mut stream = std::net::TcpStream::connect(addr).unwrap();
    wire::send(&mut stream, &Request::shutdown()).unwrap();
    let response: Response = wire::receive(&mut stream, 1024).unwrap();
    assert_eq!(response, Response::ok(Vec::new()));
}
