//! Client side of a remote node

use super::wire::{self, Request, Response, Status};
use super::{scramble, validate_key, NodeError, NodeServer, NodeStore, Result};
use log::debug;
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

/// Node reached over TCP, one connection per request
pub struct RemoteNode {
    addr: SocketAddr,
    location: PathBuf,
    max_frame_len: usize,
    alive: bool,
    server: Option<JoinHandle<Result<()>>>,
}

impl RemoteNode {
    /// Start a `NodeServer` for `dir` on an ephemeral loopback port and connect to it
    pub fn spawn(dir: &Path, max_frame_len: usize) -> Result<Self> {
        let server = NodeServer::bind("127.0.0.1:0", dir, max_frame_len)?;
        let addr = server.local_addr();
        let handle = server.spawn()?;
        debug!("Spawned node server for {} on {}", dir.display(), addr);

        let mut node = Self::connect(addr, dir, max_frame_len);
        node.server = Some(handle);
        Ok(node)
    }

    /// Talk to a server started elsewhere; `close` leaves it running
    pub fn connect(addr: SocketAddr, location: impl Into<PathBuf>, max_frame_len: usize) -> Self {
        Self {
            addr,
            location: location.into(),
            max_frame_len,
            alive: true,
            server: None,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn request(&self, request: &Request) -> Result<Response> {
        let mut stream = TcpStream::connect(self.addr).map_err(|source| NodeError::Network {
            addr: self.addr,
            source,
        })?;
        wire::send(&mut stream, request)?;
        wire::receive(&mut stream, self.max_frame_len)
    }
}

impl NodeStore for RemoteNode {
    fn location(&self) -> &Path {
        &self.location
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        let response = self.request(&Request::put(key, bytes))?;
        match response.status {
            Status::Ok => Ok(()),
            _ => Err(NodeError::Remote(response.message())),
        }
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let response = self.request(&Request::get(key))?;
        match response.status {
            Status::Ok => Ok(response.payload),
            Status::NotFound => Err(NodeError::NotFound {
                key: key.to_string(),
            }),
            Status::Error => Err(NodeError::Remote(response.message())),
        }
    }

    fn alive(&self) -> bool {
        self.alive
    }

    fn crash(&mut self) {
        self.alive = false;
    }

    fn recover(&mut self) {
        self.alive = true;
    }

    fn corrupt(&mut self, key: &str) -> Result<()> {
        let mut bytes = self.read(key)?;
        scramble(&mut bytes, &mut rand::rng());
        self.write(key, &bytes)
    }

    fn close(&mut self) -> Result<()> {
        let Some(handle) = self.server.take() else {
            return Ok(());
        };

        let response = self.request(&Request::shutdown())?;
        if response.status != Status::Ok {
            return Err(NodeError::Remote(response.message()));
        }
        handle
            .join()
            .map_err(|_| NodeError::Remote(format!("server thread for {} panicked", self.addr)))?
    }
}

impl Drop for RemoteNode {
    fn drop(&mut self) {
        if self.server.is_some() {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remote_roundtrip_and_close() {
        let dir = TempDir::new().unwrap();
        let mut node = RemoteNode::spawn(dir.path(), 1 << 20).unwrap();

        node.write("k", &[1, 2, 3, 4]).unwrap();
        assert_eq!(node.read("k").unwrap(), vec![1, 2, 3, 4]);
        assert!(matches!(node.read("missing"), Err(NodeError::NotFound { .. })));

        node.corrupt("k").unwrap();
        assert_ne!(node.read("k").unwrap(), vec![1, 2, 3, 4]);

        node.close().unwrap();
        assert!(node.read("k").is_err());
    }

    #[test]
    fn test_connect_does_not_own_server() {
        let dir = TempDir::new().unwrap();
        let server = NodeServer::bind("127.0.0.1:0", dir.path(), 1 << 20).unwrap();
        let addr = server.local_addr();
        let handle = server.spawn().unwrap();

        let mut client = RemoteNode::connect(addr, dir.path(), 1 << 20);
        client.write("k", b"v").unwrap();
        client.close().unwrap();

        let mut owner = RemoteNode::connect(addr, dir.path(), 1 << 20);
        assert_eq!(owner.read("k").unwrap(), b"v");
        owner.request(&Request::shutdown()).unwrap();
        handle.join().unwrap().unwrap();
        owner.close().unwrap();
    }
}
