//! Blocking TCP server exposing a `LocalNode`

use super::wire::{self, Action, Request, Response};
use super::{LocalNode, NodeError, NodeStore, Result};
use log::{debug, info, warn};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

/// Serves one request per connection, one connection at a time
pub struct NodeServer {
    listener: TcpListener,
    addr: SocketAddr,
    node: LocalNode,
    max_frame_len: usize,
}

impl NodeServer {
    /// Bind `addr` and open the node directory `dir`
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        dir: impl Into<PathBuf>,
        max_frame_len: usize,
    ) -> Result<Self> {
        let node = LocalNode::open(dir)?;
        let listener = TcpListener::bind(addr).map_err(NodeError::Wire)?;
        let addr = listener.local_addr().map_err(NodeError::Wire)?;
        Ok(Self {
            listener,
            addr,
            node,
            max_frame_len,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handle connections until a shutdown request arrives
    pub fn serve(mut self) -> Result<()> {
        info!(
            "Node server on {} serving {}",
            self.addr,
            self.node.location().display()
        );

        for stream in self.listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("accept failed on {}: {}", self.addr, e);
                    continue;
                }
            };

            match handle_connection(&mut self.node, &mut stream, self.max_frame_len) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => warn!("request on {} failed: {}", self.addr, e),
            }
        }

        info!("Node server on {} stopped", self.addr);
        Ok(())
    }

    /// Run `serve` on a named background thread
    pub fn spawn(self) -> Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name(format!("node-server-{}", self.addr.port()))
            .spawn(move || self.serve())
            .map_err(NodeError::Wire)
    }
}

/// Returns true once a shutdown request was acknowledged
fn handle_connection(
    node: &mut LocalNode,
    stream: &mut TcpStream,
    max_frame_len: usize,
) -> Result<bool> {
    let request: Request = match wire::receive(stream, max_frame_len) {
        Ok(request) => request,
        Err(e) => {
            let _ = wire::send(stream, &Response::error(&e));
            return Err(e);
        }
    };
    debug!(
        "{:?} {:?} ({} bytes)",
        request.action,
        String::from_utf8_lossy(&request.key),
        request.value.len()
    );

    let (response, shutdown) = match request.action {
        Action::Write => {
            let result = request
                .key_str()
                .and_then(|key| node.write(key, &request.value));
            match result {
                Ok(()) => (Response::ok(Vec::new()), false),
                Err(e) => (Response::error(e), false),
            }
        }
        Action::Read => match request.key_str().and_then(|key| node.read(key)) {
            Ok(bytes) => (Response::ok(bytes), false),
            Err(NodeError::NotFound { .. }) => (Response::not_found(), false),
            Err(e) => (Response::error(e), false),
        },
        Action::Shutdown => (Response::ok(Vec::new()), true),
    };

    wire::send(stream, &response)?;
    Ok(shutdown)
}
