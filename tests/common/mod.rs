// Shared fixtures for the integration tests: a loopback server, a recording
// observer, and a proxy that cuts a connection after a byte budget.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rftx::client::TransferObserver;
use rftx::common::config::{ClientConfig, ServerConfig};
use rftx::common::types::TransferDirection;
use rftx::server::Server;

/// Start a server rooted at `root` on an ephemeral loopback port.
pub fn spawn_server(root: &Path) -> SocketAddr {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), root.to_path_buf())
        .with_timeout(Duration::from_secs(5))
        .unwrap();
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

/// Client config with a short receive timeout so a stalled link turns into a
/// retry quickly.
pub fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(addr.to_string())
        .with_timeout(Duration::from_millis(500))
        .unwrap()
}

/// Deterministic test content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Observer that records the chunk sizes seen on each attempt.
#[derive(Default)]
pub struct RecordingObserver {
    attempts: Mutex<Vec<Vec<usize>>>,
    resumes: Mutex<Vec<(u64, u64)>>,
}

impl RecordingObserver {
    pub fn chunks(&self) -> Vec<Vec<usize>> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn resumes(&self) -> Vec<(u64, u64)> {
        self.resumes.lock().unwrap().clone()
    }
}

impl TransferObserver for RecordingObserver {
    fn on_attempt(&self, _attempt: u32, _direction: TransferDirection) {
        self.attempts.lock().unwrap().push(Vec::new());
    }

    fn on_resume(&self, offset: u64, total: u64) {
        self.resumes.lock().unwrap().push((offset, total));
    }

    fn on_chunk(&self, len: usize, _transferred: u64, _total: u64) {
        if let Some(current) = self.attempts.lock().unwrap().last_mut() {
            current.push(len);
        }
    }
}

/// Which way the byte budget is counted.
#[derive(Debug, Clone, Copy)]
pub enum Flow {
    ClientToServer,
    ServerToClient,
}

/// What happens to the server side of a cut connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cut {
    /// Close it, so the server handler ends right away.
    CloseUpstream,
    /// Keep it open and silent, so the server handler stays blocked on the
    /// dead link until its own timeout.
    HoldUpstream,
}

/// TCP proxy in front of a server. The first connection through it forwards
/// exactly `budget` bytes in the chosen direction, then goes silent towards
/// the client while keeping its socket open. Later connections pass through
/// untouched.
pub struct StallProxy {
    addr: SocketAddr,
    parked: Arc<Mutex<Vec<TcpStream>>>,
    held: Arc<Mutex<Vec<TcpStream>>>,
}

impl StallProxy {
    pub fn start(upstream: SocketAddr, flow: Flow, budget: u64) -> Self {
        Self::start_with(upstream, flow, budget, Cut::CloseUpstream)
    }

    pub fn start_with(upstream: SocketAddr, flow: Flow, budget: u64, cut: Cut) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let parked = Arc::new(Mutex::new(Vec::new()));
        let held = Arc::new(Mutex::new(Vec::new()));

        let sockets = (Arc::clone(&parked), Arc::clone(&held));
        thread::spawn(move || {
            for (index, incoming) in listener.incoming().enumerate() {
                let client = match incoming {
                    Ok(stream) => stream,
                    Err(_) => continue,
                };
                let budget = if index == 0 { Some(budget) } else { None };
                let link = Link {
                    client,
                    mode: cut,
                    cut: AtomicBool::new(false),
                    parked: Arc::clone(&sockets.0),
                    held: Arc::clone(&sockets.1),
                };
                thread::spawn(move || relay(link, upstream, flow, budget));
            }
        });

        Self { addr, parked, held }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of client connections currently held open after a cut.
    pub fn stalled(&self) -> usize {
        self.parked.lock().unwrap().len()
    }

    /// Number of server connections held open and silent after a cut.
    pub fn held_upstream(&self) -> usize {
        self.held.lock().unwrap().len()
    }
}

struct Link {
    client: TcpStream,
    mode: Cut,
    cut: AtomicBool,
    parked: Arc<Mutex<Vec<TcpStream>>>,
    held: Arc<Mutex<Vec<TcpStream>>>,
}

impl Link {
    fn cut(&self, server: &TcpStream) {
        self.cut.store(true, Ordering::SeqCst);
        if let Ok(client) = self.client.try_clone() {
            self.parked.lock().unwrap().push(client);
        }
        match self.mode {
            Cut::CloseUpstream => {
                let _ = server.shutdown(Shutdown::Both);
            }
            Cut::HoldUpstream => {
                if let Ok(server) = server.try_clone() {
                    self.held.lock().unwrap().push(server);
                }
            }
        }
    }

    fn is_cut(&self) -> bool {
        self.cut.load(Ordering::SeqCst)
    }
}

fn relay(link: Link, upstream: SocketAddr, flow: Flow, budget: Option<u64>) {
    let server = match TcpStream::connect(upstream) {
        Ok(stream) => stream,
        Err(_) => return,
    };
    let (up_budget, down_budget) = match flow {
        Flow::ClientToServer => (budget, None),
        Flow::ServerToClient => (None, budget),
    };

    let client = link.client.try_clone().unwrap();
    let link = Arc::new(link);
    let up = {
        let link = Arc::clone(&link);
        let from = client.try_clone().unwrap();
        let to = server.try_clone().unwrap();
        let upstream = server.try_clone().unwrap();
        thread::spawn(move || pump(from, to, up_budget, &link, &upstream))
    };
    pump(server.try_clone().unwrap(), client, down_budget, &link, &server);
    let _ = up.join();
}

fn pump(
    mut from: TcpStream,
    mut to: TcpStream,
    budget: Option<u64>,
    link: &Link,
    server: &TcpStream,
) {
    let mut remaining = budget.unwrap_or(u64::MAX);
    let mut buf = [0u8; 4096];

    loop {
        let n = match from.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if link.is_cut() {
            continue;
        }

        let allowed = (n as u64).min(remaining) as usize;
        if to.write_all(&buf[..allowed]).is_err() {
            break;
        }
        remaining -= allowed as u64;
        if remaining == 0 {
            link.cut(server);
        }
    }

    if !link.is_cut() {
        let _ = to.shutdown(Shutdown::Write);
    }
}
