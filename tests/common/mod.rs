#![allow(dead_code)]

use arkpad::link::Endpoint;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const CONNECT: u8 = 1;
pub const DISCONNECT: u8 = 2;
pub const DATA: u8 = 4;
pub const PING: u8 = 8;

pub const CONNECTION_SUCCESS: u8 = 100;
pub const CONNECTION_FAILURE: u8 = 101;
pub const DISCONNECTED: u8 = 200;
pub const UNSUPPORTED: u8 = 201;
pub const PONG: u8 = 202;

/// UDP peer on localhost that records every datagram and answers per a closure
pub struct FakeDevice {
    addr: SocketAddr,
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    task: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&[u8]) -> Option<u8> + Send + 'static,
    {
        Self::spawn_datagrams(move |frame| match respond(frame) {
            Some(code) => vec![vec![code]],
            None => Vec::new(),
        })
        .await
    }

    /// Like `spawn`, but each request may be answered by any number of raw datagrams
    pub async fn spawn_datagrams<F>(respond: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));

        let recorded = frames.clone();
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            loop {
                let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let frame = buf[..len].to_vec();
                let replies = respond(&frame);
                recorded.lock().unwrap().push(frame);
                for reply in replies {
                    let _ = socket.send_to(&reply, from).await;
                }
            }
        });

        Self { addr, frames, task }
    }

    /// Answers every request the way a healthy device does
    pub async fn cooperative() -> Self {
        Self::spawn(cooperative_reply).await
    }

    /// Healthy until `pongs` is cleared, then ignores PING
    pub async fn with_pong_switch(pongs: Arc<AtomicBool>) -> Self {
        Self::spawn(move |frame| match frame.first() {
            Some(&PING) if !pongs.load(Ordering::SeqCst) => None,
            _ => cooperative_reply(frame),
        })
        .await
    }

    pub async fn silent() -> Self {
        Self::spawn(|_| None).await
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.addr.ip().to_string(), self.addr.port())
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }

    pub fn count(&self, tag: u8) -> usize {
        self.frames()
            .iter()
            .filter(|frame| frame.first() == Some(&tag))
            .count()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn cooperative_reply(frame: &[u8]) -> Option<u8> {
    match frame.first() {
        Some(&CONNECT) => Some(CONNECTION_SUCCESS),
        Some(&PING) => Some(PONG),
        Some(&DISCONNECT) => Some(DISCONNECTED),
        _ => None,
    }
}

/// Lets in-flight datagrams reach the fake device
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
