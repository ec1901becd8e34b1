//! Control channel ke renderer
//!
//! `ask` diserialisasi oleh pemanggil (satu thread, `&mut self`). Event yang
//! datang sebelum reply tidak dibuang: disimpan dan dikeluarkan lagi lewat
//! `next_buffered`, berurutan sesuai kedatangan.

use std::collections::VecDeque;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::frame::FrameStream;
use super::message::{Inbound, Outbound};
use crate::error::{Error, Result};

pub struct Channel {
    frames: FrameStream,
    deferred: VecDeque<Inbound>,
}

impl Channel {
    /// Connect ke socket renderer. Tidak ada retry.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)?;
        debug!(socket = %path.display(), "control channel connected");
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            frames: FrameStream::new(stream),
            deferred: VecDeque::new(),
        }
    }

    pub fn send(&mut self, message: &Outbound) -> Result<()> {
        self.frames.send_frame(&message.encode()?)
    }

    /// Pesan berikutnya dari wire, blocking tanpa timeout.
    pub fn receive(&mut self) -> Result<Inbound> {
        let payload = self.frames.receive_frame()?;
        Inbound::decode(&payload)
    }

    pub fn receive_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        self.frames.receive_exact(n)
    }

    /// Kirim ask dan tunggu reply-nya (`Return` atau `Error`).
    pub fn ask(&mut self, function: &str, args: Value) -> Result<Inbound> {
        debug!(function, %args, "ask");
        self.send(&Outbound::ask(function, args))?;

        loop {
            match self.receive()? {
                reply if reply.is_reply() => return Ok(reply),
                event @ Inbound::Event { .. } => {
                    debug!(?event, "event arrived during ask, deferring");
                    self.deferred.push_back(event);
                }
                other => warn!(?other, "ignoring unexpected message while waiting for reply"),
            }
        }
    }

    /// Seperti `ask`, tapi reply error menjadi `Error::Remote`.
    pub fn call(&mut self, function: &str, args: Value) -> Result<Value> {
        match self.ask(function, args)? {
            Inbound::Return { value } => Ok(value),
            Inbound::Error { error } => Err(Error::Remote(error)),
            other => Err(Error::Malformed(format!("{other:?} is not a reply"))),
        }
    }

    /// Pesan yang sudah ada di memory (deferred dulu, lalu frame di buffer).
    pub fn next_buffered(&mut self) -> Result<Option<Inbound>> {
        if let Some(event) = self.deferred.pop_front() {
            return Ok(Some(event));
        }
        match self.frames.try_take_frame()? {
            Some(payload) => Ok(Some(Inbound::decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Sedot bytes yang tersedia di socket tanpa blocking.
    pub fn drain(&mut self) -> Result<usize> {
        self.frames.drain_available()
    }

    pub fn pending_events(&self) -> usize {
        self.deferred.len()
    }

    /// Peer sudah hangup. Frame lengkap yang tersisa masih bisa diambil.
    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }
}

impl AsRawFd for Channel {
    fn as_raw_fd(&self) -> RawFd {
        self.frames.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};

    fn write_json(stream: &mut UnixStream, v: Value) {
        let payload = serde_json::to_vec(&v).unwrap();
        stream.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
        stream.write_all(&payload).unwrap();
    }

    fn read_json(stream: &mut UnixStream) -> Value {
        let mut len = [0u8; 4];
        stream.read_exact(&mut len).unwrap();
        let mut payload = vec![0u8; u32::from_le_bytes(len) as usize];
        stream.read_exact(&mut payload).unwrap();
        serde_json::from_slice(&payload).unwrap()
    }

    #[test]
    fn test_ask_defers_interleaved_event() {
        let (client, mut peer) = UnixStream::pair().unwrap();
        let mut channel = Channel::from_stream(client);

        let renderer = std::thread::spawn(move || {
            let ask = read_json(&mut peer);
            assert_eq!(ask["fn"], "aloc");
            write_json(&mut peer, json!({ "kind": "event", "evt_id": 4 }));
            write_json(&mut peer, json!({ "kind": "return", "return": 64 }));
            peer
        });

        let value = channel.call("aloc", json!({ "n": 16 })).unwrap();
        assert_eq!(value, json!(64));
        assert_eq!(channel.pending_events(), 1);
        assert_eq!(
            channel.next_buffered().unwrap(),
            Some(Inbound::Event { evt_id: Some(4) })
        );
        assert_eq!(channel.next_buffered().unwrap(), None);
        renderer.join().unwrap();
    }

    #[test]
    fn test_error_reply_is_remote() {
        let (client, mut peer) = UnixStream::pair().unwrap();
        let mut channel = Channel::from_stream(client);

        let renderer = std::thread::spawn(move || {
            read_json(&mut peer);
            write_json(&mut peer, json!({ "kind": "error", "error": "bad pointer" }));
        });

        let err = channel.call("dealoc", json!({ "ptr": 3 })).unwrap_err();
        assert!(matches!(err, Error::Remote(ref msg) if msg == "bad pointer"));
        assert!(!err.is_fatal());
        renderer.join().unwrap();
    }

    #[test]
    fn test_hangup_during_ask() {
        let (client, peer) = UnixStream::pair().unwrap();
        let mut channel = Channel::from_stream(client);
        drop(peer);

        let err = channel.call("set_root", json!({ "ptr": 0 })).unwrap_err();
        assert!(err.is_fatal());
    }
}
