//! Remote allocator client
//!
//! Renderer adalah pemilik data region; client hanya meminta offset lewat
//! `ask` dan tidak melakukan accounting sendiri.

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::network::Channel;

pub trait Allocator {
    /// Alokasi `size` bytes, returns offset relatif data region.
    fn allocate(&mut self, size: usize) -> Result<usize>;

    fn free(&mut self, offset: usize) -> Result<()>;

    /// Tandai offset sebagai root tree yang dirender.
    fn set_root(&mut self, offset: usize) -> Result<()>;
}

fn as_offset(function: &str, value: &Value) -> Result<usize> {
    value
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| Error::Malformed(format!("{function} returned {value}, expected an offset")))
}

impl Allocator for Channel {
    fn allocate(&mut self, size: usize) -> Result<usize> {
        let value = self.call("aloc", json!({ "n": size }))?;
        let offset = as_offset("aloc", &value)?;
        debug!(size, offset, "allocated");
        Ok(offset)
    }

    fn free(&mut self, offset: usize) -> Result<()> {
        self.call("dealoc", json!({ "ptr": offset }))?;
        debug!(offset, "freed");
        Ok(())
    }

    fn set_root(&mut self, offset: usize) -> Result<()> {
        self.call("set_root", json!({ "ptr": offset }))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    fn serve(mut peer: UnixStream, replies: Vec<Value>) -> std::thread::JoinHandle<Vec<Value>> {
        std::thread::spawn(move || {
            let mut seen = Vec::new();
            for reply in replies {
                let mut len = [0u8; 4];
                peer.read_exact(&mut len).unwrap();
                let mut payload = vec![0u8; u32::from_le_bytes(len) as usize];
                peer.read_exact(&mut payload).unwrap();
                seen.push(serde_json::from_slice(&payload).unwrap());

                let out = serde_json::to_vec(&reply).unwrap();
                peer.write_all(&(out.len() as u32).to_le_bytes()).unwrap();
                peer.write_all(&out).unwrap();
            }
            seen
        })
    }

    #[test]
    fn test_allocator_round_trips() {
        let (client, peer) = UnixStream::pair().unwrap();
        let renderer = serve(
            peer,
            vec![
                json!({ "kind": "return", "return": 48 }),
                json!({ "kind": "return", "return": null }),
                json!({ "kind": "return", "return": null }),
            ],
        );

        let mut channel = Channel::from_stream(client);
        assert_eq!(channel.allocate(32).unwrap(), 48);
        channel.set_root(48).unwrap();
        channel.free(48).unwrap();

        let seen = renderer.join().unwrap();
        assert_eq!(seen[0], json!({ "kind": "ask", "fn": "aloc", "args": { "n": 32 } }));
        assert_eq!(seen[1]["fn"], "set_root");
        assert_eq!(seen[2], json!({ "kind": "ask", "fn": "dealoc", "args": { "ptr": 48 } }));
    }

    #[test]
    fn test_non_integer_offset_is_malformed() {
        let (client, peer) = UnixStream::pair().unwrap();
        let renderer = serve(peer, vec![json!({ "kind": "return", "return": "soon" })]);

        let mut channel = Channel::from_stream(client);
        assert!(matches!(channel.allocate(8), Err(Error::Malformed(_))));
        renderer.join().unwrap();
    }

    #[test]
    fn test_remote_failure_propagates() {
        let (client, peer) = UnixStream::pair().unwrap();
        let renderer = serve(peer, vec![json!({ "kind": "error", "error": "heap exhausted" })]);

        let mut channel = Channel::from_stream(client);
        assert!(matches!(channel.allocate(1 << 20), Err(Error::Remote(_))));
        renderer.join().unwrap();
    }
}
