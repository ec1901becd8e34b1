//! Length-prefixed framing dengan buffered I/O
//!
//! Wire format: `[u32 LE panjang payload][payload]`. Socket tetap blocking;
//! `drain_available` sementara pindah ke non-blocking untuk menyedot semua
//! bytes yang sudah ada setelah poller bilang readable.

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

use tracing::trace;

use crate::error::{Error, Result};

pub const LEN_PREFIX: usize = 4;

/// Batas atas payload satu frame
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;

pub struct FrameStream {
    stream: UnixStream,
    read_buffer: Vec<u8>,
    read_pos: usize,
    read_len: usize,
    closed: bool,
}

impl FrameStream {
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            read_buffer: vec![0u8; READ_CHUNK],
            read_pos: 0,
            read_len: 0,
            closed: false,
        }
    }

    /// Bytes yang sudah diterima tapi belum dikonsumsi
    #[inline(always)]
    pub fn buffered(&self) -> usize {
        self.read_len - self.read_pos
    }

    /// Peer sudah menutup koneksi (EOF terlihat saat drain)
    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Siapkan ruang kosong di belakang buffer: compact dulu, grow kalau penuh.
    fn reserve(&mut self) {
        if self.read_pos > 0 {
            self.read_buffer.copy_within(self.read_pos..self.read_len, 0);
            self.read_len -= self.read_pos;
            self.read_pos = 0;
        }
        if self.read_len == self.read_buffer.len() {
            let grown = self.read_buffer.len() + READ_CHUNK;
            self.read_buffer.resize(grown, 0);
        }
    }

    /// Satu read blocking. EOF menjadi `ConnectionClosed`.
    fn fill_blocking(&mut self) -> Result<usize> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.reserve();
        loop {
            match self.stream.read(&mut self.read_buffer[self.read_len..]) {
                Ok(0) => {
                    self.closed = true;
                    return Err(Error::ConnectionClosed);
                }
                Ok(n) => {
                    self.read_len += n;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_socket(e)),
            }
        }
    }

    /// Baca semua bytes yang tersedia tanpa blocking.
    ///
    /// Returns jumlah bytes baru. EOF hanya dicatat; frame yang sudah lengkap
    /// di buffer tetap bisa diambil.
    pub fn drain_available(&mut self) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        self.stream.set_nonblocking(true)?;
        let drained = self.drain_nonblocking();
        self.stream.set_nonblocking(false)?;
        drained
    }

    fn drain_nonblocking(&mut self) -> Result<usize> {
        let mut total = 0;
        loop {
            self.reserve();
            match self.stream.read(&mut self.read_buffer[self.read_len..]) {
                Ok(0) => {
                    self.closed = true;
                    return Ok(total);
                }
                Ok(n) => {
                    self.read_len += n;
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(total),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_socket(e)),
            }
        }
    }

    /// Blok sampai tepat `n` bytes terkumpul.
    pub fn receive_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.buffered() < n {
            self.fill_blocking()?;
        }
        let out = self.read_buffer[self.read_pos..self.read_pos + n].to_vec();
        self.read_pos += n;
        Ok(out)
    }

    fn payload_len(prefix: [u8; LEN_PREFIX]) -> Result<usize> {
        let len = u32::from_le_bytes(prefix) as usize;
        if len > MAX_FRAME_LEN {
            return Err(Error::Malformed(format!(
                "frame of {len} bytes exceeds the {MAX_FRAME_LEN}-byte limit"
            )));
        }
        Ok(len)
    }

    /// Blok sampai satu frame lengkap diterima.
    pub fn receive_frame(&mut self) -> Result<Vec<u8>> {
        let mut prefix = [0u8; LEN_PREFIX];
        prefix.copy_from_slice(&self.receive_exact(LEN_PREFIX)?);
        let len = Self::payload_len(prefix)?;
        let payload = self.receive_exact(len)?;
        trace!(len, "frame received");
        Ok(payload)
    }

    /// Ambil frame dari buffer kalau sudah lengkap, tanpa I/O.
    pub fn try_take_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffered() < LEN_PREFIX {
            return Ok(None);
        }
        let mut prefix = [0u8; LEN_PREFIX];
        prefix.copy_from_slice(&self.read_buffer[self.read_pos..self.read_pos + LEN_PREFIX]);
        let len = Self::payload_len(prefix)?;
        if self.buffered() < LEN_PREFIX + len {
            return Ok(None);
        }

        let start = self.read_pos + LEN_PREFIX;
        let payload = self.read_buffer[start..start + len].to_vec();
        self.read_pos = start + len;
        trace!(len, "frame taken from buffer");
        Ok(Some(payload))
    }

    /// Prefix dan payload dikirim dalam satu `write_all`.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|&len| len as usize <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                Error::Malformed(format!("outbound frame of {} bytes is too large", payload.len()))
            })?;

        let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(payload);
        self.stream.write_all(&frame).map_err(Error::from_socket)?;
        trace!(len, "frame sent");
        Ok(())
    }
}

impl AsRawFd for FrameStream {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_send_and_receive_frame() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut tx = FrameStream::new(a);
        let mut rx = FrameStream::new(b);

        tx.send_frame(b"hello").unwrap();
        tx.send_frame(b"").unwrap();
        assert_eq!(rx.receive_frame().unwrap(), b"hello");
        assert_eq!(rx.receive_frame().unwrap(), b"");
    }

    #[test]
    fn test_frame_split_across_writes() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let mut rx = FrameStream::new(b);

        let bytes = raw_frame(b"split payload");
        let writer = std::thread::spawn(move || {
            for chunk in bytes.chunks(3) {
                a.write_all(chunk).unwrap();
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });

        assert_eq!(rx.receive_frame().unwrap(), b"split payload");
        writer.join().unwrap();
    }

    #[test]
    fn test_eof_mid_frame_is_connection_closed() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let mut rx = FrameStream::new(b);

        a.write_all(&10u32.to_le_bytes()).unwrap();
        a.write_all(b"abc").unwrap();
        drop(a);

        assert!(matches!(rx.receive_frame(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_drain_then_take_buffered_frames() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let mut rx = FrameStream::new(b);

        let mut bytes = raw_frame(b"one");
        bytes.extend(raw_frame(b"two"));
        bytes.extend(&raw_frame(b"three")[..4]);
        a.write_all(&bytes).unwrap();

        assert_eq!(rx.drain_available().unwrap(), bytes.len());
        assert_eq!(rx.try_take_frame().unwrap().unwrap(), b"one");
        assert_eq!(rx.try_take_frame().unwrap().unwrap(), b"two");
        assert!(rx.try_take_frame().unwrap().is_none());
        assert!(!rx.is_closed());

        drop(a);
        rx.drain_available().unwrap();
        assert!(rx.is_closed());
    }

    #[test]
    fn test_buffer_grows_for_large_frame() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut tx = FrameStream::new(a);
        let mut rx = FrameStream::new(b);

        let big = vec![7u8; READ_CHUNK * 2 + 5];
        let sent = big.clone();
        let writer = std::thread::spawn(move || tx.send_frame(&sent).unwrap());
        assert_eq!(rx.receive_frame().unwrap(), big);
        writer.join().unwrap();
    }
}
