//! Shared Buffer: version header + data region di bawah satu lock
//!
//! Layout:
//! ┌─────────────────────────────────────────────────────┐
//! │ Version header (8 bytes, u64 little-endian)         │
//! ├─────────────────────────────────────────────────────┤
//! │ Data region (offset 0 = byte ke-8 dari mapping)     │
//! └─────────────────────────────────────────────────────┘
//!
//! Semua akses data region lewat `guarded_write` / `guarded_read`:
//! acquire lock → cek versi → copy → release. Tidak reentrant.

use std::fs::File;
use std::io;
use std::ops::{DerefMut, Range};
use std::os::fd::FromRawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use memmap2::{MmapMut, MmapOptions};
use tracing::{trace, warn};

use super::semaphore::NamedSemaphore;
use crate::config::{SessionConfig, PROTOCOL_VERSION};
use crate::error::{Error, Result};

pub const VERSION_OFF: usize = 0;
/// Header dideklarasikan selebar 8 bytes dan divalidasi selebar 8 bytes juga.
pub const VERSION_LEN: usize = 8;
pub const DATA_OFF: usize = VERSION_OFF + VERSION_LEN;
pub const DEFAULT_REGION_LEN: usize = 1_024;

/// Kontrak buffer yang dibagi dengan renderer.
///
/// Offset selalu relatif terhadap awal data region, sama seperti offset yang
/// dikembalikan allocator remote.
pub trait SharedBuffer {
    /// Kapasitas data region dalam bytes
    fn data_len(&self) -> usize;

    fn guarded_write(&self, offset: usize, bytes: &[u8]) -> Result<()>;

    fn guarded_read(&self, offset: usize, len: usize) -> Result<Vec<u8>>;

    /// Post sinyal readiness ke renderer (at-least-once, boleh coalesce).
    fn signal_ready(&self) -> Result<()>;
}

impl<T: SharedBuffer + ?Sized> SharedBuffer for Arc<T> {
    fn data_len(&self) -> usize {
        (**self).data_len()
    }

    fn guarded_write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        (**self).guarded_write(offset, bytes)
    }

    fn guarded_read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        (**self).guarded_read(offset, len)
    }

    fn signal_ready(&self) -> Result<()> {
        (**self).signal_ready()
    }
}

/// Lock lintas process atas data region
pub trait RegionLock {
    fn acquire(&self) -> Result<()>;
    fn release(&self) -> Result<()>;
}

/// Sinyal satu arah client → renderer
pub trait ReadySignal {
    fn post(&self) -> Result<()>;
}

impl RegionLock for NamedSemaphore {
    fn acquire(&self) -> Result<()> {
        self.wait()
    }

    fn release(&self) -> Result<()> {
        self.post()
    }
}

impl ReadySignal for NamedSemaphore {
    fn post(&self) -> Result<()> {
        NamedSemaphore::post(self)
    }
}

/// Release lock saat keluar scope, termasuk jalur error.
struct HeldLock<'a, L: RegionLock> {
    lock: &'a L,
}

impl<'a, L: RegionLock> HeldLock<'a, L> {
    fn acquire(lock: &'a L) -> Result<Self> {
        lock.acquire()?;
        Ok(Self { lock })
    }
}

impl<L: RegionLock> Drop for HeldLock<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release() {
            warn!("failed to release region lock: {err}");
        }
    }
}

/// Shared buffer generik atas memory `M`, lock `L`, dan sinyal `S`.
pub struct Region<M, L, S> {
    memory: Mutex<M>,
    lock: L,
    ready: S,
    expected_version: u64,
    len: usize,
}

pub type ShmRegion = Region<MmapMut, NamedSemaphore, NamedSemaphore>;
pub type LocalRegion = Region<Vec<u8>, NoLock, ReadyCounter>;

impl<M, L, S> Region<M, L, S>
where
    M: DerefMut<Target = [u8]>,
    L: RegionLock,
    S: ReadySignal,
{
    /// Membungkus memory yang sudah berisi header. Versi tidak dicek di sini;
    /// pakai `verify_version` untuk cek awal.
    pub fn from_parts(memory: M, lock: L, ready: S, expected_version: u64) -> Result<Self> {
        let len = memory.len();
        if len <= DATA_OFF {
            return Err(Error::Config(format!(
                "region of {len} bytes has no data area after the header"
            )));
        }
        Ok(Self {
            memory: Mutex::new(memory),
            lock,
            ready,
            expected_version,
            len,
        })
    }

    /// Acquire lock dan cek header sekali, tanpa menyentuh data.
    pub fn verify_version(&self) -> Result<()> {
        self.with_locked(|_| Ok(()))
    }

    pub fn expected_version(&self) -> u64 {
        self.expected_version
    }

    fn data_range(&self, offset: usize, len: usize) -> Result<Range<usize>> {
        let capacity = self.len - DATA_OFF;
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(DATA_OFF + offset..DATA_OFF + end),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                capacity,
            }),
        }
    }

    /// Jalankan `f` atas seluruh mapping dengan lock dipegang dan versi valid.
    fn with_locked<T>(&self, f: impl FnOnce(&mut [u8]) -> Result<T>) -> Result<T> {
        let _held = HeldLock::acquire(&self.lock)?;
        let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);

        let found = read_version(&memory);
        if found != self.expected_version {
            return Err(Error::ProtocolVersionMismatch {
                expected: self.expected_version,
                found,
            });
        }

        f(&mut memory)
    }
}

impl<M, L, S> SharedBuffer for Region<M, L, S>
where
    M: DerefMut<Target = [u8]>,
    L: RegionLock,
    S: ReadySignal,
{
    fn data_len(&self) -> usize {
        self.len - DATA_OFF
    }

    fn guarded_write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        // Bounds dicek sebelum lock: tidak ada partial write.
        let range = self.data_range(offset, bytes.len())?;
        self.with_locked(|memory| {
            memory[range].copy_from_slice(bytes);
            Ok(())
        })?;
        trace!(offset, len = bytes.len(), "guarded write");
        Ok(())
    }

    fn guarded_read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let range = self.data_range(offset, len)?;
        self.with_locked(|memory| Ok(memory[range].to_vec()))
    }

    fn signal_ready(&self) -> Result<()> {
        self.ready.post()
    }
}

#[inline(always)]
fn read_version(memory: &[u8]) -> u64 {
    let mut header = [0u8; VERSION_LEN];
    header.copy_from_slice(&memory[VERSION_OFF..VERSION_OFF + VERSION_LEN]);
    u64::from_le_bytes(header)
}

impl ShmRegion {
    /// Buka shared memory dan kedua semaphore milik renderer.
    ///
    /// Gagal langsung kalau salah satu tidak bisa dibuka atau versi header
    /// tidak sama dengan versi yang dinegosiasikan.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        let ready = NamedSemaphore::open(&config.sem_ready_name)?;
        let lock = NamedSemaphore::open(&config.sem_lock_name)?;
        let file = open_shm(&config.shm_name)?;

        // SAFETY: object dibuka read/write; renderer menjamin ukurannya >= region_len
        let mmap = unsafe { MmapOptions::new().len(config.region_len).map_mut(&file)? };

        let region = Self::from_parts(mmap, lock, ready, config.protocol_version)?;
        region.verify_version()?;
        Ok(region)
    }
}

fn open_shm(name: &str) -> Result<File> {
    let c_name = std::ffi::CString::new(name)
        .map_err(|_| Error::Config(format!("shared memory name {name:?} contains a NUL byte")))?;

    // SAFETY: c_name valid selama call
    let fd = unsafe {
        libc::shm_open(
            c_name.as_ptr(),
            libc::O_RDWR,
            (libc::S_IRUSR | libc::S_IWUSR) as libc::mode_t,
        )
    };
    if fd < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }

    // SAFETY: fd baru dari shm_open, ownership pindah ke File
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Lock no-op untuk buffer in-process; eksklusi cukup dari `Mutex` internal.
#[derive(Debug, Default)]
pub struct NoLock;

impl RegionLock for NoLock {
    fn acquire(&self) -> Result<()> {
        Ok(())
    }

    fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// Sinyal readiness yang hanya menghitung jumlah post.
#[derive(Debug, Default)]
pub struct ReadyCounter(AtomicUsize);

impl ReadySignal for ReadyCounter {
    fn post(&self) -> Result<()> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl LocalRegion {
    /// Buffer in-process dengan header berisi `PROTOCOL_VERSION`.
    ///
    /// Dipakai untuk encode offline, benchmark, dan test tanpa renderer.
    pub fn new(region_len: usize) -> Result<Self> {
        Self::with_header(region_len, PROTOCOL_VERSION)
    }

    /// Seperti `new` tapi header diisi `header_version` (boleh beda dari yang diharapkan).
    pub fn with_header(region_len: usize, header_version: u64) -> Result<Self> {
        let mut memory = vec![0u8; region_len.max(VERSION_LEN)];
        memory[VERSION_OFF..VERSION_OFF + VERSION_LEN]
            .copy_from_slice(&header_version.to_le_bytes());
        Self::from_parts(memory, NoLock, ReadyCounter::default(), PROTOCOL_VERSION)
    }

    /// Jumlah `signal_ready` sejauh ini
    pub fn ready_count(&self) -> usize {
        self.ready.0.load(Ordering::Relaxed)
    }
}
