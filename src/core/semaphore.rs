//! Named POSIX semaphore
//!
//! Renderer membuat dua semaphore bernama sebelum spawn client:
//! - `sem_lock` (nilai awal 1): mutual exclusion atas data region
//! - `sem_ready` (nilai awal 0): sinyal "tree berubah, render ulang"
//!
//! Client hanya membuka yang sudah ada (tanpa `O_CREAT`).

use std::ffi::CString;
use std::io;

use crate::error::{Error, Result};

/// Handle ke semaphore yang dibuka dengan `sem_open`.
#[derive(Debug)]
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String,
}

// SAFETY: POSIX menjamin operasi semaphore thread-safe lewat handle yang sama;
// pointer ini tidak pernah di-dereference di sisi Rust.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Membuka semaphore yang sudah dibuat oleh renderer
    pub fn open(name: &str) -> Result<Self> {
        let c_name = CString::new(name)
            .map_err(|_| Error::Config(format!("semaphore name {name:?} contains a NUL byte")))?;

        // SAFETY: c_name valid sampai akhir fungsi
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), libc::O_RDWR) };
        if sem == libc::SEM_FAILED {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(Self {
            sem,
            name: name.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block sampai nilai semaphore > 0, lalu decrement. Tanpa timeout.
    pub fn wait(&self) -> Result<()> {
        loop {
            // SAFETY: sem berasal dari sem_open yang sukses dan belum di-close
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Io(err));
        }
    }

    pub fn post(&self) -> Result<()> {
        // SAFETY: lihat `wait`
        if unsafe { libc::sem_post(self.sem) } == 0 {
            Ok(())
        } else {
            Err(Error::Io(io::Error::last_os_error()))
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // Unlink adalah tanggung jawab renderer, client cukup close handle.
        // SAFETY: handle dari sem_open, di-close tepat sekali
        unsafe { libc::sem_close(self.sem) };
    }
}

#[cfg(test)]
impl NamedSemaphore {
    /// Nilai semaphore saat ini
    pub(crate) fn value(&self) -> i32 {
        let mut value: libc::c_int = 0;
        // SAFETY: sem valid, value adalah out-pointer lokal
        let rc = unsafe { libc::sem_getvalue(self.sem, &mut value) };
        assert_eq!(rc, 0, "sem_getvalue: {}", io::Error::last_os_error());
        value
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{unique_name, ScratchSemaphore};
    use super::*;

    #[test]
    fn test_wait_post_pairing() {
        let scratch = ScratchSemaphore::create("lock", 1);
        let sem = NamedSemaphore::open(&scratch.name).unwrap();
        assert_eq!(sem.name(), scratch.name);
        assert_eq!(sem.value(), 1);

        sem.wait().unwrap();
        assert_eq!(sem.value(), 0);
        sem.post().unwrap();
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn test_handles_share_one_semaphore() {
        let scratch = ScratchSemaphore::create("ready", 0);
        let client = NamedSemaphore::open(&scratch.name).unwrap();
        let renderer = NamedSemaphore::open(&scratch.name).unwrap();

        client.post().unwrap();
        assert_eq!(renderer.value(), 1);
        renderer.wait().unwrap();
        assert_eq!(client.value(), 0);
    }

    #[test]
    fn test_open_missing_semaphore_fails() {
        let err = NamedSemaphore::open(&unique_name("missing")).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_name_with_nul_is_config_error() {
        assert!(matches!(
            NamedSemaphore::open("/bad\0name"),
            Err(Error::Config(_))
        ));
    }
}
