//! Session configuration
//!
//! Endpoint renderer tidak pernah di-hardcode: runtime renderer menyuntikkan
//! nama socket, shared memory dan semaphore lewat environment sebelum spawn
//! process client.

use std::path::PathBuf;

use crate::core::{DATA_OFF, DEFAULT_REGION_LEN};
use crate::error::{Error, Result};

/// Versi protokol yang dimengerti client ini.
pub const PROTOCOL_VERSION: u64 = 1;

pub const ENV_PROTOCOL_VERSION: &str = "z71200_PROTOCOL_VERSION";
pub const ENV_SHM: &str = "z71200_SHM";
pub const ENV_SEM_LOCK: &str = "z71200_SEM_LOCK";
pub const ENV_SEM_READY: &str = "z71200_SEM_READY";
pub const ENV_SOCK: &str = "z71200_SOCK";
pub const ENV_SHM_LEN: &str = "z71200_SHM_LEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub protocol_version: u64,
    pub shm_name: String,
    pub sem_lock_name: String,
    pub sem_ready_name: String,
    pub socket_path: PathBuf,
    /// Panjang mapping dalam bytes, termasuk version header
    pub region_len: usize,
}

impl SessionConfig {
    /// Load dari environment process
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load dari sumber key/value apa saja (dipakai test tanpa menyentuh env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key).ok_or_else(|| Error::Config(format!("missing environment variable {key}")))
        };

        let raw_version = require(ENV_PROTOCOL_VERSION)?;
        let protocol_version: u64 = raw_version.trim().parse().map_err(|_| {
            Error::Config(format!("{ENV_PROTOCOL_VERSION} is not an integer: {raw_version:?}"))
        })?;
        if protocol_version != PROTOCOL_VERSION {
            return Err(Error::ProtocolVersionMismatch {
                expected: PROTOCOL_VERSION,
                found: protocol_version,
            });
        }

        let region_len = match lookup(ENV_SHM_LEN) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_SHM_LEN} is not an integer: {raw:?}"))
            })?,
            None => DEFAULT_REGION_LEN,
        };
        if region_len <= DATA_OFF {
            return Err(Error::Config(format!(
                "region length {region_len} leaves no room after the {DATA_OFF}-byte header"
            )));
        }

        Ok(Self {
            protocol_version,
            shm_name: require(ENV_SHM)?,
            sem_lock_name: require(ENV_SEM_LOCK)?,
            sem_ready_name: require(ENV_SEM_READY)?,
            socket_path: PathBuf::from(require(ENV_SOCK)?),
            region_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            (ENV_PROTOCOL_VERSION, "1"),
            (ENV_SHM, "/z71200_shm_42"),
            (ENV_SEM_LOCK, "/z71200_shm_42_sem_lock"),
            (ENV_SEM_READY, "/z71200_shm_42_sem_ready"),
            (ENV_SOCK, "/tmp/z71200_sock_42"),
        ])
    }

    #[test]
    fn test_from_lookup_defaults() {
        let vars = full_env();
        let config = SessionConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
        assert_eq!(config.shm_name, "/z71200_shm_42");
        assert_eq!(config.sem_lock_name, "/z71200_shm_42_sem_lock");
        assert_eq!(config.socket_path, PathBuf::from("/tmp/z71200_sock_42"));
        assert_eq!(config.region_len, DEFAULT_REGION_LEN);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut vars = full_env();
        vars.insert(ENV_PROTOCOL_VERSION.into(), "2".into());

        let err = SessionConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolVersionMismatch {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_missing_variable() {
        let mut vars = full_env();
        vars.remove(ENV_SOCK);

        let err = SessionConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(ENV_SOCK)));
    }

    #[test]
    fn test_region_len_override() {
        let mut vars = full_env();
        vars.insert(ENV_SHM_LEN.into(), "32768".into());
        let config = SessionConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.region_len, 32768);

        vars.insert(ENV_SHM_LEN.into(), "8".into());
        assert!(SessionConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }
}
