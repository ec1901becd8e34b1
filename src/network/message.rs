//! Pesan control channel (JSON di dalam frame)
//!
//! Client → renderer: `{"kind":"ask","fn":..,"args":{..}}`.
//! Renderer → client: `return`/`error` sebagai reply ask, `event` kapan saja.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outbound {
    Ask {
        #[serde(rename = "fn")]
        function: String,
        args: Value,
    },
}

impl Outbound {
    pub fn ask(function: impl Into<String>, args: Value) -> Self {
        Outbound::Ask {
            function: function.into(),
            args,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Inbound {
    Return {
        #[serde(rename = "return", default)]
        value: Value,
    },
    Error {
        #[serde(default)]
        error: String,
    },
    /// Field lain di event (posisi mouse dsb.) diabaikan.
    Event {
        #[serde(default)]
        evt_id: Option<u64>,
    },
    #[serde(other)]
    Unknown,
}

impl Inbound {
    /// Decode satu payload. JSON valid tanpa `kind` string menjadi `Unknown`,
    /// sama seperti `kind` yang tidak dikenal; hanya bytes non-JSON yang error.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(payload)?;
        if !value.get("kind").is_some_and(Value::is_string) {
            warn!(message = %value, "message without kind, ignoring");
            return Ok(Inbound::Unknown);
        }
        Ok(serde_json::from_value(value)?)
    }

    #[inline(always)]
    pub fn is_reply(&self) -> bool {
        matches!(self, Inbound::Return { .. } | Inbound::Error { .. })
    }
}
