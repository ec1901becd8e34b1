//! shmui - client untuk renderer UI split-process
//!
//! Arsitektur:
//! - Shared memory: tree UI di-encode sebagai tagged word di data region
//! - Control socket: alokasi remote (`ask`) dan event interaksi
//! - Satu lock untuk setiap guarded write/read, sinyal ready terpisah
//! - Text cell: konten yang bisa di-update tanpa encode ulang tree
//!
//! ```no_run
//! use shmui::protocol::{px, Color, Div, Text};
//! use shmui::{callback, Session};
//!
//! # fn main() -> shmui::Result<()> {
//! let mut session = Session::from_env()?;
//! let label = session.text_cell("0")?;
//! let tree = Div::new()
//!     .width(px(200.0))
//!     .height(px(200.0))
//!     .background(Color::rgb("336699")?)
//!     .on_click(callback(|_| Ok(())))
//!     .child(Text::new(px(8.0), px(8.0), &label));
//! session.mount(&tree)?;
//! session.run()
//! # }
//! ```

pub mod allocator;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod network;
pub mod protocol;
pub mod session;
pub mod text;

pub use allocator::Allocator;
pub use config::{SessionConfig, PROTOCOL_VERSION};
pub use error::{Error, Result};
pub use events::{callback, Callback, CallbackRegistry, EventId};
pub use session::Session;
pub use text::TextCell;
