//! Network Layer: control socket ke renderer
//!
//! - Framing `u32 LE` + JSON di atas Unix stream socket
//! - `ask` sinkron dengan event yang tertunda tetap diantrikan
//! - mio untuk readiness pada receive loop

mod channel;
mod frame;
mod message;
mod readiness;

pub use channel::Channel;
pub use frame::{FrameStream, LEN_PREFIX, MAX_FRAME_LEN};
pub use message::{Inbound, Outbound};
pub use readiness::Readiness;
