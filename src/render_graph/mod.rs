//! Building blocks of the frame graph.
//!
//! Every intermediate image lives in a [`TargetPool`] and is named by a [`TargetId`].
//! Passes never own their targets; a frame is described as a [`FramePlan`] of
//! [`PassRecord`]s listing which ids each pass samples and which it writes, and the
//! history buffers are [`PingPong`] pairs of ids:
//!
//! ```text
//!   +------------+ reads +--------------+ writes +------------+
//!   | TargetPool |------>|  PassRecord  |------->| TargetPool |
//!   +------------+       +--------------+        +------------+
//!          ^                                           |
//!          +------------ PingPong::flip <--------------+
//! ```
//!
//! Screen-space stages are drawn with a [`FullscreenPass`].

mod fullscreen;
mod pass_ledger;
mod ping_pong;
mod render_target;

pub use fullscreen::{FullscreenPass, PassInput};
pub use pass_ledger::{FramePlan, PassKind, PassRecord};
pub use ping_pong::{PingPong, Slot};
pub use render_target::{
    Downsampling, RenderTarget, Resolution, TargetDesc, TargetId, TargetPool, TargetScale,
};
