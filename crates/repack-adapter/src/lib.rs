/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public repack adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod notify;
mod preview;
pub mod types;
pub mod ws;

// Re-export commonly used types from http
pub use http::{ClientConfig, RepackClient, RepackError, Result};

// Re-export notification seam
pub use notify::{NoticeLevel, Notifier, StorageWarning, TracingNotifier};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    ChannelClosed, ChannelError, ChannelHandler, ChannelMessage, ChannelState, LiveChannel,
    LogLine, ReconnectPolicy,
};
