/*
[INPUT]:  Task channel URLs, reconnect policy, message handlers
[OUTPUT]: Real-time task progress and system notices
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding message types or changing connection logic
*/

pub mod client;
pub mod message;

pub use client::{
    ChannelClosed, ChannelError, ChannelHandler, ChannelState, LiveChannel, ReconnectPolicy,
};
pub use message::{ChannelMessage, LogLine};
