//! IPC - 单管道多通道传输
//!
//! 一条物理管道承载多个命名通道，帧首元素为通道名

pub mod channel;
pub mod error;
pub mod frame;
pub mod pipe;
pub mod transport;

pub use channel::{Channel, ChannelHandler, Disposable};
pub use error::{IpcError, IpcResult};
pub use frame::{CommandEnvelope, ErrorPayload, Frame};
pub use pipe::{
    memory_pipe, FrameSink, FrameSource, JsonLinesSink, JsonLinesSource, MemorySink,
    MemorySource, PipeEnd,
};
pub use transport::{IpcTransport, TransportState};
