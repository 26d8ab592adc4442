// Module naming follows project convention (MPMC = Multi-Producer Multi-Consumer)
#[allow(non_snake_case)]
pub mod Core {
    pub mod futex;
    pub mod sequence;
    pub mod trace;
    pub use sequence::{minimum_sequence, Sequence, INITIAL_CURSOR_VALUE}; // re-export for stable path
    pub use trace::init_tracing;
}
#[allow(non_snake_case)]
pub mod MPMC;
#[allow(non_snake_case)]
pub mod Proxy;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}
pub mod error;

pub use error::{DisruptorError, EventError, ProxyError, RewindableError};
