pub mod config;
pub mod dsp;
pub mod frame;
pub mod pipeline;
pub mod protocol;
pub mod queue;
pub mod util;
