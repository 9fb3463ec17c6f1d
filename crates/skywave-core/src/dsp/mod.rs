pub mod agc;
pub mod blanker;
pub mod gate;
pub mod jitter;
pub mod playout;
