// In-process event transport for the media bridge

pub mod emitter;

pub use emitter::{LocalEmitter, MAX_EVENTS_PER_PUMP};
