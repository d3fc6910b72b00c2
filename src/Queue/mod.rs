mod builder;
mod queue;

pub use builder::QueueBuilder;
pub use queue::EventQueue;

pub mod Ring {
    pub mod Ring;
    pub mod Ring_impl;
    pub mod layout;
    pub use Ring::{Push, RingBuffer, RECORD_HEADER}; // re-export for stable path
}

pub mod Structs {
    pub mod Queue_Structs;
    pub use Queue_Structs::{DequeueResult, EnqueueResult, QueueStats}; // re-export for stable path
}
