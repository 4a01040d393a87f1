//! `mapfuse-middleware` – asynchronous plumbing around the mapping pipeline.
//!
//! Moves data between the pose source, the pipeline and observers without
//! caring about what the data means.
//!
//! # Modules
//!
//! - [`adapter`] – the [`PoseResolver`] seam the pipeline queries for poses.
//! - [`pose_buffer`] – in-process interpolating pose history implementing
//!   [`PoseResolver`] with a bounded wait.
//! - [`bus`] – topic-based publish/subscribe bus for map notifications,
//!   built on Tokio broadcast channels.

pub mod adapter;
pub mod bus;
pub mod pose_buffer;

pub use adapter::PoseResolver;
pub use bus::{EventBus, Topic, TopicReceiver};
pub use pose_buffer::PoseBuffer;
