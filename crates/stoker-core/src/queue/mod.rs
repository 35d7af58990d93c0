//! Queues connecting the controller and the workers.

mod dispatch;

pub use dispatch::DispatchQueue;
