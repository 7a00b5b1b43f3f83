mod dispatch_queue;

pub use dispatch_queue::{DeadlineEvent, Dispatch, DispatchQueue, Resolved};
