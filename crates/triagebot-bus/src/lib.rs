pub mod error;
pub mod pubsub;
pub mod publisher;
pub mod store;
pub mod topics;

pub use error::{BusError, Result};
pub use publisher::BusPublisher;
pub use pubsub::{PublishHandle, SubscribeHandle, Subscription};
pub use store::Store;
