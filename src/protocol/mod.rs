//! Outbound light-command protocol and publish capability

mod messages;
mod publisher;

pub use messages::*;
pub use publisher::{ChannelPublisher, OutboundMessage, PublishError, Publisher};
