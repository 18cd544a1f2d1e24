//! The file processing pipeline.
//!
//! A raw inbound message is classified ([`Inbound`]), normalized into an
//! [`IngestionEvent`] and handed to the [`Dispatcher`], which runs it
//! through acquisition, classification, integrity checking (and repair),
//! fingerprinting and persistence, then fans the result out to the routing
//! keys configured for the file's type ([`Routes`]) through a [`Publisher`].

mod dispatcher;
pub mod error;
mod event;
mod integrity;
mod message;
mod publish;
mod routing;
mod scratch;

pub use crate::dispatcher::{Context, Dispatcher, Outcome};
pub use crate::event::{Action, IngestionEvent};
pub use crate::message::{Inbound, MessageRules};
pub use crate::publish::{DeletedMessage, Outbound, ProcessedMessage, Publisher};
pub use crate::routing::Routes;
