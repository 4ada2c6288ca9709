//! The search service: an actor that owns the index worker and correlates
//! its responses with callers.
//!
//! Callers hold a cloneable [`SearchService`] handle. Every operation is sent
//! to the actor as a [`protocol::ServiceEvent`]; the actor starts the worker on
//! demand, registers the request as pending before forwarding it, and routes
//! worker responses back by request id. Pending bookkeeping and status are
//! only ever touched from the actor's own loop.

mod actor;
mod handle;
mod protocol;

pub use handle::SearchService;
