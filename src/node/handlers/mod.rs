//! Transport event handlers.

mod discovery;
mod dispatch;
mod forwarding;
mod gossip;
mod lifecycle;
mod timeout;
