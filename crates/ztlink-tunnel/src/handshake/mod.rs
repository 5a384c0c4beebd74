//! Per-hop handshake disguised as a websocket upgrade.
//!
//! ```text
//! initiator                                   responder
//!   GET /secretLink + X-Chains, X-ClientCert  ->
//!                                            <-  101 + X-ServerCert
//!   serverCaReady                             ->
//!   tunnel bytes                             <->
//! ```

mod initiator;
mod responder;

pub use initiator::initiate;
pub use responder::{await_readiness, read_upgrade_request, respond, write_upgrade_response, UpgradeRequest};
