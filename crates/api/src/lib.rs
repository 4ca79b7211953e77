//! HTTP surface for the IndexNow dispatch queue.
//!
//! Endpoints:
//! - GET  /health: liveness plus whether submissions are enabled
//! - POST /api/indexnow: queue URLs for submission (fire-and-forget)
//! - GET  /api/indexnow/status: pending-set diagnostics
//! - GET  /{key}.txt: IndexNow key file proving ownership of the host

pub mod routes;
pub mod state;
