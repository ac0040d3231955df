//! Core library for the Asterisk ARI / AudioSocket telephony bridge.
//!
//! Places outbound SIP calls through Asterisk's REST Interface (ARI),
//! attaches a raw audio stream to the call over AudioSocket, and relays
//! audio bidirectionally, in real time, to an OpenAI-style Realtime
//! WebSocket session. The caller can interrupt the agent mid-sentence
//! (barge-in).
//!
//! # Architecture
//!
//! - [`call`]: call data model, lifecycle state machine, orchestrator, media
//!   session, and the persistence collaborator trait
//! - [`ari`]: Asterisk REST Interface client and events WebSocket consumer
//! - [`audiosocket`]: AudioSocket wire codec and TCP server
//! - [`realtime`]: the Realtime API WebSocket session
//! - [`audio`]: α-law/PCM16 codec, resampling, and paced pipeline delivery
//! - [`bootstrap`]: the composition root wiring all of the above together
//! - [`config`]: configuration loading (file, env, CLI)
//! - [`events`]: observability event system for the ambient health surface
//! - [`error`]: centralized error types
//! - [`api`]: the ambient `GET /health` surface

#![warn(clippy::all)]

pub mod api;
pub mod ari;
pub mod audio;
pub mod audiosocket;
pub mod bootstrap;
pub mod call;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod realtime;

pub use bootstrap::{bind_audiosocket_server, bootstrap_services, BootstrappedServices};
pub use call::{Call, CallManager, CallState, CallStore, InMemoryCallStore};
pub use config::Config;
pub use error::{BridgeError, BridgeResult, ErrorCode};
pub use events::{BroadcastEvent, BroadcastEventBridge, EventEmitter};
