//! Lifecycle orchestration engine
//!
//! Managed entities request phase transitions at any time; the engine
//! executes them in deterministic barriers when the host calls
//! [`LifecycleEngine::tick`]:
//!
//! - [`phase`]: ranked phases, bands and the operation table
//! - [`state`]: per-entity record and guard evaluation
//! - [`queue`]: the four request queues and their cancellation rules
//! - [`invoker`]: the single hook invocation funnel
//! - [`fault`]: fault reports and sinks
//! - [`engine`]: registry, barrier drain and immediate destroy
//! - [`service`]: the trait hosts depend on

pub mod engine;
pub mod fault;
pub mod hooks;
pub mod invoker;
pub mod phase;
pub mod queue;
pub mod service;
pub mod state;

pub use engine::{LifecycleEngine, StepRecord, TickReport};
pub use fault::{FanOutSink, FaultReport, FaultSink, TracingFaultSink};
pub use hooks::{EntityHandle, HookContext, HookFn, Managed, PhaseHooks};
pub use invoker::HookOutcome;
pub use phase::{Band, Operation, Phase};
pub use queue::EntityKey;
pub use service::LifecycleService;
pub use state::{EntitySnapshot, FaultRecord, SkipReason};
