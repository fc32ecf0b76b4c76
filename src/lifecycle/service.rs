//! Service seam for hosts
//!
//! Host integrations depend on [`LifecycleService`] rather than on the
//! concrete engine, and receive the instance explicitly.

use super::engine::{LifecycleEngine, TickReport};
use super::hooks::EntityHandle;
use super::phase::Band;
use super::state::EntitySnapshot;

/// The operations a host needs from a lifecycle engine.
pub trait LifecycleService: Send + Sync {
    /// Starts tracking `entity`. Returns `false` if already tracked.
    fn manage(&self, entity: &EntityHandle) -> bool;

    /// Stops tracking `entity`. Returns `false` if it was not tracked.
    fn unmanage(&self, entity: &EntityHandle) -> bool;

    /// Queues the Awake band.
    fn request_awake(&self, entity: &EntityHandle);

    /// Queues the Enable band.
    fn request_enable(&self, entity: &EntityHandle);

    /// Queues the Disable band.
    fn request_disable(&self, entity: &EntityHandle);

    /// Queues the Destroy band and runs it immediately when possible.
    fn request_destroy(&self, entity: &EntityHandle);

    /// Queues `band` for every tracked entity.
    fn request_all(&self, band: Band) -> usize;

    /// Runs one barrier pass.
    fn tick(&self) -> TickReport;

    /// Read-only projection of `entity`'s record.
    fn inspect(&self, entity: &EntityHandle) -> Option<EntitySnapshot>;
}

impl LifecycleService for LifecycleEngine {
    fn manage(&self, entity: &EntityHandle) -> bool {
        Self::manage(self, entity)
    }

    fn unmanage(&self, entity: &EntityHandle) -> bool {
        Self::unmanage(self, entity)
    }

    fn request_awake(&self, entity: &EntityHandle) {
        Self::request_awake(self, entity);
    }

    fn request_enable(&self, entity: &EntityHandle) {
        Self::request_enable(self, entity);
    }

    fn request_disable(&self, entity: &EntityHandle) {
        Self::request_disable(self, entity);
    }

    fn request_destroy(&self, entity: &EntityHandle) {
        Self::request_destroy(self, entity);
    }

    fn request_all(&self, band: Band) -> usize {
        Self::request_all(self, band)
    }

    fn tick(&self) -> TickReport {
        Self::tick(self)
    }

    fn inspect(&self, entity: &EntityHandle) -> Option<EntitySnapshot> {
        Self::inspect(self, entity)
    }
}
