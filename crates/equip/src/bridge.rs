//! Public entry point wiring the channel, executor and broadcaster.

use std::sync::Arc;

use equip_doc::{DocHandle, RaiseOutcome, WorldError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::broadcast::{ResultBroadcaster, Subscription};
use crate::catalog::ProfileCatalog;
use crate::channel::{PendingSlot, RequestChannel};
use crate::config::{ConfigError, EquipConfig};
use crate::executor::{ExecutorState, MutationExecutor, PlacementSampler, StateCell};
use crate::factory::EntityFactory;
use crate::model::{EquipmentRequest, EquipmentResult};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to register executor: {0}")]
    World(#[from] WorldError),
}

/// Creation bridge bound to one document worker.
///
/// Cheap to share behind an `Arc`; `submit` may be called from any thread
/// or task. Dropping the bridge unregisters its executor from the worker.
#[derive(Debug)]
pub struct EquipmentBridge {
    channel: RequestChannel,
    broadcaster: Arc<ResultBroadcaster>,
    state: StateCell,
    catalog: Arc<ProfileCatalog>,
}

impl EquipmentBridge {
    /// Register an executor on the worker behind `handle`.
    pub fn install(handle: &DocHandle, config: &EquipConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let catalog = Arc::new(config.catalog()?);

        let slot = PendingSlot::new();
        let broadcaster = Arc::new(ResultBroadcaster::new());
        let sampler = PlacementSampler::new(config.placement.max_offset, config.placement.seed);

        let executor = MutationExecutor::new(
            slot.clone(),
            EntityFactory::new(catalog.clone()),
            broadcaster.clone(),
            sampler,
        )
        .with_transaction_name(config.transaction.name.clone());
        let state = executor.state_cell();

        let event = handle.register_handler(Box::new(executor))?;
        info!(
            "Equipment bridge installed (transaction {:?})",
            config.transaction.name
        );

        Ok(Self {
            channel: RequestChannel::new(slot, Box::new(event)),
            broadcaster,
            state,
            catalog,
        })
    }

    /// Queue a request, replacing any that has not run yet.
    pub fn submit(&self, request: EquipmentRequest) -> RaiseOutcome {
        self.channel.submit(request)
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EquipmentResult) + Send + Sync + 'static,
    {
        self.broadcaster.subscribe(callback)
    }

    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<EquipmentResult>) {
        self.broadcaster.subscribe_channel()
    }

    pub fn state(&self) -> ExecutorState {
        self.state.get()
    }

    /// Whether a submitted request has not been picked up yet.
    pub fn is_pending(&self) -> bool {
        self.channel.is_pending()
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    pub fn broadcaster(&self) -> &Arc<ResultBroadcaster> {
        &self.broadcaster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EquipmentType;
    use equip_doc::{Document, DocumentWorld, ElementId, ParameterBindings};

    fn world() -> DocumentWorld {
        DocumentWorld::with_document(Document::with_bindings(ParameterBindings::electrical()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_and_receive() {
        let world = world();
        let handle = world.handle();
        let bridge = EquipmentBridge::install(&handle, &EquipConfig::default()).unwrap();
        let (_subscription, mut rx) = bridge.subscribe_channel();

        let outcome = bridge.submit(EquipmentRequest::new(EquipmentType::Generator, "GEN-1"));
        assert_ne!(outcome, RaiseOutcome::Disposed);

        let result = rx.recv().await.unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "Created GEN-1 with electrical parameters");

        let element = handle
            .element(ElementId(result.element_id.unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(element.name, "GEN-1");
        assert!(bridge.state().is_idle());
        assert!(!bridge.is_pending());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let world = world();
        // The second bound is finite but its sampled span is not
        for offset in [f64::INFINITY, 1.7e308] {
            let mut config = EquipConfig::default();
            config.placement.max_offset = offset;

            let err = EquipmentBridge::install(&world.handle(), &config).unwrap_err();
            assert!(matches!(
                err,
                BridgeError::Config(ConfigError::InvalidOffset(_))
            ));
        }
    }

    #[test]
    fn test_submit_after_shutdown_is_disposed() {
        let world = world();
        let bridge = EquipmentBridge::install(&world.handle(), &EquipConfig::default()).unwrap();
        world.shutdown();

        let outcome = bridge.submit(EquipmentRequest::with_default_name(EquipmentType::Ups));
        assert_eq!(outcome, RaiseOutcome::Disposed);
    }
}
