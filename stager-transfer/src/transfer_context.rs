use crate::{TransferManager, TransferResult, TransferWorkType};
use std::sync::Arc;

/// Builder state for a slot that has no manager yet
pub struct SlotEmpty;

/// Builder state for a slot that has been given its manager
pub struct SlotFilled(Arc<TransferManager>);

pub trait TransferSlot {
    fn into_manager(self) -> Option<Arc<TransferManager>>;
}

impl TransferSlot for SlotEmpty {
    fn into_manager(self) -> Option<Arc<TransferManager>> {
        None
    }
}

impl TransferSlot for SlotFilled {
    fn into_manager(self) -> Option<Arc<TransferManager>> {
        Some(self.0)
    }
}

/// Collects the transfer managers for each work type. Each slot can be filled once, and the
/// graphics slot must be filled before the context can be built:
///
/// ```compile_fail
/// # use stager_transfer::*;
/// # fn f(a: std::sync::Arc<TransferManager>, b: std::sync::Arc<TransferManager>) {
/// let builder = TransferContextBuilder::new()
///     .with_graphics(a)
///     .unwrap()
///     .with_graphics(b);
/// # }
/// ```
pub struct TransferContextBuilder<G, P> {
    graphics: G,
    physics: P,
}

impl Default for TransferContextBuilder<SlotEmpty, SlotEmpty> {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferContextBuilder<SlotEmpty, SlotEmpty> {
    pub fn new() -> Self {
        TransferContextBuilder {
            graphics: SlotEmpty,
            physics: SlotEmpty,
        }
    }
}

fn check_work_type(
    transfer_manager: &TransferManager,
    work_type: TransferWorkType,
) -> TransferResult<()> {
    if transfer_manager.work_type() != work_type {
        return Err(format!(
            "{} handles {:?} work and cannot fill the {:?} slot",
            transfer_manager.identifier(),
            transfer_manager.work_type(),
            work_type
        )
        .into());
    }

    Ok(())
}

impl<P> TransferContextBuilder<SlotEmpty, P> {
    pub fn with_graphics(
        self,
        transfer_manager: Arc<TransferManager>,
    ) -> TransferResult<TransferContextBuilder<SlotFilled, P>> {
        check_work_type(&transfer_manager, TransferWorkType::Graphics)?;
        Ok(TransferContextBuilder {
            graphics: SlotFilled(transfer_manager),
            physics: self.physics,
        })
    }
}

impl<G> TransferContextBuilder<G, SlotEmpty> {
    pub fn with_physics(
        self,
        transfer_manager: Arc<TransferManager>,
    ) -> TransferResult<TransferContextBuilder<G, SlotFilled>> {
        check_work_type(&transfer_manager, TransferWorkType::Physics)?;
        Ok(TransferContextBuilder {
            graphics: self.graphics,
            physics: SlotFilled(transfer_manager),
        })
    }
}

impl<P: TransferSlot> TransferContextBuilder<SlotFilled, P> {
    pub fn build(self) -> TransferContext {
        TransferContext {
            graphics: self.graphics.0,
            physics: self.physics.into_manager(),
        }
    }
}

/// The transfer managers available to consumers, one per work type. Pass this (or a clone) to
/// anything that uploads resources.
#[derive(Clone, Debug)]
pub struct TransferContext {
    graphics: Arc<TransferManager>,
    physics: Option<Arc<TransferManager>>,
}

impl TransferContext {
    pub fn builder() -> TransferContextBuilder<SlotEmpty, SlotEmpty> {
        TransferContextBuilder::new()
    }

    pub fn graphics(&self) -> &Arc<TransferManager> {
        &self.graphics
    }

    pub fn physics(&self) -> Option<&Arc<TransferManager>> {
        self.physics.as_ref()
    }

    pub fn transfer_manager(
        &self,
        work_type: TransferWorkType,
    ) -> Option<&Arc<TransferManager>> {
        match work_type {
            TransferWorkType::Graphics => Some(&self.graphics),
            TransferWorkType::Physics => self.physics.as_ref(),
        }
    }

    /// Terminate every manager in the context
    pub fn terminate(&self) {
        self.graphics.terminate();
        if let Some(physics) = &self.physics {
            physics.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransferManagerDef;
    use stager_api::{StagerBufferDef, StagerDeviceContext, StagerHeadlessDeviceDef};

    fn create_manager(
        device_context: &StagerDeviceContext,
        work_type: TransferWorkType,
    ) -> Arc<TransferManager> {
        Arc::new(
            TransferManager::new(
                device_context,
                &TransferManagerDef {
                    work_type,
                    identifier: format!("{:?}TransferManager", work_type),
                    ..Default::default()
                },
            )
            .unwrap(),
        )
    }

    fn create_device() -> StagerDeviceContext {
        let _ = env_logger::builder().is_test(true).try_init();
        StagerDeviceContext::new_headless(&StagerHeadlessDeviceDef::default()).unwrap()
    }

    #[test]
    fn test_graphics_only_context() {
        let device_context = create_device();
        let transfer_context = TransferContext::builder()
            .with_graphics(create_manager(&device_context, TransferWorkType::Graphics))
            .unwrap()
            .build();

        assert_eq!(
            transfer_context.graphics().work_type(),
            TransferWorkType::Graphics
        );
        assert!(transfer_context.physics().is_none());
        assert!(transfer_context
            .transfer_manager(TransferWorkType::Physics)
            .is_none());
    }

    #[test]
    fn test_slots_can_be_filled_in_any_order() {
        let device_context = create_device();
        let transfer_context = TransferContextBuilder::new()
            .with_physics(create_manager(&device_context, TransferWorkType::Physics))
            .unwrap()
            .with_graphics(create_manager(&device_context, TransferWorkType::Graphics))
            .unwrap()
            .build();

        assert_eq!(
            transfer_context
                .transfer_manager(TransferWorkType::Physics)
                .unwrap()
                .identifier(),
            "PhysicsTransferManager"
        );

        transfer_context.terminate();
        assert!(!transfer_context.graphics().usable());
        assert!(!transfer_context.physics().unwrap().usable());
    }

    #[test]
    fn test_mismatched_work_type_is_rejected() {
        let device_context = create_device();
        let result = TransferContext::builder()
            .with_graphics(create_manager(&device_context, TransferWorkType::Physics));
        assert!(result.is_err());
    }

    #[test]
    fn test_shared_context_uploads_from_many_threads() {
        const THREAD_COUNT: usize = 4;

        let device_context = create_device();
        let transfer_context = TransferContext::builder()
            .with_graphics(create_manager(&device_context, TransferWorkType::Graphics))
            .unwrap()
            .build();

        let threads: Vec<_> = (0..THREAD_COUNT)
            .map(|i| {
                let transfer_context = transfer_context.clone();
                let device_context = device_context.clone();
                std::thread::spawn(move || {
                    let buffer = device_context
                        .create_buffer(&StagerBufferDef::for_device_vertex_buffer(64))
                        .unwrap();
                    let data = vec![i as u8; 64];
                    transfer_context
                        .graphics()
                        .upload_to_buffer(&buffer, &data, 0)
                        .unwrap();
                    buffer.headless_buffer().unwrap().read_contents() == data
                })
            })
            .collect();

        for thread in threads {
            assert!(thread.join().unwrap());
        }

        assert_eq!(transfer_context.graphics().statistics().locked_count(), 0);
    }
}
