use super::{StagerCommandBufferHeadless, StagerQueueHeadless};
use crate::{StagerCommandPoolDef, StagerResult};

#[derive(Debug)]
pub struct StagerCommandPoolHeadless {
    queue: StagerQueueHeadless,
    transient: bool,
}

impl StagerCommandPoolHeadless {
    pub(super) fn new(
        queue: &StagerQueueHeadless,
        command_pool_def: &StagerCommandPoolDef,
    ) -> StagerResult<Self> {
        Ok(StagerCommandPoolHeadless {
            queue: queue.clone(),
            transient: command_pool_def.transient,
        })
    }

    pub fn queue(&self) -> &StagerQueueHeadless {
        &self.queue
    }

    pub fn transient(&self) -> bool {
        self.transient
    }

    pub fn create_command_buffer(&self) -> StagerResult<StagerCommandBufferHeadless> {
        Ok(StagerCommandBufferHeadless::new(&self.queue))
    }
}
