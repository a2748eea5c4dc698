use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{stream_loop, StreamContext};

/// Owns the perception-channel worker task for one session.
pub(crate) struct StreamController {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl StreamController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel: None,
        }
    }

    pub fn start(&mut self, ctx: StreamContext, parent: &CancellationToken) -> Result<()> {
        if self.handle.is_some() {
            bail!("perception channel already streaming");
        }
        let cancel = parent.child_token();
        self.handle = Some(tokio::spawn(stream_loop(ctx, cancel.clone())));
        self.cancel = Some(cancel);
        Ok(())
    }

    /// Idempotent: safe to call any number of times, on any exit path.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("perception channel task failed to join")?;
        }
        Ok(())
    }
}
