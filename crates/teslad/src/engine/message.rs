//! Commands sent to the engine from its handles

use tokio::sync::oneshot;

use crate::error::Error;

/// Messages TO the engine (commands)
#[derive(Debug)]
pub enum EngineCommand {
    /// Turn a switch on or off; replies with the switch's believed state
    Switch {
        unique_name: String,
        on: bool,
        reply: oneshot::Sender<Result<bool, Error>>,
    },

    /// Poll every device now instead of waiting for the next tick
    Refresh { reply: oneshot::Sender<()> },
}
