use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::models::DispatchJob;
use crate::rate_limit::Throttle;
use crate::relay::ChatBackend;

// app's shared state
pub struct AppState {
    pub throttle: Arc<Throttle>, // gates every notification email
    pub dispatch_tx: mpsc::Sender<DispatchJob>, // queue into the mail worker
    pub chat: Arc<dyn ChatBackend>,
    pub first_token_timeout: Duration, // how long a chat turn may wait for the LLM
}
