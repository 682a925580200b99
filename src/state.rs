use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::engine::queue::BroadcastRequest;
use crate::live::ChannelRegistry;
use crate::notify::MailSender;
use crate::observability::metrics::Metrics;
use crate::store::MemoryStore;

pub struct AppState {
    pub config: Config,
    pub store: MemoryStore,
    pub registry: ChannelRegistry,
    pub mailer: Arc<dyn MailSender>,
    pub broadcast_tx: mpsc::Sender<BroadcastRequest>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: Config,
        mailer: Arc<dyn MailSender>,
    ) -> (Self, mpsc::Receiver<BroadcastRequest>) {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_queue_size);
        let registry = ChannelRegistry::new(config.live_channel_capacity);

        (
            Self {
                config,
                store: MemoryStore::new(),
                registry,
                mailer,
                broadcast_tx,
                metrics: Metrics::new(),
            },
            broadcast_rx,
        )
    }
}
