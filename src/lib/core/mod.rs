pub mod config;
pub mod error;
pub mod ingest;
pub mod message;
pub mod queue;
pub mod reader;
pub mod stats;
pub mod transmitter;
pub mod writer;

pub use config::*;
pub use error::*;
pub use ingest::*;
pub use message::*;
pub use queue::*;
pub use reader::*;
pub use stats::*;
pub use transmitter::*;
pub use writer::WriterHandle;

use tokio::sync::watch;

/// Resolves once the flag turns true or its sender is dropped.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
