use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::{Message, NewMessage};

use super::{Scan, Storage, keys};

#[derive(Default)]
struct Collection {
    sequence: u64,
    entries: BTreeMap<String, Vec<u8>>,
}

/// In-process store with the same ordering and sequencing rules as the
/// SQLite one. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Collection>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail, as a broken disk would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store raw bytes under `key`, bypassing message encoding.
    pub async fn insert_raw(&self, key: &str, value: &[u8]) {
        let mut inner = self.inner.write().await;
        inner.entries.insert(key.to_string(), value.to_vec());
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("memory store marked unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert_message(&self, msg: NewMessage, time: DateTime<Utc>, id: Uuid) -> Result<Message> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        let sequence = inner.sequence + 1;
        let message = Message::stamp(msg, keys::encode_key(time, sequence), time, id);
        let value = serde_json::to_vec(&message)?;
        inner.sequence = sequence;
        inner.entries.insert(message.sequence.clone(), value);
        Ok(message)
    }

    async fn remove_oldest(&self, count: usize) -> Result<usize> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        while removed < count && inner.entries.pop_first().is_some() {
            removed += 1;
        }
        Ok(removed)
    }

    async fn scan(&self, visit: &mut (dyn for<'a> FnMut(&'a str, &'a [u8]) -> Scan + Send)) -> Result<usize> {
        let inner = self.inner.read().await;
        for (key, value) in inner.entries.iter() {
            if visit(key, value) == Scan::Stop {
                break;
            }
        }
        Ok(inner.entries.len())
    }
}
