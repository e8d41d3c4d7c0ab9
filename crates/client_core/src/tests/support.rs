//! Scripted in-memory collaborator for controller tests.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::{error::FetchFailure, remote::RemoteAccess};

pub(crate) type Reply = Result<Value, FetchFailure>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

enum Scripted {
    Ready(Reply),
    Gated {
        started: oneshot::Sender<()>,
        release: oneshot::Receiver<Reply>,
    },
}

/// Holds a scripted reply until the test releases it.
pub(crate) struct Gate {
    pub started: oneshot::Receiver<()>,
    pub release: oneshot::Sender<Reply>,
}

/// Replies are consumed in FIFO order regardless of method or path. A call
/// with nothing scripted fails.
#[derive(Default)]
pub(crate) struct ScriptedRemote {
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<VecDeque<Scripted>>,
}

impl ScriptedRemote {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) async fn push_ok(&self, body: Value) {
        self.replies.lock().await.push_back(Scripted::Ready(Ok(body)));
    }

    pub(crate) async fn push_failure(&self, reason: &str) {
        self.replies
            .lock()
            .await
            .push_back(Scripted::Ready(Err(failure(reason))));
    }

    pub(crate) async fn push_gated(&self) -> Gate {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.replies.lock().await.push_back(Scripted::Gated {
            started: started_tx,
            release: release_rx,
        });
        Gate {
            started: started_rx,
            release: release_tx,
        }
    }

    pub(crate) async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    async fn respond(&self, method: &'static str, path: &str, body: Option<Value>) -> Reply {
        self.calls.lock().await.push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });
        let next = self.replies.lock().await.pop_front();
        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated { started, release }) => {
                let _ = started.send(());
                release
                    .await
                    .unwrap_or_else(|_| Err(FetchFailure::new(method, path, "gate dropped")))
            }
            None => Err(FetchFailure::new(method, path, "no scripted reply")),
        }
    }
}

#[async_trait]
impl RemoteAccess for ScriptedRemote {
    async fn get(&self, path: &str) -> Reply {
        self.respond("GET", path, None).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Reply {
        self.respond("POST", path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> Reply {
        self.respond("PUT", path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Reply {
        self.respond("DELETE", path, None).await
    }
}

pub(crate) fn failure(reason: &str) -> FetchFailure {
    FetchFailure::new("TEST", "/", reason)
}

pub(crate) fn vehicle_json(id: i64, company: &str, model: &str, kms: u64) -> Value {
    json!({
        "id": id,
        "company": company,
        "model": model,
        "color": "Silver",
        "kms": kms,
        "year": 2020,
        "available": true
    })
}
