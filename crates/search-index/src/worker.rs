//! Dedicated indexing thread.
//!
//! The worker owns one [`IndexEngine`] and processes requests strictly in
//! arrival order. Responses are tagged with the generation the worker was
//! started for, so the service can discard answers from a worker it has
//! already replaced.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::engine::IndexEngine;
use crate::error::{IndexError, Result};
use crate::protocol::{IndexRequest, IndexResponse};

/// A response together with the generation of the worker that produced it.
#[derive(Debug)]
pub struct WorkerEnvelope {
    pub generation: u64,
    pub response: IndexResponse,
}

/// Handle to a running worker thread. The thread stops once every request
/// sender has been dropped.
#[derive(Debug)]
pub struct IndexWorker {
    generation: u64,
    join_handle: JoinHandle<()>,
}

impl IndexWorker {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

/// Starts a worker thread serving `requests`.
pub fn spawn_index_worker(
    generation: u64,
    requests: mpsc::Receiver<IndexRequest>,
    responses: mpsc::Sender<WorkerEnvelope>,
) -> Result<IndexWorker> {
    let mut engine = IndexEngine::new();
    spawn_worker_with(generation, requests, responses, move |request| {
        engine.handle(request)
    })
}

fn spawn_worker_with<H>(
    generation: u64,
    mut requests: mpsc::Receiver<IndexRequest>,
    responses: mpsc::Sender<WorkerEnvelope>,
    mut handler: H,
) -> Result<IndexWorker>
where
    H: FnMut(IndexRequest) -> IndexResponse + Send + 'static,
{
    let join_handle = thread::Builder::new()
        .name(format!("search-index-worker-{generation}"))
        .spawn(move || {
            log::debug!("index worker {generation} started");

            while let Some(request) = requests.blocking_recv() {
                let Some(response) = handle_request(&mut handler, request) else {
                    continue;
                };
                let envelope = WorkerEnvelope {
                    generation,
                    response,
                };
                if responses.blocking_send(envelope).is_err() {
                    log::debug!("index worker {generation} response channel closed");
                    break;
                }
            }

            log::debug!("index worker {generation} stopped");
        })
        .map_err(|error| IndexError::Internal(format!("failed to spawn index worker: {error}")))?;

    Ok(IndexWorker {
        generation,
        join_handle,
    })
}

/// Runs one request, containing any panic to that request alone.
fn handle_request<H>(handler: &mut H, request: IndexRequest) -> Option<IndexResponse>
where
    H: FnMut(IndexRequest) -> IndexResponse,
{
    let kind = request.kind();
    let request_id = request.request_id();

    match panic::catch_unwind(AssertUnwindSafe(|| handler(request))) {
        Ok(response) => Some(response),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|message| (*message).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!(
                "index worker fault while handling {kind} (request {request_id:?}): {message}"
            );
            None
        }
    }
}
