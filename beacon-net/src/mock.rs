//! Mock HTTP client for testing
//!
//! Records every request it is asked to send. A scripted responder answers
//! synchronously; requests it declines stay pending until completed or
//! cancelled by the test.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::http::{HttpClient, HttpRequest, HttpResponse, HttpResponseCallback, HttpResult};

type Responder = Box<dyn Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync>;

#[derive(Default)]
struct MockState {
    sent: Vec<HttpRequest>,
    pending: HashMap<String, HttpResponseCallback>,
}

/// Mock HTTP client without real networking
#[derive(Default)]
pub struct MockHttpClient {
    responder: Option<Responder>,
    next_id: AtomicU64,
    state: Mutex<MockState>,
}

impl std::fmt::Debug for MockHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.guard();
        f.debug_struct("MockHttpClient")
            .field("sent", &state.sent.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl MockHttpClient {
    /// Client that leaves every request pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request immediately with `status_code`
    pub fn responding_with(status_code: u32) -> Self {
        Self::new().with_responder(move |request| Some(HttpResponse::new(request.id(), status_code)))
    }

    /// Answer requests with `responder`; `None` leaves a request pending
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    fn guard(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests sent so far, in order
    pub fn sent_requests(&self) -> Vec<HttpRequest> {
        self.guard().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.guard().sent.len()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.guard().sent.last().cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.guard().pending.len()
    }

    /// Complete a pending request. Returns false if `id` is not pending.
    pub fn complete(&self, id: &str, response: HttpResponse) -> bool {
        let callback = self.guard().pending.remove(id);
        match callback {
            Some(callback) => {
                callback(response);
                true
            }
            None => false,
        }
    }
}

impl HttpClient for MockHttpClient {
    fn create_request(&self) -> HttpRequest {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        HttpRequest::new(format!("MockHttpRequest-{n}"))
    }

    fn send_request_async(&self, request: HttpRequest, callback: HttpResponseCallback) {
        let response = self.responder.as_ref().and_then(|respond| respond(&request));
        let id = request.id().to_string();
        {
            let mut state = self.guard();
            state.sent.push(request);
            if response.is_none() {
                state.pending.insert(id, callback);
                return;
            }
        }
        if let Some(response) = response {
            callback(response);
        }
    }

    fn cancel_request(&self, id: &str) {
        self.complete(id, HttpResponse::failed(id, HttpResult::Aborted));
    }

    fn cancel_all_requests(&self) {
        let pending: Vec<(String, HttpResponseCallback)> = self.guard().pending.drain().collect();
        for (id, callback) in pending {
            callback(HttpResponse::failed(id, HttpResult::Aborted));
        }
    }
}
