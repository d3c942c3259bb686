//! Recording transport for adapter tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use gistgate_core::credentials::{
    CredentialLedger, LedgerSettings, MemoryCredentialStore, RotationStore,
};
use gistgate_core::llm::transport::{
    HttpRequest, HttpResponse, HttpTransport, TransportEvent, TransportStream,
};
use gistgate_types::error::TransportError;
use gistgate_types::llm::ProviderId;

pub enum Reply {
    Body(u16, String),
    Stream(u16, Vec<&'static str>),
    Fail(TransportError),
}

/// Replays canned replies and keeps every request it was given.
#[derive(Default)]
pub struct RecordingTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Body of the only request sent, parsed as JSON.
    pub fn sent_json(&self) -> serde_json::Value {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        serde_json::from_str(&requests[0].body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.requests()
            .last()?
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    fn next(&self, request: HttpRequest) -> Option<Reply> {
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop_front()
    }
}

impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        match self.next(request) {
            Some(Reply::Body(status, body)) => Ok(HttpResponse {
                status,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body,
            }),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Stream(..)) => panic!("expected send, reply is a stream"),
            None => Err(TransportError::Network("no reply scripted".to_string())),
        }
    }

    fn stream(&self, request: HttpRequest) -> TransportStream {
        let events: Vec<TransportEvent> = match self.next(request) {
            Some(Reply::Stream(status, chunks)) => {
                // Deltas, as the real transport produces them.
                chunks
                    .into_iter()
                    .map(|text| TransportEvent::Progress {
                        status,
                        text: text.to_string(),
                    })
                    .collect()
            }
            Some(Reply::Fail(err)) => vec![TransportEvent::Failed(err)],
            Some(Reply::Body(..)) => panic!("expected stream, reply is a body"),
            None => vec![TransportEvent::Failed(TransportError::Network(
                "no reply scripted".to_string(),
            ))],
        };
        Box::pin(futures_util::stream::iter(events))
    }
}

pub fn ledger(provider: ProviderId, primary: &str) -> Arc<CredentialLedger> {
    Arc::new(CredentialLedger::new(
        Arc::new(MemoryCredentialStore::with_keys(provider, primary, &[])),
        Arc::new(RotationStore::new()),
        LedgerSettings::default(),
    ))
}
