use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tiller_link::{Transport, TransportError};
use tiller_proto::wire::Endpoint;

/// Transport double answering from a per-endpoint script.
///
/// Replies are consumed in order; the last one repeats. Unscripted endpoints
/// answer with an empty body. A reply may be held back for a while to let
/// cycles overlap.
type Scripted = (Duration, Result<Value, TransportError>);

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

impl ScriptedTransport {
    pub fn respond(&self, endpoint: Endpoint, reply: Result<Value, TransportError>) {
        self.respond_after(endpoint, Duration::ZERO, reply);
    }

    pub fn respond_after(&self, endpoint: Endpoint, delay: Duration, reply: Result<Value, TransportError>) {
        self.script.lock().unwrap().entry(endpoint.path()).or_default().push_back((delay, reply));
    }

    pub fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|(p, _)| p).collect()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        let path = endpoint.path();
        self.calls.lock().unwrap().iter().filter(|(p, _)| *p == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, endpoint: Endpoint, body: Option<&Value>) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push((endpoint.path(), body.cloned()));
        let (delay, reply) = {
            let mut script = self.script.lock().unwrap();
            match script.get_mut(&endpoint.path()) {
                Some(q) if q.len() > 1 => q.pop_front().unwrap(),
                Some(q) => q.front().cloned().unwrap_or((Duration::ZERO, Ok(Value::Null))),
                None => (Duration::ZERO, Ok(Value::Null)),
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

pub fn offline(endpoint: Endpoint) -> TransportError {
    TransportError::Network { endpoint: endpoint.path(), message: "connection refused".into() }
}
