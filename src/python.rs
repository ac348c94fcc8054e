//! Python bindings (feature `python`).
//!
//! The webhook server and dashboard backend own a `TriageService` instance
//! and call into it per request. Records cross the boundary as JSON strings.

use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::classification::classify;
use crate::config::TriageConfig;
use crate::dispatch::{IncidentStatus, Responder};
use crate::error::TriageError;
use crate::logging::structured::init_logger;
use crate::pipeline::{InboundMessage, MessageOutcome, TriageService};
use crate::storage::IncidentFilter;

fn to_py_err(e: TriageError) -> PyErr {
    match e {
        TriageError::UnknownIncident(_) | TriageError::UnknownResponder(_) => {
            PyKeyError::new_err(e.to_string())
        }
        other => PyValueError::new_err(other.to_string()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pyclass(name = "TriageService")]
struct PyTriageService {
    inner: TriageService,
}

#[pymethods]
impl PyTriageService {
    /// Create a service from an optional JSON config document.
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        init_logger();

        let mut config = match config_json {
            Some(json) => TriageConfig::from_json(json).map_err(to_py_err)?,
            None => TriageConfig::default(),
        };
        config.apply_env_overrides().map_err(to_py_err)?;

        log::info!(
            "SERVICE_STARTED reply_mode={:?} dispatch_threshold={}",
            config.reply_mode,
            config.dispatch_threshold
        );

        Ok(Self {
            inner: TriageService::new(config).map_err(to_py_err)?,
        })
    }

    /// Process one inbound message.
    ///
    /// Returns a dict with `status` ("ignored", "duplicate" or "handled"),
    /// `reply` (str or None) and, when handled, `state`, `incident_id`,
    /// `classification` (JSON) and `dispatch` (JSON).
    #[pyo3(signature = (session_id, body, received_at=None, message_id=None))]
    fn process_message(
        &self,
        py: Python<'_>,
        session_id: &str,
        body: &str,
        received_at: Option<&str>,
        message_id: Option<&str>,
    ) -> PyResult<Py<PyAny>> {
        let message = InboundMessage::from_transport(session_id, body, received_at, message_id);
        let outcome = py.allow_threads(|| self.inner.process_message(&message));

        let result = PyDict::new(py);
        match outcome {
            MessageOutcome::Ignored => {
                result.set_item("status", "ignored")?;
                result.set_item("reply", py.None())?;
            }
            MessageOutcome::Duplicate(reply) => {
                result.set_item("status", "duplicate")?;
                result.set_item("reply", reply)?;
            }
            MessageOutcome::Handled(reply) => {
                result.set_item("status", "handled")?;
                result.set_item("reply", &reply.text)?;
                result.set_item("state", reply.state.id())?;
                result.set_item("incident_id", &reply.incident_id)?;
                result.set_item("classification", to_json(&reply.classification)?)?;
                result.set_item("dispatch", to_json(&reply.dispatch)?)?;
            }
        }
        Ok(result.into())
    }

    /// Register a responder from its JSON representation.
    fn register_responder(&self, responder_json: &str) -> PyResult<()> {
        let responder: Responder =
            serde_json::from_str(responder_json).map_err(|e| PyValueError::new_err(e.to_string()))?;
        self.inner.register_responder(responder).map_err(to_py_err)
    }

    fn set_responder_availability(&self, responder_id: &str, available: bool, on_duty: bool) -> PyResult<String> {
        let responder = self
            .inner
            .set_responder_availability(responder_id, available, on_duty)
            .map_err(to_py_err)?;
        to_json(&responder)
    }

    /// Returns False when the responder had already accepted.
    fn accept_incident(&self, incident_id: &str, responder_id: &str) -> PyResult<bool> {
        let change = self
            .inner
            .accept_incident(incident_id, responder_id)
            .map_err(to_py_err)?;
        Ok(change.is_some())
    }

    fn mark_on_scene(&self, incident_id: &str, responder_id: &str) -> PyResult<()> {
        self.inner
            .mark_on_scene(incident_id, responder_id)
            .map(|_| ())
            .map_err(to_py_err)
    }

    fn resolve_incident(&self, incident_id: &str) -> PyResult<()> {
        self.inner.resolve_incident(incident_id).map(|_| ()).map_err(to_py_err)
    }

    fn cancel_incident(&self, incident_id: &str) -> PyResult<()> {
        self.inner.cancel_incident(incident_id).map(|_| ()).map_err(to_py_err)
    }

    /// Run distance decay for the time elapsed since the last tick.
    /// Returns the incident ids whose responder arrived.
    fn tick(&self) -> Vec<String> {
        self.inner
            .tick()
            .into_iter()
            .map(|a| a.incident_id)
            .collect()
    }

    fn incident(&self, incident_id: &str) -> PyResult<Option<String>> {
        self.inner.incident(incident_id).map(|r| to_json(&r)).transpose()
    }

    fn dispatch(&self, incident_id: &str) -> PyResult<Option<String>> {
        self.inner.dispatch(incident_id).map(|r| to_json(&r)).transpose()
    }

    #[pyo3(signature = (status=None, limit=None))]
    fn list_incidents(&self, status: Option<&str>, limit: Option<usize>) -> PyResult<String> {
        let status = match status {
            Some(raw) => Some(
                IncidentStatus::parse(raw)
                    .ok_or_else(|| PyValueError::new_err(format!("unknown status: {}", raw)))?,
            ),
            None => None,
        };
        let filter = IncidentFilter {
            status,
            session_id: None,
            limit,
        };
        to_json(&self.inner.list_incidents(&filter))
    }

    fn responders(&self) -> PyResult<String> {
        to_json(&self.inner.responders())
    }

    fn stats(&self) -> PyResult<String> {
        to_json(&self.inner.stats())
    }

    fn expire_idle_sessions(&self) -> Vec<String> {
        self.inner.expire_idle_sessions()
    }

    /// Events since the previous call, as a JSON array.
    fn drain_events(&self) -> PyResult<String> {
        to_json(&self.inner.drain_events())
    }
}

/// Classify a single message without touching any session.
#[pyfunction]
fn classify_message(text: &str) -> PyResult<String> {
    to_json(&classify(text))
}

/// Python module definition
#[pymodule]
fn safetynet_core(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyTriageService>()?;
    m.add_function(wrap_pyfunction!(classify_message, m)?)?;
    Ok(())
}
