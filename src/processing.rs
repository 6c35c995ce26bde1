//! Remote processing service boundary.
//!
//! Simulation, optimal control and parameter identification run in an external
//! service. This module defines the JSON payloads exchanged with it and a
//! [`RequestFence`] that makes sure only the response to the most recent
//! request of each kind is applied.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProcessingError;
use crate::model::Model;

// ────────────────────────────────────────────────────────────────────────────
// Requests
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Simulate,
    Optimize,
    Identify,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestKind::Simulate => "simulation",
            RequestKind::Optimize => "optimization",
            RequestKind::Identify => "identification",
        })
    }
}

/// Time grid and intervention bounds shared by every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunParameters {
    pub start_time: f64,
    pub end_time: f64,
    pub steps: u32,
    /// Per-intervention `[min, max]` bounds, keyed by intervention name.
    pub intervention_bounds: IndexMap<String, (f64, f64)>,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 100.0,
            steps: 100,
            intervention_bounds: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulateRequest {
    pub model: Model,
    pub parameters: RunParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub model: Model,
    pub parameters: RunParameters,
    /// Expression to minimise, in the same language as flow equations.
    pub objective: String,
    pub interventions: Vec<String>,
}

/// One observed value of a compartment at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: f64,
    pub compartment: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    pub model: Model,
    pub parameters: RunParameters,
    pub observations: Vec<Observation>,
}

// ────────────────────────────────────────────────────────────────────────────
// Responses
// ────────────────────────────────────────────────────────────────────────────

/// Time series per compartment name, sampled at `times`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub times: Vec<f64>,
    pub compartments: IndexMap<String, Vec<f64>>,
}

impl SimulationResult {
    pub fn series(&self, compartment: &str) -> Option<&[f64]> {
        self.compartments.get(compartment).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub baseline: SimulationResult,
    pub optimal: SimulationResult,
    /// Control profile per intervention name, sampled at `optimal.times`.
    pub interventions: IndexMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    /// Fitted value per constant name.
    pub constants: IndexMap<String, f64>,
    pub trajectory: SimulationResult,
}

impl IdentificationResult {
    /// Copy the fitted constants into `model`, matching by name. Returns how
    /// many constants were updated; names the model does not know are ignored.
    pub fn apply_to(&self, model: &mut Model) -> usize {
        let mut updated = 0;
        for constant in &mut model.constants {
            if let Some(&value) = self.constants.get(&constant.name) {
                constant.value = value;
                updated += 1;
            }
        }
        updated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    pub error: String,
}

/// Either a payload or the service's `{error}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessingResponse<T> {
    Failed(ServiceError),
    Completed(T),
}

impl<T> ProcessingResponse<T> {
    pub fn into_result(self) -> Result<T, ProcessingError> {
        match self {
            ProcessingResponse::Completed(value) => Ok(value),
            ProcessingResponse::Failed(e) => Err(ProcessingError::Service(e.error)),
        }
    }
}

/// Decode a response body. A `{error}` body becomes [`ProcessingError::Service`].
pub fn decode_response<T: DeserializeOwned>(body: &str) -> Result<T, ProcessingError> {
    serde_json::from_str::<ProcessingResponse<T>>(body)?.into_result()
}

// ────────────────────────────────────────────────────────────────────────────
// Fencing
// ────────────────────────────────────────────────────────────────────────────

/// Handed out when a request is issued; presented again when its response
/// arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub kind: RequestKind,
    pub generation: u64,
}

/// Tracks the latest in-flight request per kind. Issuing a new request
/// supersedes the previous one of the same kind; its response will be
/// rejected.
#[derive(Debug, Default)]
pub struct RequestFence {
    counter: u64,
    pending: HashMap<RequestKind, u64>,
}

impl RequestFence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, kind: RequestKind) -> RequestTicket {
        self.counter += 1;
        self.pending.insert(kind, self.counter);
        RequestTicket {
            kind,
            generation: self.counter,
        }
    }

    /// True if `ticket` is the latest request of its kind. Accepting consumes
    /// the ticket, so a duplicated response is rejected the second time.
    pub fn accept(&mut self, ticket: RequestTicket) -> bool {
        match self.pending.get(&ticket.kind) {
            Some(&latest) if latest == ticket.generation => {
                self.pending.remove(&ticket.kind);
                true
            }
            latest => {
                warn!(
                    kind = %ticket.kind,
                    generation = ticket.generation,
                    latest = ?latest,
                    "discarding stale processing response"
                );
                false
            }
        }
    }

    /// Like [`RequestFence::accept`], then decode `body`.
    pub fn settle<T: DeserializeOwned>(
        &mut self,
        ticket: RequestTicket,
        body: &str,
    ) -> Result<T, ProcessingError> {
        if !self.accept(ticket) {
            return Err(ProcessingError::Superseded(ticket.kind));
        }
        decode_response(body)
    }

    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.contains_key(&kind)
    }
}
