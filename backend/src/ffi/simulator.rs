//! PyO3 wrapper for the orchestrator

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::orchestrator::{Orchestrator, Simulation};

/// Python wrapper holding a validated configuration
///
/// # Example (from Python)
///
/// ```python
/// from combat_simulator_core_rs import Simulator
///
/// sim = Simulator(open("raid.json").read())
/// report = json.loads(sim.run())
/// print(report["metrics"]["raid.dps"]["mean"])
/// ```
#[pyclass(name = "Simulator")]
pub struct PySimulator {
    inner: Orchestrator,
}

#[pymethods]
impl PySimulator {
    /// Parse and validate a JSON configuration
    ///
    /// # Errors
    ///
    /// Raises ValueError if the JSON is malformed or fails validation.
    #[new]
    fn new(config_json: &str) -> PyResult<Self> {
        let config = SimulationConfig::from_json(config_json)
            .map_err(|e| PyValueError::new_err(format!("Invalid configuration: {}", e)))?;
        let inner = Orchestrator::new(config)
            .map_err(|e| PyValueError::new_err(format!("Invalid configuration: {}", e)))?;
        Ok(Self { inner })
    }

    /// Run all iterations and return the report as JSON
    ///
    /// The GIL is released while workers run.
    fn run(&self, py: Python<'_>) -> PyResult<String> {
        let report = py
            .allow_threads(|| self.inner.run())
            .map_err(|e| PyRuntimeError::new_err(format!("Simulation failed: {}", e)))?;
        report
            .to_json()
            .map_err(|e| PyRuntimeError::new_err(format!("Report serialization failed: {}", e)))
    }

    /// Run one iteration and return its metric values as JSON
    fn run_iteration(&self, py: Python<'_>, index: u64) -> PyResult<String> {
        let config = Arc::new(self.inner.config().clone());
        let seed = self.inner.seed();
        let total = self.inner.config().iterations;
        let report = py
            .allow_threads(|| {
                Simulation::new(config, seed).and_then(|mut sim| sim.run_iteration(index, total))
            })
            .map_err(|e| PyRuntimeError::new_err(format!("Iteration {} failed: {}", index, e)))?;
        serde_json::to_string(&report.values)
            .map_err(|e| PyRuntimeError::new_err(format!("Report serialization failed: {}", e)))
    }

    /// SHA-256 of the canonical configuration JSON
    fn fingerprint(&self) -> PyResult<String> {
        self.inner
            .config()
            .fingerprint()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Resolved base seed
    #[getter]
    fn seed(&self) -> u64 {
        self.inner.seed()
    }
}
