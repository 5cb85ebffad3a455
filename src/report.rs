//! Metadata Reporter (C7)
//!
//! Assembles the per-job `JobReport` returned alongside the raster path
//! (§4.7), using `chrono` for timestamp formatting exactly as the teacher
//! crate does in its job records. Field names are renamed on the wire to
//! match the external response schema (§6) while keeping idiomatic Rust
//! identifiers on the struct itself.
use chrono::Local;
use serde::Serialize;

use crate::solver::SolverOutcome;

/// Completed-job summary returned to the client (§6 response schema:
/// `{ status, imagem_gerada, tempo_reconstrucao_s, iteracoes, memoria_mb,
/// erro_final? }`).
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    #[serde(rename = "imagem_gerada")]
    pub arquivo_raster: String,
    pub iteracoes: usize,
    #[serde(rename = "tempo_reconstrucao_s")]
    pub tempo_execucao_s: f64,
    #[serde(rename = "erro_final")]
    pub epsilon_final: f64,
    #[serde(rename = "memoria_mb")]
    pub memoria_delta_mib: f64,
    pub regularizado: bool,
    pub lambda: Option<f64>,
    pub timestamp_local: String,
    pub timestamp_iso8601: String,
}

impl JobReport {
    pub fn new(
        raster_path: String,
        outcome: &SolverOutcome,
        regularizado: bool,
        lambda: Option<f64>,
    ) -> Self {
        let now = Local::now();
        Self {
            arquivo_raster: raster_path,
            iteracoes: outcome.iterations_done,
            tempo_execucao_s: outcome.wall_time_s,
            epsilon_final: outcome.epsilon,
            memoria_delta_mib: outcome.mem_delta_mib,
            regularizado,
            lambda,
            timestamp_local: now.format("%d/%m %H:%M:%S").to_string(),
            timestamp_iso8601: now.to_rfc3339(),
        }
    }
}
