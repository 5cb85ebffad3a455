//! Request handlers for the Job Dispatcher (C6).

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::{info, warn};

use crate::error::AppError;
use crate::gain;
use crate::mem_probe;
use crate::regularizer;
use crate::render;
use crate::report::JobReport;
use crate::server::types::{JobRequest, JobResponse};
use crate::solver;
use crate::matrix::MatrixCache;

use super::AppState;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn reconstruct(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobRequest>,
) -> Result<Json<JobResponse>, AppError> {
    let permit = match tokio::time::timeout(
        state.config.admission_timeout,
        state.semaphore.clone().acquire_owned(),
    )
    .await
    {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return Err(AppError::Internal("admission semaphore closed".into())),
        Err(_) => {
            warn!("admission timed out, responding 503");
            return Err(AppError::Overloaded);
        }
    };

    let free = mem_probe::free_mib();
    if free < state.config.min_free_mb {
        warn!(
            free_mib = free,
            min_free_mb = state.config.min_free_mb,
            "free memory below advisory threshold, admitting anyway"
        );
    }

    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        run_pipeline(&req, &config)
    })
    .await
    .map_err(|e| AppError::Internal(format!("worker task panicked: {e}")))??;

    info!(
        iterations = report.iteracoes,
        wall_time_s = report.tempo_execucao_s,
        "job completed"
    );
    Ok(Json(JobResponse {
        status: "sucesso",
        report,
    }))
}

fn run_pipeline(req: &JobRequest, config: &crate::config::Config) -> Result<JobReport, AppError> {
    let h = MatrixCache::global().load_matrix(Path::new(&req.caminho_h), ',')?;
    let g_raw = MatrixCache::global().load_vector(Path::new(&req.caminho_g), ',')?;

    if req.largura * req.altura != h.cols() {
        return Err(AppError::DimensionMismatch(format!(
            "largura*altura ({}) does not match cols(H) ({})",
            req.largura * req.altura,
            h.cols()
        )));
    }
    if req.s * req.n != g_raw.len() {
        return Err(AppError::DimensionMismatch(format!(
            "s*n ({}) does not match len(g) ({})",
            req.s * req.n,
            g_raw.len()
        )));
    }

    let g = gain::apply_gain(&g_raw, req.s, req.n);

    let (outcome, lambda) = if req.regularizar {
        let lambda = regularizer::compute_lambda(&h, &g, config.reg_factor);
        let outcome = solver::cgls(&h, &g, lambda, config.max_iter, config.tol);
        (outcome, Some(lambda))
    } else {
        let outcome = solver::cgnr(&h, &g, config.max_iter, config.tol);
        (outcome, None)
    };

    let pixels = render::render_u8(&outcome.f, req.largura, req.altura)?;
    let raster_path = format!(
        "{}/{}_FINAL.pgm",
        config.output_dir.trim_end_matches('/'),
        req.nome_arquivo_base
    );
    render::write_pgm(Path::new(&raster_path), &pixels, req.largura, req.altura)?;

    Ok(JobReport::new(raster_path, &outcome, req.regularizar, lambda))
}
