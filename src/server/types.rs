//! Wire types for the Job Dispatcher (§6). Field names match the external
//! interface exactly, including the Portuguese identifiers the spec's wire
//! format uses.

use serde::{Deserialize, Serialize};

/// Incoming reconstruction job request.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub caminho_h: String,
    pub caminho_g: String,
    pub largura: usize,
    pub altura: usize,
    pub s: usize,
    pub n: usize,
    pub nome_arquivo_base: String,
    #[serde(default)]
    pub regularizar: bool,
}

/// Successful job response (§6, §4.7).
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub report: crate::report::JobReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_request_deserializes_minimal_payload() {
        let json = r#"{
            "caminho_h": "h.csv",
            "caminho_g": "g.csv",
            "largura": 4,
            "altura": 4,
            "s": 4,
            "n": 4,
            "nome_arquivo_base": "run1"
        }"#;
        let req: JobRequest = serde_json::from_str(json).unwrap();
        assert!(!req.regularizar);
        assert_eq!(req.largura, 4);
    }

    #[test]
    fn job_request_accepts_regularizar_flag() {
        let json = r#"{
            "caminho_h": "h.csv",
            "caminho_g": "g.csv",
            "largura": 2,
            "altura": 2,
            "s": 2,
            "n": 2,
            "nome_arquivo_base": "run2",
            "regularizar": true
        }"#;
        let req: JobRequest = serde_json::from_str(json).unwrap();
        assert!(req.regularizar);
    }
}
