//! Matrix Op Validator (C8)
//!
//! An offline sanity gate for `Matrix`'s core operations: loads fixture
//! files `M.csv`, `N.csv`, `a.csv`, `MN.csv`, `aM.csv` from a directory,
//! computes `M*N` and `aᵀ*M`, and compares element-wise against the
//! reference outputs. Exit is always 0 — results are informational
//! (PASS/FAIL printed to stdout), matching §4.8.
//!
//! Flag parsing is hand-rolled rather than pulling in a CLI-argument crate,
//! the same minimal style the teacher crate uses for its own verifier
//! binary's `--basis`/`--srs-g1` flags.

use std::env;
use std::path::{Path, PathBuf};

use cgnr_recon::matrix::Matrix;

const ABS_TOL: f64 = 1e-8;
const REL_TOL: f64 = 1e-5;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn load_csv(path: &Path) -> Vec<Vec<f64>> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e));
    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.split(|c: char| c == ',' || c == ';')
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| t.parse::<f64>().unwrap_or_else(|_| panic!("bad token `{t}` in {}", path.display())))
                .collect()
        })
        .collect()
}

fn csv_to_matrix(rows: Vec<Vec<f64>>) -> Matrix {
    let r = rows.len();
    let c = rows.first().map(|row| row.len()).unwrap_or(0);
    let mut data = Vec::with_capacity(r * c);
    for row in rows {
        data.extend_from_slice(&row);
    }
    Matrix::from_row_major(r, c, data).expect("fixture shape invariant violated")
}

fn close_enough(actual: f64, expected: f64) -> bool {
    let diff = (actual - expected).abs();
    diff <= ABS_TOL || diff <= REL_TOL * expected.abs().max(1.0)
}

fn check_matmul(dir: &Path) -> bool {
    let m = csv_to_matrix(load_csv(&dir.join("M.csv")));
    let n = csv_to_matrix(load_csv(&dir.join("N.csv")));
    let expected = csv_to_matrix(load_csv(&dir.join("MN.csv")));

    let actual = match m.matmul(&n) {
        Ok(result) => result,
        Err(e) => {
            println!("FAIL matmul: {e}");
            return false;
        }
    };

    if actual.rows() != expected.rows() || actual.cols() != expected.cols() {
        println!(
            "FAIL matmul: shape {}x{} != expected {}x{}",
            actual.rows(),
            actual.cols(),
            expected.rows(),
            expected.cols()
        );
        return false;
    }

    let mut ok = true;
    for (a, e) in actual.data().iter().zip(expected.data().iter()) {
        if !close_enough(*a, *e) {
            ok = false;
        }
    }
    println!("{} matmul ({}x{})", if ok { "PASS" } else { "FAIL" }, actual.rows(), actual.cols());
    ok
}

fn check_vector_matmul(dir: &Path) -> bool {
    let m = csv_to_matrix(load_csv(&dir.join("M.csv")));
    let a_rows = load_csv(&dir.join("a.csv"));
    let a: Vec<f64> = a_rows.into_iter().flatten().collect();
    let expected_rows = load_csv(&dir.join("aM.csv"));
    let expected: Vec<f64> = expected_rows.into_iter().flatten().collect();

    let actual = m.transpose_mul(&a);

    if actual.len() != expected.len() {
        println!("FAIL aT*M: length {} != expected {}", actual.len(), expected.len());
        return false;
    }

    // The reference file stores values rounded to two decimals (§4.8).
    let mut ok = true;
    for (a_val, e_val) in actual.iter().zip(expected.iter()) {
        let rounded = (a_val * 100.0).round() / 100.0;
        if (rounded - e_val).abs() > 1e-9 {
            ok = false;
        }
    }
    println!("{} aT*M (len {})", if ok { "PASS" } else { "FAIL" }, actual.len());
    ok
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let fixtures_dir: PathBuf = parse_flag(&args, "--fixtures")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("fixtures"));

    println!("matrix_validator: fixtures = {}", fixtures_dir.display());

    let matmul_ok = check_matmul(&fixtures_dir);
    let vecmul_ok = check_vector_matmul(&fixtures_dir);

    if matmul_ok && vecmul_ok {
        println!("overall: PASS");
    } else {
        println!("overall: FAIL");
    }
    // Exit is always 0 — this is a sanity report, not a gate (§4.8).
}
