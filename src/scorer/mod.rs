//! C8 — Confidence Scorer (spec.md §4.8).
//!
//! Grounded on `src/application/ml/predictor.rs`'s `MLPredictor` trait and
//! `smartcore_predictor.rs`'s load-from-file-path-or-go-neutral shape,
//! generalized to this crate's frozen [`FeatureVector`] and with the
//! fallback spelled out explicitly: a failed load or failed prediction
//! falls back to heuristic mode for that call rather than returning
//! neutral (spec.md §4.8).

use crate::domain::FeatureVector;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

pub trait Scorer: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> f64;
    fn name(&self) -> &'static str;
}

/// Reproduces `confidence_ensemble` with small adjustments: a bonus when
/// RSI sits in an extreme zone (confirms rather than fades the move), and
/// a penalty the farther price sits from both the nearest FVG and order
/// block (spec.md §4.8).
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer for HeuristicScorer {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let mut score = features.confidence_ensemble;

        let rsi_extreme = features.rsi_14 > 0.8 || features.rsi_14 < 0.2;
        if rsi_extreme {
            score += 0.05;
        }

        let proximity_penalty = (1.0 - features.fvg_proximity.max(features.ob_proximity)) * 0.05;
        score -= proximity_penalty;

        score.clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// A gradient-boosted-tree model loaded from a fixed file path at
/// construction time, per `smartcore_predictor.rs`. Unlike the teacher's
/// version — which returns a neutral 0.5 when no model is present — a
/// missing or broken model falls back to [`HeuristicScorer`] for that call,
/// logging the fallback exactly once per process lifetime (spec.md §4.8).
pub struct ModelScorer {
    model: Option<smartcore::ensemble::random_forest_regressor::RandomForestRegressor<f64, f64, smartcore::linalg::basic::matrix::DenseMatrix<f64>, Vec<f64>>>,
    fallback: HeuristicScorer,
    fallback_logged: AtomicBool,
}

impl ModelScorer {
    pub fn load(model_path: impl AsRef<Path>) -> Self {
        let model_path: PathBuf = model_path.as_ref().to_path_buf();
        let model = Self::try_load(&model_path);
        Self {
            model,
            fallback: HeuristicScorer::new(),
            fallback_logged: AtomicBool::new(false),
        }
    }

    fn try_load(
        model_path: &Path,
    ) -> Option<smartcore::ensemble::random_forest_regressor::RandomForestRegressor<f64, f64, smartcore::linalg::basic::matrix::DenseMatrix<f64>, Vec<f64>>> {
        if !model_path.exists() {
            warn!(path = %model_path.display(), "confidence model file not found, scorer will run in heuristic mode");
            return None;
        }
        let bytes = match std::fs::read(model_path) {
            Ok(bytes) => bytes,
            Err(error) => {
                error!(%error, path = %model_path.display(), "failed to read confidence model file");
                return None;
            }
        };
        match serde_json::from_reader(std::io::Cursor::new(&bytes)) {
            Ok(model) => {
                info!(path = %model_path.display(), "loaded confidence model");
                Some(model)
            }
            Err(error) => {
                error!(%error, path = %model_path.display(), "failed to deserialize confidence model");
                None
            }
        }
    }

    fn log_fallback_once(&self) {
        if self.fallback_logged.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            warn!("confidence scorer falling back to heuristic mode");
        }
    }
}

impl Scorer for ModelScorer {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let Some(model) = &self.model else {
            self.log_fallback_once();
            return self.fallback.predict(features);
        };

        let input = vec![features.as_array().to_vec()];
        let matrix = match smartcore::linalg::basic::matrix::DenseMatrix::from_2d_vec(&input) {
            Ok(matrix) => matrix,
            Err(error) => {
                error!(%error, "confidence model input matrix construction failed");
                self.log_fallback_once();
                return self.fallback.predict(features);
            }
        };

        match model.predict(&matrix) {
            Ok(predictions) => match predictions.first() {
                Some(value) => value.clamp(0.0, 1.0),
                None => {
                    self.log_fallback_once();
                    self.fallback.predict(features)
                }
            },
            Err(error) => {
                error!(%error, "confidence model prediction failed");
                self.log_fallback_once();
                self.fallback.predict(features)
            }
        }
    }

    fn name(&self) -> &'static str {
        "model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureVector {
        FeatureVector {
            market_structure: 1.0,
            order_blocks_count: 0.3,
            institutional_candle: 1.0,
            liquidity_grab: 1.0,
            fvg_size_atr: 0.4,
            fvg_proximity: 0.9,
            ob_proximity: 0.2,
            atr_normalized_volume: 0.5,
            rsi_14: 0.85,
            momentum_atr: 0.6,
            time_to_next_level: 0.3,
            confidence_ensemble: 0.5,
        }
    }

    #[test]
    fn heuristic_scorer_adds_extreme_rsi_bonus() {
        let scorer = HeuristicScorer::new();
        let score = scorer.predict(&features());
        assert!(score > 0.5);
    }

    #[test]
    fn heuristic_scorer_output_is_clamped() {
        let scorer = HeuristicScorer::new();
        let mut extreme = features();
        extreme.confidence_ensemble = 1.0;
        extreme.rsi_14 = 0.95;
        assert!(scorer.predict(&extreme) <= 1.0);
    }

    #[test]
    fn model_scorer_falls_back_to_heuristic_when_file_missing() {
        let scorer = ModelScorer::load("/nonexistent/path/model.json");
        let heuristic = HeuristicScorer::new();
        let f = features();
        assert_eq!(scorer.predict(&f), heuristic.predict(&f));
    }
}
