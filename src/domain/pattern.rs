//! Pattern records produced by [`crate::patterns::PatternDetector`] (C6).
//!
//! All magnitudes are ATR-normalized so downstream features are scale-free
//! across symbols (spec.md §4.6). Stateless: recomputed per window, never
//! mutated after construction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternSide {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub is_high: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternRecord {
    Fvg {
        kind: PatternSide,
        start: f64,
        end: f64,
        size_in_atr: f64,
    },
    OrderBlock {
        kind: PatternSide,
        reference_price: f64,
        strength_in_atr: f64,
    },
    LiquiditySweep {
        kind: PatternSide,
        level: f64,
        distance_in_atr: f64,
    },
    StructureBreak {
        kind: PatternSide,
        level: f64,
    },
}

impl PatternRecord {
    pub fn kind(&self) -> PatternSide {
        match self {
            PatternRecord::Fvg { kind, .. } => *kind,
            PatternRecord::OrderBlock { kind, .. } => *kind,
            PatternRecord::LiquiditySweep { kind, .. } => *kind,
            PatternRecord::StructureBreak { kind, .. } => *kind,
        }
    }

    pub fn is_fvg(&self) -> bool {
        matches!(self, PatternRecord::Fvg { .. })
    }

    pub fn is_order_block(&self) -> bool {
        matches!(self, PatternRecord::OrderBlock { .. })
    }

    pub fn is_liquidity_sweep(&self) -> bool {
        matches!(self, PatternRecord::LiquiditySweep { .. })
    }
}
