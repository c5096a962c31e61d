//! Position sizer: turns a breakout signal into a share count, grounded
//! in the teacher's `SizingEngine::calculate_quantity` (risk-pct-of-
//! equity target amount, then capped down by diversification and
//! exposure limits) but re-expressed against `PositionSizingConfig`
//! (spec §6 `position_sizing`) and gated by the regime calculator's
//! exposure band (spec §4.4) instead of a circuit-breaker halt level.

use rust_decimal::Decimal;

use crate::config::PositionSizingConfig;
use crate::domain::regime::ExposureBand;

#[derive(Debug, Clone, PartialEq)]
pub struct SizingDecision {
    pub shares: Decimal,
    pub target_dollars: Decimal,
    pub capped_by: Vec<String>,
}

pub struct PositionSizer {
    config: PositionSizingConfig,
}

impl PositionSizer {
    pub fn new(config: PositionSizingConfig) -> Self {
        PositionSizer { config }
    }

    /// Sizes a fresh entry tranche. `exposure_band` scales the risk
    /// budget down when the regime calculator is recommending reduced
    /// exposure (spec §4.4's exposure-band table).
    pub fn initial_entry(&self, price: Decimal, exposure_band: &ExposureBand) -> SizingDecision {
        self.size_tranche(price, self.config.initial_pct, exposure_band)
    }

    pub fn pyramid_tranche(&self, price: Decimal, stage: u8, exposure_band: &ExposureBand) -> SizingDecision {
        let pct = if stage == 1 { self.config.pyramid1_pct } else { self.config.pyramid2_pct };
        self.size_tranche(price, pct, exposure_band)
    }

    fn size_tranche(&self, price: Decimal, tranche_pct: f64, exposure_band: &ExposureBand) -> SizingDecision {
        let mut capped_by = Vec::new();

        if price <= Decimal::ZERO || self.config.portfolio_value <= 0.0 {
            return SizingDecision { shares: Decimal::ZERO, target_dollars: Decimal::ZERO, capped_by };
        }

        let portfolio_value = Decimal::try_from(self.config.portfolio_value).unwrap_or_default();

        // 1. Target amount from the account-risk budget for this tranche.
        let risk_pct = Decimal::try_from(self.config.account_risk_pct / 100.0).unwrap_or_default();
        let tranche_frac = Decimal::try_from(tranche_pct / 100.0).unwrap_or_default();
        let mut target_amt = portfolio_value * risk_pct.max(tranche_frac);

        // 2. Cap by max single-position percentage.
        let max_position_amt = portfolio_value * Decimal::try_from(self.config.max_position_pct / 100.0).unwrap_or_default();
        if target_amt > max_position_amt {
            target_amt = max_position_amt;
            capped_by.push("max_position_pct".to_string());
        }

        // 3. Scale down by the regime's recommended exposure ceiling:
        // a band topping out at e.g. 40% implies entries sized to at
        // most 40% of what an unrestricted full-exposure regime allows.
        let band_frac = Decimal::from(exposure_band.max_pct) / Decimal::from(100);
        if band_frac < Decimal::ONE {
            target_amt *= band_frac;
            capped_by.push("exposure_band".to_string());
        }

        let shares = (target_amt / price).floor();
        SizingDecision { shares, target_dollars: shares * price, capped_by }
    }
}
