//! Indicator engine: one `IndicatorRow` per bar.

use crate::momentum::{Kdj, Macd, Rsi};
use crate::moving_average::Sma;
use crate::volatility::BollingerBands;
use chrono::NaiveDate;
use quotewatch_core::error::IndicatorError;
use quotewatch_core::traits::{Indicator, OhlcIndicator};
use quotewatch_core::types::{Bar, IndicatorRow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Windows and spans used by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    /// Close SMA windows, stored as ma5/ma10/ma20/ma30/ma60
    pub ma_windows: [usize; 5],
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// RSI windows, stored as rsi6/rsi12/rsi24
    pub rsi_windows: [usize; 3],
    pub kdj_window: usize,
    pub kdj_smoothing: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    /// Volume SMA windows, stored as volume_ma5/volume_ma10
    pub volume_ma_windows: [usize; 2],
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_windows: [5, 10, 20, 30, 60],
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_windows: [6, 12, 24],
            kdj_window: 9,
            kdj_smoothing: 3,
            bollinger_window: 20,
            bollinger_k: 2.0,
            volume_ma_windows: [5, 10],
        }
    }
}

impl IndicatorParams {
    /// Reject windows the indicators cannot be built with.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        let windows = self
            .ma_windows
            .iter()
            .map(|w| ("ma_windows", *w))
            .chain(self.rsi_windows.iter().map(|w| ("rsi_windows", *w)))
            .chain(self.volume_ma_windows.iter().map(|w| ("volume_ma_windows", *w)))
            .chain([
                ("macd_fast", self.macd_fast),
                ("macd_slow", self.macd_slow),
                ("macd_signal", self.macd_signal),
                ("kdj_window", self.kdj_window),
                ("kdj_smoothing", self.kdj_smoothing),
                ("bollinger_window", self.bollinger_window),
            ]);

        for (name, window) in windows {
            if window == 0 {
                return Err(IndicatorError::InvalidParameter(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.macd_fast >= self.macd_slow {
            return Err(IndicatorError::InvalidParameter(format!(
                "macd_fast ({}) must be less than macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }

        if !self.bollinger_k.is_finite() || self.bollinger_k <= 0.0 {
            return Err(IndicatorError::InvalidParameter(format!(
                "bollinger_k must be positive, got {}",
                self.bollinger_k
            )));
        }

        Ok(())
    }
}

/// Computes indicator rows from an ascending bar history.
///
/// The output is a pure function of the input bars: recomputing the same
/// history yields identical rows.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
    ma: [Sma; 5],
    macd: Macd,
    rsi: [Rsi; 3],
    kdj: Kdj,
    bollinger: BollingerBands,
    volume_ma: [Sma; 2],
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Result<Self, IndicatorError> {
        params.validate()?;

        Ok(Self {
            ma: params.ma_windows.map(Sma::new),
            macd: Macd::with_periods(params.macd_fast, params.macd_slow, params.macd_signal),
            rsi: params.rsi_windows.map(Rsi::new),
            kdj: Kdj::with_periods(params.kdj_window, params.kdj_smoothing),
            bollinger: BollingerBands::with_params(params.bollinger_window, params.bollinger_k),
            volume_ma: params.volume_ma_windows.map(Sma::new),
            params,
        })
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Longest look-back any indicator needs before it is defined.
    pub fn warm_up(&self) -> usize {
        let longest_ma = self.ma.iter().map(Indicator::period).max().unwrap_or(0);
        let longest_rsi = self.rsi.iter().map(Indicator::period).max().unwrap_or(0);
        longest_ma
            .max(longest_rsi)
            .max(self.kdj.period())
            .max(self.bollinger.period())
    }

    /// Compute one row per bar.
    ///
    /// `bars` must be a single instrument's history, ascending by date.
    /// Signal columns are left neutral.
    pub fn compute(&self, bars: &[Bar]) -> Vec<IndicatorRow> {
        let closes: Vec<f64> = bars.iter().map(Bar::close_f64).collect();
        let highs: Vec<f64> = bars.iter().map(Bar::high_f64).collect();
        let lows: Vec<f64> = bars.iter().map(Bar::low_f64).collect();
        let volumes: Vec<f64> = bars.iter().map(Bar::volume_f64).collect();

        let ma = self.ma.each_ref().map(|sma| sma.calculate(&closes));
        let macd = self.macd.calculate(&closes);
        let rsi = self.rsi.each_ref().map(|rsi| rsi.calculate(&closes));
        let kdj = self.kdj.calculate_ohlc(&highs, &lows, &closes);
        let bollinger = self.bollinger.calculate(&closes);
        let volume_ma = self.volume_ma.each_ref().map(|sma| sma.calculate(&volumes));

        let rows: Vec<IndicatorRow> = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let mut row = IndicatorRow::new(bar.symbol(), bar.date());

                row.ma5 = ma[0][i];
                row.ma10 = ma[1][i];
                row.ma20 = ma[2][i];
                row.ma30 = ma[3][i];
                row.ma60 = ma[4][i];

                if let Some(out) = macd[i] {
                    row.macd = Some(out.macd);
                    row.macd_signal = Some(out.signal);
                    row.macd_histogram = Some(out.histogram);
                }

                row.k = kdj[i].k;
                row.d = kdj[i].d;
                row.j = kdj[i].j;

                row.rsi6 = rsi[0][i];
                row.rsi12 = rsi[1][i];
                row.rsi24 = rsi[2][i];

                if let Some(bands) = bollinger[i] {
                    row.boll_upper = Some(bands.upper);
                    row.boll_middle = Some(bands.middle);
                    row.boll_lower = Some(bands.lower);
                }

                row.volume_ma5 = volume_ma[0][i];
                row.volume_ma10 = volume_ma[1][i];

                row
            })
            .collect();

        debug!(
            symbol = bars.first().map(Bar::symbol).unwrap_or_default(),
            rows = rows.len(),
            "Computed indicator rows"
        );

        rows
    }

    /// Rows dated on or after `since`, computed over the full history.
    ///
    /// Used after a correction at `since`: earlier rows cannot change, later
    /// ones may.
    pub fn compute_since(&self, bars: &[Bar], since: NaiveDate) -> Vec<IndicatorRow> {
        self.compute(bars)
            .into_iter()
            .filter(|row| row.date >= since)
            .collect()
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        let params = IndicatorParams::default();
        Self {
            ma: params.ma_windows.map(Sma::new),
            macd: Macd::default(),
            rsi: params.rsi_windows.map(Rsi::new),
            kdj: Kdj::default(),
            bollinger: BollingerBands::default(),
            volume_ma: params.volume_ma_windows.map(Sma::new),
            params,
        }
    }
}
