// In crates/engine/src/pipeline.rs

use core_types::{Bar, BarTime, Error, IndicatorSnapshot, Result, SignalEvent, SymbolId};
use indicators::{IndicatorSettings, MovingAverages, RelativeStrength};
use std::collections::VecDeque;
use strategies::{MACrossover, MACrossoverSettings, Strategy};

use crate::checkpoint::{PipelineState, STATE_VERSION};

/// What a pipeline did with one bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Processed {
        snapshot: IndicatorSnapshot,
        signal: Option<SignalEvent>,
    },
    /// The bar was already processed with identical values and was ignored.
    Duplicate,
}

/// All indicator and signal state of one symbol.
///
/// Bars must arrive in strictly increasing (date, time) order. Each call to
/// [`SymbolPipeline::process`] runs aggregator, oscillator and evaluator to
/// completion before returning. Once halted, a pipeline refuses every further bar.
#[derive(Debug, Clone)]
pub struct SymbolPipeline {
    symbol: SymbolId,
    averages: MovingAverages,
    oscillator: RelativeStrength,
    evaluator: MACrossover,
    last_time: Option<BarTime>,
    recent: VecDeque<Bar>,
    duplicate_lookback: usize,
    bars_processed: u64,
    ingested_through: i64,
    halted: Option<String>,
}

fn invalid(e: impl std::fmt::Display) -> Error {
    Error::InvalidParameters(e.to_string())
}

impl SymbolPipeline {
    pub fn new(
        symbol: SymbolId,
        indicators: &IndicatorSettings,
        strategy: &MACrossoverSettings,
        duplicate_lookback: usize,
    ) -> Result<Self> {
        indicators.validate().map_err(invalid)?;
        Ok(Self {
            symbol,
            averages: MovingAverages::new(indicators.short_period, indicators.long_period)
                .map_err(invalid)?,
            oscillator: RelativeStrength::new(indicators.rsi_period).map_err(invalid)?,
            evaluator: MACrossover::new(*strategy).map_err(invalid)?,
            last_time: None,
            recent: VecDeque::with_capacity(duplicate_lookback),
            duplicate_lookback,
            bars_processed: 0,
            ingested_through: 0,
            halted: None,
        })
    }

    /// Rebuilds a pipeline from a decoded checkpoint.
    ///
    /// The checkpoint must belong to `symbol`, use the configured window lengths and
    /// satisfy every window invariant; anything else is `CorruptState`.
    pub fn restore(
        symbol: SymbolId,
        state: PipelineState,
        indicators: &IndicatorSettings,
        strategy: &MACrossoverSettings,
        duplicate_lookback: usize,
    ) -> Result<Self> {
        let corrupt = |reason: String| Error::CorruptState { symbol, reason };

        if state.version != STATE_VERSION {
            return Err(corrupt(format!("unsupported state version {}", state.version)));
        }
        if state.symbol != symbol {
            return Err(corrupt(format!("checkpoint belongs to symbol {}", state.symbol)));
        }
        state.averages.validate().map_err(|e| corrupt(e.to_string()))?;
        state.oscillator.validate().map_err(|e| corrupt(e.to_string()))?;

        if state.averages.short_period() != indicators.short_period
            || state.averages.long_period() != indicators.long_period
            || state.oscillator.period() != indicators.rsi_period
        {
            return Err(corrupt(
                "checkpoint was taken with different indicator periods".to_string(),
            ));
        }

        if state.ingested_through < 0 {
            return Err(corrupt(format!(
                "negative ingestion sequence {}",
                state.ingested_through
            )));
        }

        match state.last_time {
            None if state.bars_processed > 0 || !state.recent.is_empty() => {
                return Err(corrupt("bars recorded without a last bar time".to_string()));
            }
            Some(last) if state.recent.iter().any(|b| b.symbol != symbol || b.bar_time() > last) => {
                return Err(corrupt("recent bars do not precede the last bar time".to_string()));
            }
            _ => {}
        }

        let evaluator = MACrossover::with_order(*strategy, state.order).map_err(invalid)?;
        let mut recent: VecDeque<Bar> = state.recent.into();
        while recent.len() > duplicate_lookback {
            recent.pop_front();
        }

        Ok(Self {
            symbol,
            averages: state.averages,
            oscillator: state.oscillator,
            evaluator,
            last_time: state.last_time,
            recent,
            duplicate_lookback,
            bars_processed: state.bars_processed,
            ingested_through: state.ingested_through,
            halted: None,
        })
    }

    pub fn process(&mut self, bar: &Bar) -> Result<Outcome> {
        if self.halted.is_some() {
            return Err(Error::Halted { symbol: self.symbol });
        }
        if bar.symbol != self.symbol {
            return Err(Error::InvalidParameters(format!(
                "bar for symbol {} routed to the pipeline of symbol {}",
                bar.symbol, self.symbol
            )));
        }

        let bar_time = bar.bar_time();
        if let Some(last_time) = self.last_time {
            if bar_time <= last_time {
                if self.recent.iter().any(|seen| seen == bar) {
                    return Ok(Outcome::Duplicate);
                }
                return Err(Error::OutOfOrderBar {
                    symbol: self.symbol,
                    bar_time,
                    last_time,
                });
            }
        }

        let (ma_short, ma_long) = match self.averages.update(bar.close) {
            Ok(averages) => averages,
            Err(e) => return Err(self.halt(e)),
        };
        let rsi = match self.oscillator.update(bar.close) {
            Ok(rsi) => rsi,
            Err(e) => return Err(self.halt(e)),
        };

        let snapshot = IndicatorSnapshot {
            symbol: self.symbol,
            as_of: bar_time,
            ma_short,
            ma_long,
            rsi,
        };
        let signal = self.evaluator.assess(&snapshot).map(|kind| SignalEvent {
            symbol: self.symbol,
            kind,
            at: bar_time,
            price: bar.close,
            snapshot: snapshot.clone(),
        });

        self.last_time = Some(bar_time);
        self.bars_processed += 1;
        if self.duplicate_lookback > 0 {
            if self.recent.len() == self.duplicate_lookback {
                self.recent.pop_front();
            }
            self.recent.push_back(bar.clone());
        }

        Ok(Outcome::Processed { snapshot, signal })
    }

    /// Captures the state needed to resume after the last processed bar.
    pub fn checkpoint(&self) -> Result<PipelineState> {
        if self.halted.is_some() {
            return Err(Error::Halted { symbol: self.symbol });
        }
        Ok(PipelineState {
            version: STATE_VERSION,
            symbol: self.symbol,
            last_time: self.last_time,
            bars_processed: self.bars_processed,
            ingested_through: self.ingested_through,
            averages: self.averages.clone(),
            oscillator: self.oscillator.clone(),
            order: self.evaluator.order(),
            recent: self.recent.iter().cloned().collect(),
        })
    }

    // Running sums may be partially updated at this point, so nothing is ever
    // computed or checkpointed from this pipeline again.
    fn halt(&mut self, cause: indicators::Error) -> Error {
        self.halted = Some(cause.to_string());
        match cause {
            indicators::Error::Overflow => Error::ArithmeticOverflow { symbol: self.symbol },
            other => Error::CorruptState {
                symbol: self.symbol,
                reason: other.to_string(),
            },
        }
    }

    pub fn last_time(&self) -> Option<BarTime> {
        self.last_time
    }

    pub fn bars_processed(&self) -> u64 {
        self.bars_processed
    }

    pub fn ingested_through(&self) -> i64 {
        self.ingested_through
    }

    /// Records that every bar ingested at or before `sequence` has been read.
    pub fn set_ingested_through(&mut self, sequence: i64) {
        self.ingested_through = sequence;
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use core_types::SignalKind;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn bar_at(symbol: i64, minute: i64, close: Decimal) -> Bar {
        let at = start() + Duration::minutes(minute);
        Bar {
            symbol: SymbolId(symbol),
            date: at.date(),
            time: at.time(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
        }
    }

    fn small_pipeline() -> SymbolPipeline {
        let indicators = IndicatorSettings { short_period: 3, long_period: 5, rsi_period: 3 };
        SymbolPipeline::new(SymbolId(1), &indicators, &MACrossoverSettings::default(), 8).unwrap()
    }

    fn processed(outcome: Outcome) -> (IndicatorSnapshot, Option<SignalEvent>) {
        match outcome {
            Outcome::Processed { snapshot, signal } => (snapshot, signal),
            Outcome::Duplicate => panic!("unexpected duplicate"),
        }
    }

    #[test]
    fn default_windows_report_ten_point_two_on_bar_fifty() {
        let mut pipeline = SymbolPipeline::new(
            SymbolId(1),
            &IndicatorSettings::default(),
            &MACrossoverSettings::default(),
            64,
        )
        .unwrap();
        for minute in 0..49 {
            let (snapshot, _) = processed(pipeline.process(&bar_at(1, minute, dec!(10))).unwrap());
            assert_eq!(snapshot.ma_short, None);
        }
        let (snapshot, signal) = processed(pipeline.process(&bar_at(1, 49, dec!(20))).unwrap());
        assert_eq!(snapshot.ma_short, Some(dec!(10.2)));
        assert_eq!(snapshot.ma_long, None);
        assert_eq!(signal, None);
    }

    #[test]
    fn out_of_order_bar_is_rejected_without_touching_state() {
        let mut pipeline = small_pipeline();
        for minute in 0..4 {
            pipeline.process(&bar_at(1, minute, dec!(10))).unwrap();
        }
        let before = pipeline.checkpoint().unwrap();

        let err = pipeline.process(&bar_at(1, 1, dec!(99))).unwrap_err();
        assert!(matches!(err, Error::OutOfOrderBar { .. }));
        assert_eq!(pipeline.checkpoint().unwrap(), before);
        assert!(!pipeline.is_halted());

        // The pipeline keeps accepting in-order bars afterwards.
        assert!(pipeline.process(&bar_at(1, 4, dec!(10))).is_ok());
    }

    #[test]
    fn identical_duplicate_is_ignored() {
        let mut pipeline = small_pipeline();
        let first = bar_at(1, 0, dec!(10));
        let second = bar_at(1, 1, dec!(11));
        pipeline.process(&first).unwrap();
        pipeline.process(&second).unwrap();

        assert_eq!(pipeline.process(&second).unwrap(), Outcome::Duplicate);
        assert_eq!(pipeline.process(&first).unwrap(), Outcome::Duplicate);
        assert_eq!(pipeline.bars_processed(), 2);
    }

    #[test]
    fn conflicting_duplicate_is_out_of_order() {
        let mut pipeline = small_pipeline();
        pipeline.process(&bar_at(1, 0, dec!(10))).unwrap();
        let err = pipeline.process(&bar_at(1, 0, dec!(10.5))).unwrap_err();
        assert!(matches!(err, Error::OutOfOrderBar { .. }));
    }

    #[test]
    fn bar_for_another_symbol_is_refused() {
        let mut pipeline = small_pipeline();
        assert!(matches!(
            pipeline.process(&bar_at(2, 0, dec!(10))),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn overflow_halts_pipeline() {
        let mut pipeline = small_pipeline();
        pipeline.process(&bar_at(1, 0, Decimal::MAX)).unwrap();
        let err = pipeline.process(&bar_at(1, 1, Decimal::MAX)).unwrap_err();
        assert_eq!(err, Error::ArithmeticOverflow { symbol: SymbolId(1) });
        assert!(pipeline.is_halted());
        assert_eq!(
            pipeline.process(&bar_at(1, 2, dec!(1))).unwrap_err(),
            Error::Halted { symbol: SymbolId(1) }
        );
        assert!(pipeline.checkpoint().is_err());
    }

    /// short=2, long=3, rsi=4 over a slide, a recovery and a pullback.
    ///
    /// Index 5 crosses upward with RSI 27.27 (gains 3, losses 8) and index 10
    /// crosses downward with RSI 72.73 (gains 8, losses 3).
    fn crossing_closes() -> Vec<Decimal> {
        vec![
            dec!(20), dec!(16), dec!(12), dec!(8), dec!(8.5), dec!(11),
            dec!(15), dec!(19), dec!(23), dec!(22.5), dec!(20),
        ]
    }

    fn crossing_pipeline() -> SymbolPipeline {
        let indicators = IndicatorSettings { short_period: 2, long_period: 3, rsi_period: 4 };
        SymbolPipeline::new(SymbolId(1), &indicators, &MACrossoverSettings::default(), 8).unwrap()
    }

    #[test]
    fn emits_one_buy_and_one_sell_on_gated_crossings() {
        let mut pipeline = crossing_pipeline();
        let mut signals = Vec::new();
        for (minute, close) in crossing_closes().into_iter().enumerate() {
            let (_, signal) = processed(pipeline.process(&bar_at(1, minute as i64, close)).unwrap());
            if let Some(signal) = signal {
                signals.push((minute, signal));
            }
        }

        assert_eq!(signals.len(), 2);
        let (buy_index, buy) = &signals[0];
        assert_eq!(*buy_index, 5);
        assert_eq!(buy.kind, SignalKind::Buy);
        assert_eq!(buy.price, dec!(11));
        assert_eq!(buy.at, bar_at(1, 5, dec!(11)).bar_time());
        assert!(buy.snapshot.rsi.unwrap() < dec!(30));
        assert!(buy.snapshot.ma_short > buy.snapshot.ma_long);

        let (sell_index, sell) = &signals[1];
        assert_eq!(*sell_index, 10);
        assert_eq!(sell.kind, SignalKind::Sell);
        assert_eq!(sell.price, dec!(20));
        assert!(sell.snapshot.rsi.unwrap() > dec!(70));
    }

    #[test]
    fn restored_pipeline_continues_identically() {
        let closes = crossing_closes();
        let mut uninterrupted = crossing_pipeline();
        let expected: Vec<Outcome> = closes
            .iter()
            .enumerate()
            .map(|(minute, close)| uninterrupted.process(&bar_at(1, minute as i64, *close)).unwrap())
            .collect();

        let mut first_half = crossing_pipeline();
        for (minute, close) in closes.iter().enumerate().take(4) {
            first_half.process(&bar_at(1, minute as i64, *close)).unwrap();
        }
        let state = first_half.checkpoint().unwrap();
        let indicators = IndicatorSettings { short_period: 2, long_period: 3, rsi_period: 4 };
        let mut resumed = SymbolPipeline::restore(
            SymbolId(1),
            state,
            &indicators,
            &MACrossoverSettings::default(),
            8,
        )
        .unwrap();

        for (minute, close) in closes.iter().enumerate().skip(4) {
            let outcome = resumed.process(&bar_at(1, minute as i64, *close)).unwrap();
            assert_eq!(outcome, expected[minute]);
        }
    }

    #[test]
    fn restore_rejects_mismatched_periods() {
        let mut pipeline = crossing_pipeline();
        pipeline.process(&bar_at(1, 0, dec!(10))).unwrap();
        let state = pipeline.checkpoint().unwrap();
        let err = SymbolPipeline::restore(
            SymbolId(1),
            state,
            &IndicatorSettings::default(),
            &MACrossoverSettings::default(),
            8,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CorruptState { .. }));
    }

    #[test]
    fn restore_rejects_foreign_symbol() {
        let mut pipeline = crossing_pipeline();
        pipeline.process(&bar_at(1, 0, dec!(10))).unwrap();
        let state = pipeline.checkpoint().unwrap();
        let indicators = IndicatorSettings { short_period: 2, long_period: 3, rsi_period: 4 };
        let err = SymbolPipeline::restore(SymbolId(2), state, &indicators, &MACrossoverSettings::default(), 8)
            .unwrap_err();
        assert!(matches!(err, Error::CorruptState { .. }));
    }
}
