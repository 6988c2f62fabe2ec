// In crates/engine/src/cursor.rs

use core_types::{Bar, BarTime, SymbolId};
use database::BarStore;
use std::collections::VecDeque;
use std::sync::Arc;

/// Pull-based reader over one symbol's bars, fetched from the store page by page.
///
/// Only bars ingested at or before `through` are returned.
pub struct BarCursor {
    store: Arc<dyn BarStore>,
    symbol: SymbolId,
    after: Option<BarTime>,
    through: i64,
    batch_size: usize,
    buffer: VecDeque<Bar>,
}

impl BarCursor {
    /// Starts reading strictly after `after`, or from the first bar when `None`.
    pub fn new(
        store: Arc<dyn BarStore>,
        symbol: SymbolId,
        after: Option<BarTime>,
        through: i64,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            symbol,
            after,
            through,
            batch_size: batch_size.max(1),
            buffer: VecDeque::new(),
        }
    }

    /// The next bar in (date, time) order, or `None` at end of stream.
    pub async fn next_bar(&mut self) -> database::Result<Option<Bar>> {
        if self.buffer.is_empty() {
            let page = self
                .store
                .bars_after(self.symbol, self.after, self.through, self.batch_size)
                .await?;
            if let Some(last) = page.last() {
                self.after = Some(last.bar_time());
            }
            self.buffer.extend(page);
        }
        Ok(self.buffer.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use database::MemoryStore;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn walks_all_pages_then_ends() {
        let store = MemoryStore::new();
        store.insert_bars((1..=7).map(|day| Bar {
            symbol: SymbolId(1),
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            open: Decimal::ONE,
            high: Decimal::ONE,
            low: Decimal::ONE,
            close: Decimal::from(day),
            volume: Decimal::ONE,
        }));

        let mut cursor = BarCursor::new(Arc::new(store), SymbolId(1), None, 7, 3);
        let mut closes = Vec::new();
        while let Some(bar) = cursor.next_bar().await.unwrap() {
            closes.push(bar.close);
        }
        assert_eq!(closes, (1..=7).map(Decimal::from).collect::<Vec<_>>());
        assert_eq!(cursor.next_bar().await.unwrap(), None);
    }
}
