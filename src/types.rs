use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Opening gap versus the previous close, in percent
    pub fn gap_pct(&self, prev_close: f64) -> Option<f64> {
        crate::indicators::pct_change(prev_close, self.open)
    }
}

/// Counterparty class of an order-flow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyClass {
    Foreign,
    InvestmentTrust,
    Dealer,
    Retail,
    Other,
}

impl CounterpartyClass {
    /// Institutional classes count towards institutional net flow
    pub fn is_institutional(&self) -> bool {
        matches!(
            self,
            CounterpartyClass::Foreign | CounterpartyClass::InvestmentTrust | CounterpartyClass::Dealer
        )
    }
}

/// Daily buy/sell volume for one counterparty class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub date: NaiveDate,
    pub counterparty: CounterpartyClass,
    pub buy_volume: f64,
    pub sell_volume: f64,
}

impl FlowRecord {
    pub fn net(&self) -> f64 {
        self.buy_volume - self.sell_volume
    }

    pub fn gross(&self) -> f64 {
        self.buy_volume + self.sell_volume
    }
}

/// Margin and short balances as of a trading day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginRecord {
    pub date: NaiveDate,
    pub margin_balance: f64,
    pub short_balance: f64,
}

/// Monthly revenue with year-over-year growth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueRecord {
    pub year: i32,
    pub month: u32,
    pub yoy_growth_pct: f64,
}

impl RevenueRecord {
    pub fn period(&self) -> (i32, u32) {
        (self.year, self.month)
    }
}

/// News headline attached to a security
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub date: NaiveDate,
    pub title: String,
}

/// Everything known about one security for a single assessment request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityInputs {
    pub symbol: String,
    #[serde(default)]
    pub bars: Vec<Bar>,
    #[serde(default)]
    pub flows: Vec<FlowRecord>,
    #[serde(default)]
    pub margins: Vec<MarginRecord>,
    #[serde(default)]
    pub revenues: Vec<RevenueRecord>,
    #[serde(default)]
    pub headlines: Vec<Headline>,
    /// Reference date for recency windows; defaults to the last bar date
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

impl SecurityInputs {
    /// Sorted, de-duplicated copy suitable for scoring
    pub fn normalized(&self) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bars: normalize_bars(&self.bars),
            flows: normalize_flows(&self.flows),
            margins: normalize_margins(&self.margins),
            revenues: normalize_revenues(&self.revenues),
            headlines: self.headlines.clone(),
            as_of: self.as_of,
        }
    }

    pub fn effective_as_of(&self) -> Option<NaiveDate> {
        self.as_of.or_else(|| self.bars.last().map(|b| b.date))
    }
}

/// Fixed macro symbols consumed by the crash-risk composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroSymbol {
    /// Equity volatility index
    Vix,
    /// Bond volatility index
    Move,
    /// Semiconductor sector ETF
    Soxx,
    /// Broad tech ETF
    Qqq,
    /// Dollar index
    Dxy,
    /// Dollar/yen cross rate
    UsdJpy,
}

impl MacroSymbol {
    pub fn ticker(&self) -> &'static str {
        match self {
            MacroSymbol::Vix => "^VIX",
            MacroSymbol::Move => "^MOVE",
            MacroSymbol::Soxx => "SOXX",
            MacroSymbol::Qqq => "QQQ",
            MacroSymbol::Dxy => "DX-Y.NYB",
            MacroSymbol::UsdJpy => "JPY=X",
        }
    }
}

/// Parallel close/date series for one macro symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroSeries {
    pub symbol: MacroSymbol,
    pub closes: Vec<f64>,
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    pub available: bool,
}

impl MacroSeries {
    pub fn new(symbol: MacroSymbol, closes: Vec<f64>) -> Self {
        Self {
            symbol,
            closes,
            dates: Vec::new(),
            available: true,
        }
    }

    pub fn unavailable(symbol: MacroSymbol) -> Self {
        Self {
            symbol,
            closes: Vec::new(),
            dates: Vec::new(),
            available: false,
        }
    }

    /// Closes with non-finite values removed
    pub fn finite_closes(&self) -> Vec<f64> {
        self.closes.iter().copied().filter(|c| c.is_finite()).collect()
    }

    pub fn points(&self) -> usize {
        self.finite_closes().len()
    }
}

/// Sort bars by date, keep the last bar per date, drop unusable closes
pub fn normalize_bars(bars: &[Bar]) -> Vec<Bar> {
    let mut out: Vec<Bar> = bars
        .iter()
        .filter(|b| b.close.is_finite() && b.close > 0.0)
        .copied()
        .collect();
    out.sort_by_key(|b| b.date);
    keep_last_per_key(out, |b| b.date)
}

/// Collapse runs of equal keys in a stably sorted vector, keeping the last record of each run
fn keep_last_per_key<T, K: PartialEq>(sorted: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut deduped: Vec<T> = Vec::with_capacity(sorted.len());
    for record in sorted {
        match deduped.last_mut() {
            Some(last) if key(last) == key(&record) => *last = record,
            _ => deduped.push(record),
        }
    }
    deduped
}

pub fn normalize_flows(flows: &[FlowRecord]) -> Vec<FlowRecord> {
    let mut out: Vec<FlowRecord> = flows
        .iter()
        .filter(|f| f.buy_volume.is_finite() && f.sell_volume.is_finite())
        .copied()
        .collect();
    out.sort_by_key(|f| f.date);
    out
}

pub fn normalize_margins(margins: &[MarginRecord]) -> Vec<MarginRecord> {
    let mut out: Vec<MarginRecord> = margins
        .iter()
        .filter(|m| m.margin_balance.is_finite())
        .copied()
        .collect();
    out.sort_by_key(|m| m.date);
    keep_last_per_key(out, |m| m.date)
}

pub fn normalize_revenues(revenues: &[RevenueRecord]) -> Vec<RevenueRecord> {
    let mut out: Vec<RevenueRecord> = revenues
        .iter()
        .filter(|r| r.yoy_growth_pct.is_finite())
        .copied()
        .collect();
    out.sort_by_key(|r| r.period());
    keep_last_per_key(out, |r| r.period())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_normalize_bars_sorts_and_dedupes() {
        let bars = vec![bar(3, 12.0), bar(1, 10.0), bar(3, 13.0), bar(2, f64::NAN)];
        let out = normalize_bars(&bars);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].close, 10.0);
        // last bar per date wins
        assert_eq!(out[1].close, 13.0);
    }

    #[test]
    fn test_normalize_revenues_orders_by_period() {
        let revs = vec![
            RevenueRecord { year: 2024, month: 2, yoy_growth_pct: 5.0 },
            RevenueRecord { year: 2023, month: 12, yoy_growth_pct: 1.0 },
            RevenueRecord { year: 2024, month: 1, yoy_growth_pct: f64::INFINITY },
        ];
        let out = normalize_revenues(&revs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].year, 2023);
    }

    #[test]
    fn test_every_normalizer_keeps_last_duplicate() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let margins = vec![
            MarginRecord { date: day(2), margin_balance: 500.0, short_balance: 1.0 },
            MarginRecord { date: day(1), margin_balance: 100.0, short_balance: 1.0 },
            MarginRecord { date: day(2), margin_balance: 700.0, short_balance: 1.0 },
        ];
        let out = normalize_margins(&margins);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].margin_balance, 700.0);

        let revs = vec![
            RevenueRecord { year: 2024, month: 3, yoy_growth_pct: 4.0 },
            RevenueRecord { year: 2024, month: 2, yoy_growth_pct: 1.0 },
            RevenueRecord { year: 2024, month: 3, yoy_growth_pct: 9.5 },
        ];
        let out = normalize_revenues(&revs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].yoy_growth_pct, 9.5);
    }

    #[test]
    fn test_institutional_classes() {
        assert!(CounterpartyClass::Foreign.is_institutional());
        assert!(CounterpartyClass::Dealer.is_institutional());
        assert!(!CounterpartyClass::Retail.is_institutional());
    }
}
