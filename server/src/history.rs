use chrono::NaiveDate;
use common::{BetStatus, DailyResult, HistorySummary};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::wager::Wager;

/// Inclusive date window; an open end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Win/loss counts and profit over the settled wagers placed within `range`.
pub fn summarize<'a, I>(wagers: I, range: DateRange) -> HistorySummary
where
    I: IntoIterator<Item = &'a Wager>,
{
    let mut summary = HistorySummary::default();
    let mut daily: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

    for wager in wagers {
        let Some(settlement) = wager.settlement() else {
            continue;
        };
        if !range.contains(wager.placed_on()) {
            continue;
        }
        match settlement.status {
            BetStatus::Won => summary.won += 1,
            BetStatus::Lost => summary.lost += 1,
            BetStatus::Pending => {}
        }
        let result = wager.profit_loss();
        summary.total_profit += result;
        *daily.entry(wager.placed_on()).or_default() += result;
    }

    summary.settled = summary.won + summary.lost;
    if summary.settled > 0 {
        summary.win_rate =
            (Decimal::from(summary.won) / Decimal::from(summary.settled)).round_dp(4);
    }
    summary.daily = daily
        .into_iter()
        .map(|(date, net)| DailyResult { date, net })
        .collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::NewLeg;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    use crate::coordinator::SettlementCoordinator;
    use crate::ids::SequentialIds;
    use crate::ledger::Ledger;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn settled(
        book: &mut SettlementCoordinator,
        day: u32,
        stake: Decimal,
        odds: Decimal,
        status: BetStatus,
    ) {
        let w = book.create_wager("bet", date(day), stake).unwrap();
        book.add_leg(w, NewLeg::new(odds).with_status(status)).unwrap();
        book.settle(w, Utc::now()).unwrap();
    }

    fn sample() -> SettlementCoordinator {
        let mut book = SettlementCoordinator::new(
            Ledger::new(dec!(200)).unwrap(),
            Arc::new(SequentialIds::new()),
        );
        settled(&mut book, 1, dec!(10), dec!(2.50), BetStatus::Won);
        settled(&mut book, 1, dec!(5), dec!(3), BetStatus::Lost);
        settled(&mut book, 3, dec!(20), dec!(1.50), BetStatus::Won);
        settled(&mut book, 4, dec!(8), dec!(2), BetStatus::Lost);
        book.create_wager("still open", date(2), dec!(50)).unwrap();
        book
    }

    #[test]
    fn summary_over_everything() {
        let book = sample();
        let summary = summarize(book.wagers(), DateRange::default());
        assert_eq!(summary.won, 2);
        assert_eq!(summary.lost, 2);
        assert_eq!(summary.settled, 4);
        assert_eq!(summary.win_rate, dec!(0.5));
        // +15 -5 +10 -8
        assert_eq!(summary.total_profit, dec!(12));
        assert_eq!(
            summary.daily,
            vec![
                DailyResult { date: date(1), net: dec!(10) },
                DailyResult { date: date(3), net: dec!(10) },
                DailyResult { date: date(4), net: dec!(-8) },
            ]
        );
    }

    #[test]
    fn summary_within_range() {
        let book = sample();
        let summary = summarize(book.wagers(), DateRange::new(Some(date(2)), Some(date(3))));
        assert_eq!(summary.settled, 1);
        assert_eq!(summary.win_rate, dec!(1));
        assert_eq!(summary.total_profit, dec!(10));
    }

    #[test]
    fn empty_history() {
        let summary = summarize(std::iter::empty(), DateRange::default());
        assert_eq!(summary, HistorySummary::default());
    }
}
