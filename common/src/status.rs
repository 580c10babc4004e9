use crate::BetStatus;

/// Rolls leg statuses up into the status of the whole wager.
///
/// Any `LOST` leg loses the wager, a wager wins only when every leg has won,
/// and anything else (including a wager with no legs) is still `PENDING`.
pub fn resolve<I>(statuses: I) -> BetStatus
where
    I: IntoIterator<Item = BetStatus>,
{
    let mut seen_any = false;
    let mut all_won = true;
    for status in statuses {
        seen_any = true;
        match status {
            BetStatus::Lost => return BetStatus::Lost,
            BetStatus::Pending => all_won = false,
            BetStatus::Won => {}
        }
    }

    if seen_any && all_won {
        BetStatus::Won
    } else {
        BetStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BetStatus::*;

    const ALL: [BetStatus; 3] = [Pending, Won, Lost];

    #[test]
    fn empty_is_pending() {
        assert_eq!(resolve([]), Pending);
    }

    #[test]
    fn documented_examples() {
        assert_eq!(resolve([Won, Won, Lost]), Lost);
        assert_eq!(resolve([Won, Won]), Won);
        assert_eq!(resolve([Won, Pending]), Pending);
        assert_eq!(resolve([Pending, Lost]), Lost);
    }

    fn sequences(len: usize) -> Vec<Vec<BetStatus>> {
        if len == 0 {
            return vec![vec![]];
        }
        let mut out = Vec::new();
        for prefix in sequences(len - 1) {
            for status in ALL {
                let mut seq = prefix.clone();
                seq.push(status);
                out.push(seq);
            }
        }
        out
    }

    #[test]
    fn precedence_holds_for_every_short_sequence() {
        for len in 0..=4 {
            for seq in sequences(len) {
                let expected = if seq.contains(&Lost) {
                    Lost
                } else if !seq.is_empty() && seq.iter().all(|s| *s == Won) {
                    Won
                } else {
                    Pending
                };
                assert_eq!(resolve(seq.iter().copied()), expected, "{seq:?}");
            }
        }
    }

    #[test]
    fn order_does_not_matter() {
        assert_eq!(resolve([Lost, Won, Pending]), resolve([Pending, Won, Lost]));
        assert_eq!(resolve([Pending, Won]), resolve([Won, Pending]));
    }
}
