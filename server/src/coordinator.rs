use chrono::{DateTime, NaiveDate, Utc};
use common::error::Result;
use common::money::{round_money, validate_amount};
use common::{BetStatus, BookError, LegId, NewLeg, Settlement, WagerId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ids::IdSource;
use crate::ledger::Ledger;
use crate::wager::Wager;

/// Ties wagers to the account balance. The only place that moves money:
/// stake reservation, settlement payouts and deletion refunds.
///
/// Every operation checks all of its preconditions before touching the
/// ledger or the wager, so a rejected call leaves the book as it was.
#[derive(Debug, Clone)]
pub struct SettlementCoordinator {
    ledger: Ledger,
    wagers: BTreeMap<WagerId, Wager>,
    ids: Arc<dyn IdSource>,
}

/// State captured before an operation so it can be put back if the change
/// cannot be persisted.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    ledger: Ledger,
    wager_id: Option<WagerId>,
    previous: Option<Wager>,
}

impl Checkpoint {
    pub fn wager_id(&self) -> Option<WagerId> {
        self.wager_id
    }

    /// Marks a wager created after the checkpoint was taken.
    pub fn track_created(mut self, wager_id: WagerId) -> Self {
        self.wager_id = Some(wager_id);
        self.previous = None;
        self
    }
}

impl SettlementCoordinator {
    pub fn new(ledger: Ledger, ids: Arc<dyn IdSource>) -> Self {
        Self {
            ledger,
            wagers: BTreeMap::new(),
            ids,
        }
    }

    pub fn restore(ledger: Ledger, wagers: Vec<Wager>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            ledger,
            wagers: wagers.into_iter().map(|w| (w.id(), w)).collect(),
            ids,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.ledger.balance()
    }

    pub fn wager(&self, wager_id: WagerId) -> Result<&Wager> {
        self.wagers
            .get(&wager_id)
            .ok_or(BookError::wager_not_found(wager_id))
    }

    pub fn wagers(&self) -> impl Iterator<Item = &Wager> {
        self.wagers.values()
    }

    fn wager_mut(&mut self, wager_id: WagerId) -> Result<&mut Wager> {
        self.wagers
            .get_mut(&wager_id)
            .ok_or(BookError::wager_not_found(wager_id))
    }

    pub fn checkpoint(&self, wager_id: Option<WagerId>) -> Checkpoint {
        Checkpoint {
            ledger: self.ledger.clone(),
            wager_id,
            previous: wager_id.and_then(|id| self.wagers.get(&id).cloned()),
        }
    }

    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.ledger = checkpoint.ledger;
        if let Some(wager_id) = checkpoint.wager_id {
            match checkpoint.previous {
                Some(wager) => {
                    self.wagers.insert(wager_id, wager);
                }
                None => {
                    self.wagers.remove(&wager_id);
                }
            }
        }
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<Decimal> {
        self.ledger.credit(amount)?;
        info!(%amount, balance = %self.ledger.balance(), "deposit");
        Ok(self.ledger.balance())
    }

    /// Opens a wager, reserving `stake` from the balance straight away.
    pub fn create_wager(
        &mut self,
        title: impl Into<String>,
        placed_on: NaiveDate,
        stake: Decimal,
    ) -> Result<WagerId> {
        let wager = Wager::create(self.ids.next_id(), title, placed_on, stake)?;
        self.ledger.debit(wager.stake())?;

        let wager_id = wager.id();
        info!(%wager_id, stake = %wager.stake(), balance = %self.ledger.balance(), "wager created");
        self.wagers.insert(wager_id, wager);
        Ok(wager_id)
    }

    pub fn rename_wager(&mut self, wager_id: WagerId, title: impl Into<String>) -> Result<()> {
        self.wager_mut(wager_id)?.rename(title)
    }

    pub fn add_leg(&mut self, wager_id: WagerId, leg: NewLeg) -> Result<LegId> {
        let leg_id = self.ids.next_id();
        self.wager_mut(wager_id)?.add_leg(leg_id, leg)
    }

    pub fn remove_leg(&mut self, wager_id: WagerId, leg_id: LegId) -> Result<()> {
        self.wager_mut(wager_id)?.remove_leg(leg_id).map(|_| ())
    }

    pub fn set_leg_status(
        &mut self,
        wager_id: WagerId,
        leg_id: LegId,
        status: BetStatus,
    ) -> Result<()> {
        self.wager_mut(wager_id)?.set_leg_status(leg_id, status)
    }

    pub fn set_leg_odds(&mut self, wager_id: WagerId, leg_id: LegId, odds: Decimal) -> Result<()> {
        self.wager_mut(wager_id)?.set_leg_odds(leg_id, odds)
    }

    pub fn edit_leg(
        &mut self,
        wager_id: WagerId,
        leg_id: LegId,
        title: impl Into<String>,
        sport: Option<String>,
    ) -> Result<()> {
        self.wager_mut(wager_id)?.edit_leg(leg_id, title, sport)
    }

    /// Moves the wager's stake to `new_stake`, debiting an increase from the
    /// balance and crediting a decrease back.
    pub fn set_stake(&mut self, wager_id: WagerId, new_stake: Decimal) -> Result<()> {
        let wager = self.wager(wager_id)?;
        wager.ensure_open()?;
        let new_stake = validate_amount("stake", new_stake)?;
        let diff = new_stake - wager.stake();

        if let Err(e) = self.ledger.adjust(-diff) {
            debug!(%wager_id, %new_stake, error = %e, "stake change rejected");
            return Err(e);
        }
        self.wager_mut(wager_id)?.reserve_stake(new_stake);
        info!(%wager_id, stake = %new_stake, balance = %self.ledger.balance(), "stake set");
        Ok(())
    }

    /// Freezes the wager's outcome and pays out a win. A wager settles at
    /// most once; later calls fail with `InvalidState` and move no money.
    pub fn settle(&mut self, wager_id: WagerId, settled_at: DateTime<Utc>) -> Result<Settlement> {
        let wager = self.wager(wager_id)?;
        wager.ensure_open()?;
        if wager.stake() <= Decimal::ZERO {
            return Err(BookError::ZeroStake { wager_id });
        }
        if wager.legs().is_empty() {
            return Err(BookError::NoLegs { wager_id });
        }
        if wager.legs().iter().any(|leg| leg.status == BetStatus::Pending) {
            return Err(BookError::PendingLegs { wager_id });
        }

        let status = wager.current_status();
        let total_odds = wager.total_odds();
        let winnings = match status {
            BetStatus::Won => wager
                .stake()
                .checked_mul(total_odds)
                .map(round_money)
                .ok_or(BookError::validation("winnings", "payout is too large"))?,
            _ => Decimal::ZERO,
        };

        if status == BetStatus::Won {
            self.ledger.credit(winnings)?;
        }
        let settlement = Settlement {
            status,
            total_odds,
            winnings,
            settled_at,
        };
        self.wager_mut(wager_id)?.freeze(settlement.clone());
        info!(%wager_id, %status, %winnings, balance = %self.ledger.balance(), "wager settled");
        Ok(settlement)
    }

    /// Removes a wager, refunding its stake and clawing back any winnings it
    /// paid. Returns the net amount applied to the balance.
    pub fn delete_wager(&mut self, wager_id: WagerId) -> Result<Decimal> {
        let wager = self.wager(wager_id)?;
        let refund = wager.stake();
        let clawback = match wager.settlement() {
            Some(settlement) if settlement.status == BetStatus::Won => settlement.winnings,
            _ => Decimal::ZERO,
        };
        let lost = matches!(wager.settlement(), Some(s) if s.status == BetStatus::Lost);

        let delta = refund - clawback;
        let projected = self.ledger.projected(delta)?;
        if projected < Decimal::ZERO {
            debug!(%wager_id, %projected, "delete rejected");
            return Err(BookError::NegativeBalance { projected });
        }

        self.ledger.adjust(delta)?;
        self.wagers.remove(&wager_id);
        if lost {
            warn!(%wager_id, %refund, "deleted a lost wager; its stake was refunded");
        }
        info!(%wager_id, %delta, balance = %self.ledger.balance(), "wager deleted");
        Ok(delta)
    }
}
