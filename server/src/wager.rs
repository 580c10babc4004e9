use chrono::NaiveDate;
use common::error::Result;
use common::money::{validate_amount, validate_odds};
use common::{resolve, BetStatus, BookError, LegId, NewLeg, OutcomeLeg, Settlement, WagerId};
use rust_decimal::Decimal;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_LEG_TITLE_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WagerState {
    Open,
    Settled(Settlement),
}

/// A wager and its legs. Open wagers accept edits; once settled the
/// settlement snapshot is authoritative and nothing but deletion applies.
///
/// Stake changes and settlement go through
/// [`SettlementCoordinator`](crate::coordinator::SettlementCoordinator), which
/// moves the money that goes with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wager {
    id: WagerId,
    title: String,
    placed_on: NaiveDate,
    stake: Decimal,
    legs: Vec<OutcomeLeg>,
    state: WagerState,
}

fn validate_title(title: String) -> Result<String> {
    if title.trim().is_empty() {
        return Err(BookError::validation("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(BookError::validation(
            "title",
            format!("longer than {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(title)
}

fn validate_leg_title(title: String) -> Result<String> {
    if title.chars().count() > MAX_LEG_TITLE_LEN {
        return Err(BookError::validation(
            "leg title",
            format!("longer than {MAX_LEG_TITLE_LEN} characters"),
        ));
    }
    Ok(title)
}

impl Wager {
    pub fn create(
        id: WagerId,
        title: impl Into<String>,
        placed_on: NaiveDate,
        initial_stake: Decimal,
    ) -> Result<Self> {
        Ok(Self {
            id,
            title: validate_title(title.into())?,
            placed_on,
            stake: validate_amount("stake", initial_stake)?,
            legs: vec![],
            state: WagerState::Open,
        })
    }

    /// Rebuilds a wager from stored fields without re-running edit rules.
    pub fn from_parts(
        id: WagerId,
        title: String,
        placed_on: NaiveDate,
        stake: Decimal,
        legs: Vec<OutcomeLeg>,
        state: WagerState,
    ) -> Self {
        Self {
            id,
            title,
            placed_on,
            stake,
            legs,
            state,
        }
    }

    pub fn id(&self) -> WagerId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn placed_on(&self) -> NaiveDate {
        self.placed_on
    }

    pub fn stake(&self) -> Decimal {
        self.stake
    }

    pub fn legs(&self) -> &[OutcomeLeg] {
        &self.legs
    }

    pub fn leg(&self, leg_id: LegId) -> Option<&OutcomeLeg> {
        self.legs.iter().find(|leg| leg.id == leg_id)
    }

    pub fn state(&self) -> &WagerState {
        &self.state
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match &self.state {
            WagerState::Open => None,
            WagerState::Settled(settlement) => Some(settlement),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, WagerState::Settled(_))
    }

    pub fn ensure_open(&self) -> Result<()> {
        match self.state {
            WagerState::Open => Ok(()),
            WagerState::Settled(_) => Err(BookError::InvalidState { wager_id: self.id }),
        }
    }

    fn leg_mut(&mut self, leg_id: LegId) -> Result<&mut OutcomeLeg> {
        self.legs
            .iter_mut()
            .find(|leg| leg.id == leg_id)
            .ok_or(BookError::leg_not_found(leg_id))
    }

    pub fn rename(&mut self, title: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.title = validate_title(title.into())?;
        Ok(())
    }

    pub fn add_leg(&mut self, leg_id: LegId, leg: NewLeg) -> Result<LegId> {
        self.ensure_open()?;
        let odds = validate_odds(leg.odds)?;
        let title = validate_leg_title(leg.title)?;
        self.ensure_odds_fit(None, odds)?;
        self.legs.push(OutcomeLeg {
            id: leg_id,
            title,
            sport: leg.sport,
            odds,
            status: leg.status,
        });
        Ok(leg_id)
    }

    pub fn remove_leg(&mut self, leg_id: LegId) -> Result<OutcomeLeg> {
        self.ensure_open()?;
        let index = self
            .legs
            .iter()
            .position(|leg| leg.id == leg_id)
            .ok_or(BookError::leg_not_found(leg_id))?;
        Ok(self.legs.remove(index))
    }

    pub fn set_leg_status(&mut self, leg_id: LegId, status: BetStatus) -> Result<()> {
        self.ensure_open()?;
        self.leg_mut(leg_id)?.status = status;
        Ok(())
    }

    pub fn set_leg_odds(&mut self, leg_id: LegId, odds: Decimal) -> Result<()> {
        self.ensure_open()?;
        let odds = validate_odds(odds)?;
        if self.leg(leg_id).is_none() {
            return Err(BookError::leg_not_found(leg_id));
        }
        self.ensure_odds_fit(Some(leg_id), odds)?;
        self.leg_mut(leg_id)?.odds = odds;
        Ok(())
    }

    pub fn edit_leg(
        &mut self,
        leg_id: LegId,
        title: impl Into<String>,
        sport: Option<String>,
    ) -> Result<()> {
        self.ensure_open()?;
        let title = validate_leg_title(title.into())?;
        let leg = self.leg_mut(leg_id)?;
        leg.title = title;
        leg.sport = sport;
        Ok(())
    }

    pub fn current_status(&self) -> BetStatus {
        resolve(self.legs.iter().map(|leg| leg.status))
    }

    /// Product of every leg's odds, `1` for a wager without legs.
    pub fn total_odds(&self) -> Decimal {
        self.legs.iter().fold(Decimal::ONE, |acc, leg| acc * leg.odds)
    }

    // keeps total_odds() from overflowing once `odds` replaces (or joins) the legs
    fn ensure_odds_fit(&self, replacing: Option<LegId>, odds: Decimal) -> Result<()> {
        self.legs
            .iter()
            .filter(|leg| Some(leg.id) != replacing)
            .try_fold(odds, |acc, leg| acc.checked_mul(leg.odds))
            .map(|_| ())
            .ok_or(BookError::validation("odds", "combined odds are too large"))
    }

    /// Profit or loss realised by a settled wager; open wagers have none.
    pub fn profit_loss(&self) -> Decimal {
        match &self.state {
            WagerState::Settled(settlement) if settlement.status == BetStatus::Won => {
                settlement.winnings - self.stake
            }
            WagerState::Settled(_) => -self.stake,
            WagerState::Open => Decimal::ZERO,
        }
    }

    pub(crate) fn reserve_stake(&mut self, stake: Decimal) {
        self.stake = stake;
    }

    pub(crate) fn freeze(&mut self, settlement: Settlement) {
        self.state = WagerState::Settled(settlement);
    }
}

impl From<&Wager> for common::Wager {
    fn from(wager: &Wager) -> Self {
        common::Wager {
            id: wager.id,
            title: wager.title.clone(),
            placed_on: wager.placed_on,
            stake: wager.stake,
            legs: wager.legs.clone(),
            settlement: wager.settlement().cloned(),
        }
    }
}
