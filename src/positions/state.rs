//! Per-coin position accumulator
//!
//! [`PositionState::apply`] is a pure reducer: it reads the current state
//! and one signed fill and returns the next state, plus the round-trip it
//! completed, if any.

use rust_decimal::Decimal;

use super::Direction;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Open(OpenPosition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub direction: Direction,
    /// Positive when long, negative when short, never zero
    pub signed_size: Decimal,
    pub avg_entry_price: Decimal,
    /// Sum of price x size over the quantity still held
    pub cost_basis: Decimal,
    pub opened_at: u64,
    pub realized_pnl: Decimal,
}

impl OpenPosition {
    fn start(
        direction: Direction,
        signed_size: Decimal,
        price: Decimal,
        timestamp: u64,
    ) -> Option<Self> {
        Some(Self {
            direction,
            signed_size,
            avg_entry_price: price,
            cost_basis: price.checked_mul(signed_size.abs())?,
            opened_at: timestamp,
            realized_pnl: Decimal::ZERO,
        })
    }
}

/// A position that went back to exactly zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedRoundTrip {
    pub direction: Direction,
    pub opened_at: u64,
    pub closed_at: u64,
    pub realized_pnl: Decimal,
}

/// Result of applying one fill
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: PositionState,
    pub closed: Option<ClosedRoundTrip>,
}

impl Step {
    fn hold(state: PositionState) -> Self {
        Self { state, closed: None }
    }
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    /// Apply a fill of `signed_size` (positive buys, negative sells)
    ///
    /// A fill that crosses zero is split: the part up to zero closes the
    /// current position, the remainder opens the opposite side at the same
    /// price and time.
    ///
    /// Returns `None` when the fill's notional does not fit in a `Decimal`;
    /// `self` is left as it was and the caller decides what to do with the
    /// fill.
    pub fn apply(&self, signed_size: Decimal, price: Decimal, timestamp: u64) -> Option<Step> {
        let Some(fill_direction) = Direction::of(signed_size) else {
            return Some(Step::hold(self.clone()));
        };

        let pos = match self {
            PositionState::Flat => {
                let opened = OpenPosition::start(fill_direction, signed_size, price, timestamp)?;
                return Some(Step::hold(PositionState::Open(opened)));
            }
            PositionState::Open(pos) => pos,
        };

        let held = pos.signed_size.abs();
        let traded = signed_size.abs();

        if fill_direction == pos.direction {
            let size = held.checked_add(traded)?;
            let cost_basis = pos.cost_basis.checked_add(price.checked_mul(traded)?)?;
            return Some(Step::hold(PositionState::Open(OpenPosition {
                signed_size: pos.signed_size.checked_add(signed_size)?,
                avg_entry_price: cost_basis.checked_div(size)?,
                cost_basis,
                ..pos.clone()
            })));
        }

        let reduced = held.min(traded);
        // Closing everything releases the whole basis, so full closes are exact
        let released = if reduced == held {
            pos.cost_basis
        } else {
            pos.cost_basis.checked_mul(reduced)?.checked_div(held)?
        };
        let trade_pnl = price
            .checked_mul(reduced)?
            .checked_sub(released)?
            .checked_mul(pos.direction.sign())?;
        let realized_pnl = pos.realized_pnl.checked_add(trade_pnl)?;
        let remaining = pos.signed_size.checked_add(signed_size)?;

        match Direction::of(remaining) {
            Some(direction) if direction == pos.direction => {
                Some(Step::hold(PositionState::Open(OpenPosition {
                    signed_size: remaining,
                    cost_basis: pos.cost_basis.checked_sub(released)?,
                    realized_pnl,
                    ..pos.clone()
                })))
            }
            flipped => {
                let closed = ClosedRoundTrip {
                    direction: pos.direction,
                    opened_at: pos.opened_at,
                    closed_at: timestamp,
                    realized_pnl,
                };
                let state = match flipped {
                    Some(direction) => PositionState::Open(OpenPosition::start(
                        direction, remaining, price, timestamp,
                    )?),
                    None => PositionState::Flat,
                };
                Some(Step {
                    state,
                    closed: Some(closed),
                })
            }
        }
    }
}
