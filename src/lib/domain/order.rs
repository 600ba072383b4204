use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Tradable instrument: token contract plus instance id (zero for fungible assets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentRef {
    pub contract: Address,
    pub instance_id: U256,
}

impl InstrumentRef {
    pub fn new(contract: Address, instance_id: U256) -> Self {
        Self {
            contract,
            instance_id,
        }
    }
}

/// Order type. Discriminants are part of the commitment encoding and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OrderKind {
    Market = 0,
    Limit = 1,
    Iceberg = 2,
    VolumeWeighted = 3,
    TimeWeighted = 4,
}

impl OrderKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OrderKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Market),
            1 => Ok(Self::Limit),
            2 => Ok(Self::Iceberg),
            3 => Ok(Self::VolumeWeighted),
            4 => Ok(Self::TimeWeighted),
            other => Err(other),
        }
    }
}

/// Discriminants are part of the commitment encoding and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Buy),
            1 => Ok(Self::Sell),
            other => Err(other),
        }
    }
}

/// The private order payload, disclosed only at reveal time.
///
/// Amounts are in the instrument's fixed-point unit. `expiry` is a unix
/// timestamp in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParameters {
    pub instrument: InstrumentRef,
    pub kind: OrderKind,
    pub side: Side,
    pub quantity: U256,
    pub limit_price: U256,
    pub minimum_fill: U256,
    pub expiry: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderValidationError {
    #[error("quantity must be positive")]
    ZeroQuantity,

    #[error("minimum fill {minimum_fill} exceeds quantity {quantity}")]
    MinimumFillExceedsQuantity { minimum_fill: U256, quantity: U256 },

    #[error("expiry {expiry} is not after the current time {now}")]
    ExpiryNotInFuture { expiry: u64, now: u64 },
}

impl OrderParameters {
    /// Check the commit-time invariants against the current unix time.
    pub fn validate(&self, now: u64) -> Result<(), OrderValidationError> {
        if self.quantity.is_zero() {
            return Err(OrderValidationError::ZeroQuantity);
        }
        if self.minimum_fill > self.quantity {
            return Err(OrderValidationError::MinimumFillExceedsQuantity {
                minimum_fill: self.minimum_fill,
                quantity: self.quantity,
            });
        }
        if self.expiry <= now {
            return Err(OrderValidationError::ExpiryNotInFuture {
                expiry: self.expiry,
                now,
            });
        }
        Ok(())
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expiry
    }
}

/// Order lifecycle as tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
}

impl OrderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Expired)
    }

    pub fn can_transition_to(self, next: OrderState) -> bool {
        use OrderState::*;
        match self {
            Pending => matches!(next, PartiallyFilled | Filled | Cancelled | Expired),
            PartiallyFilled => matches!(next, PartiallyFilled | Filled | Cancelled | Expired),
            Filled | Cancelled | Expired => false,
        }
    }
}

impl TryFrom<u8> for OrderState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::PartiallyFilled),
            2 => Ok(Self::Filled),
            3 => Ok(Self::Cancelled),
            4 => Ok(Self::Expired),
            other => Err(other),
        }
    }
}

/// Client-side view of where an order is in the commit-reveal workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPhase {
    Uncommitted,
    Committing,
    Committed,
    Revealing,
    Revealed,
    Cancelling,
    Cancelled,
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit_buy(now: u64) -> OrderParameters {
        OrderParameters {
            instrument: InstrumentRef::new(Address::repeat_byte(0xAA), U256::ZERO),
            kind: OrderKind::Limit,
            side: Side::Buy,
            quantity: U256::from(1000),
            limit_price: U256::from(500),
            minimum_fill: U256::from(100),
            expiry: now + 3600,
        }
    }

    #[test]
    fn test_valid_order_passes() {
        assert!(limit_buy(1_000).validate(1_000).is_ok());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut params = limit_buy(1_000);
        params.quantity = U256::ZERO;
        params.minimum_fill = U256::ZERO;
        assert_eq!(params.validate(1_000), Err(OrderValidationError::ZeroQuantity));
    }

    #[test]
    fn test_minimum_fill_above_quantity_rejected() {
        let mut params = limit_buy(1_000);
        params.minimum_fill = U256::from(1001);
        assert!(matches!(
            params.validate(1_000),
            Err(OrderValidationError::MinimumFillExceedsQuantity { .. })
        ));
    }

    #[test]
    fn test_minimum_fill_equal_to_quantity_allowed() {
        let mut params = limit_buy(1_000);
        params.minimum_fill = params.quantity;
        assert!(params.validate(1_000).is_ok());
    }

    #[test]
    fn test_expiry_must_be_strictly_future() {
        let params = limit_buy(1_000);
        assert!(params.validate(params.expiry - 1).is_ok());
        assert_eq!(
            params.validate(params.expiry),
            Err(OrderValidationError::ExpiryNotInFuture {
                expiry: params.expiry,
                now: params.expiry
            })
        );
    }

    #[test]
    fn test_enum_discriminants_are_stable() {
        assert_eq!(OrderKind::Market.as_u8(), 0);
        assert_eq!(OrderKind::TimeWeighted.as_u8(), 4);
        assert_eq!(Side::Buy.as_u8(), 0);
        assert_eq!(Side::Sell.as_u8(), 1);
        assert_eq!(OrderKind::try_from(2), Ok(OrderKind::Iceberg));
        assert_eq!(Side::try_from(7), Err(7));
    }

    #[test]
    fn test_order_state_transitions() {
        use OrderState::*;
        assert!(Pending.can_transition_to(PartiallyFilled));
        assert!(PartiallyFilled.can_transition_to(Filled));
        assert!(PartiallyFilled.can_transition_to(Expired));
        assert!(!Filled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!PartiallyFilled.is_terminal());
        assert!(Expired.is_terminal());
    }
}
