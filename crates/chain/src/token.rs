//! ERC20-style token operations on the ledger.

use alloy::primitives::{Address, U256};

use crate::error::ChainError;
use crate::world::{StateKey, World};

/// Balance of `holder` in `token`.
#[inline]
pub fn balance_of(world: &World, token: Address, holder: Address) -> U256 {
    world.get(StateKey::Balance { token, holder })
}

/// Remaining allowance of `spender` over `owner`'s `token`.
#[inline]
pub fn allowance(world: &World, token: Address, owner: Address, spender: Address) -> U256 {
    world.get(StateKey::Allowance {
        token,
        owner,
        spender,
    })
}

/// Set the allowance of `spender` over `owner`'s `token` (overwrites).
pub fn approve(world: &mut World, token: Address, owner: Address, spender: Address, amount: U256) {
    world.set(
        StateKey::Allowance {
            token,
            owner,
            spender,
        },
        amount,
    );
}

/// Move `amount` of `token` from `from` to `to`.
pub fn transfer(
    world: &mut World,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), ChainError> {
    if amount.is_zero() || from == to {
        return Ok(());
    }

    let from_balance = balance_of(world, token, from);
    if from_balance < amount {
        return Err(ChainError::InsufficientBalance {
            token,
            holder: from,
            available: from_balance,
            required: amount,
        });
    }

    let to_balance = balance_of(world, token, to)
        .checked_add(amount)
        .ok_or(ChainError::Overflow)?;

    world.set(StateKey::Balance { token, holder: from }, from_balance - amount);
    world.set(StateKey::Balance { token, holder: to }, to_balance);
    Ok(())
}

/// Move `amount` of `token` from `from` to `to` on behalf of `spender`,
/// consuming allowance. An allowance of `U256::MAX` is never decreased.
pub fn transfer_from(
    world: &mut World,
    token: Address,
    spender: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), ChainError> {
    let allowed = allowance(world, token, from, spender);
    if allowed < amount {
        return Err(ChainError::InsufficientAllowance {
            token,
            owner: from,
            spender,
            available: allowed,
            required: amount,
        });
    }

    transfer(world, token, from, to, amount)?;

    if allowed != U256::MAX {
        approve(world, token, from, spender, allowed - amount);
    }
    Ok(())
}

/// Create `amount` of `token` for `to`. Used when seeding a ledger.
pub fn mint(
    world: &mut World,
    token: Address,
    to: Address,
    amount: U256,
) -> Result<(), ChainError> {
    let balance = balance_of(world, token, to)
        .checked_add(amount)
        .ok_or(ChainError::Overflow)?;
    world.set(StateKey::Balance { token, holder: to }, balance);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0x10);
    const ALICE: Address = Address::repeat_byte(0x01);
    const BOB: Address = Address::repeat_byte(0x02);

    #[test]
    fn test_transfer_moves_balance() {
        let mut world = World::new();
        mint(&mut world, TOKEN, ALICE, U256::from(100)).unwrap();

        transfer(&mut world, TOKEN, ALICE, BOB, U256::from(30)).unwrap();

        assert_eq!(balance_of(&world, TOKEN, ALICE), U256::from(70));
        assert_eq!(balance_of(&world, TOKEN, BOB), U256::from(30));
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut world = World::new();
        mint(&mut world, TOKEN, ALICE, U256::from(10)).unwrap();

        let err = transfer(&mut world, TOKEN, ALICE, BOB, U256::from(11)).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientBalance { .. }));
        assert_eq!(balance_of(&world, TOKEN, ALICE), U256::from(10));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut world = World::new();
        mint(&mut world, TOKEN, ALICE, U256::from(100)).unwrap();
        approve(&mut world, TOKEN, ALICE, BOB, U256::from(50));

        transfer_from(&mut world, TOKEN, BOB, ALICE, BOB, U256::from(20)).unwrap();

        assert_eq!(allowance(&world, TOKEN, ALICE, BOB), U256::from(30));
        assert_eq!(balance_of(&world, TOKEN, BOB), U256::from(20));
    }

    #[test]
    fn test_transfer_from_without_allowance() {
        let mut world = World::new();
        mint(&mut world, TOKEN, ALICE, U256::from(100)).unwrap();

        let err = transfer_from(&mut world, TOKEN, BOB, ALICE, BOB, U256::from(1)).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_infinite_allowance_is_not_decreased() {
        let mut world = World::new();
        mint(&mut world, TOKEN, ALICE, U256::from(100)).unwrap();
        approve(&mut world, TOKEN, ALICE, BOB, U256::MAX);

        transfer_from(&mut world, TOKEN, BOB, ALICE, BOB, U256::from(40)).unwrap();

        assert_eq!(allowance(&world, TOKEN, ALICE, BOB), U256::MAX);
    }
}
