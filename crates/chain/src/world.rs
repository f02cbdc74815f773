//! Journaled in-memory ledger.
//!
//! All state that an unwind touches (token balances, allowances, lending
//! positions, pool reserves) lives in one keyed store. Every write made
//! while a unit is open records the previous value, so an aborted unit can
//! be rolled back exactly, including keys that did not exist before.
//!
//! ```text
//! atomic(f) ─► checkpoint ─► f(world) ─┬─ Ok  ─► commit (keep writes)
//!                                      └─ Err ─► revert (replay journal backwards)
//! ```

use alloy::primitives::{Address, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Key of a single ledger slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Token balance of a holder
    Balance { token: Address, holder: Address },
    /// Spending allowance granted by `owner` to `spender`
    Allowance {
        token: Address,
        owner: Address,
        spender: Address,
    },
    /// Outstanding debt of an account at a lending market
    Debt { market: Address, account: Address },
    /// Collateral pledged by an account at a lending market
    Collateral {
        market: Address,
        account: Address,
        asset: Address,
    },
    /// Cached reserve of a pool (slot 0 = asset A, slot 1 = asset B)
    Reserve { pool: Address, slot: u8 },
}

/// Position in the journal returned by [`World::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a checkpoint must be committed or reverted"]
pub struct Checkpoint {
    index: usize,
    depth: usize,
}

/// In-memory ledger state with an undo journal.
#[derive(Debug, Clone, Default)]
pub struct World {
    state: HashMap<StateKey, U256>,
    journal: Vec<(StateKey, Option<U256>)>,
    depth: usize,
}

impl World {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a slot. Missing slots read as zero.
    #[inline]
    pub fn get(&self, key: StateKey) -> U256 {
        self.state.get(&key).copied().unwrap_or(U256::ZERO)
    }

    /// Write a slot. Zero values are removed so that a rolled-back unit
    /// leaves a map identical to the one it started from.
    pub fn set(&mut self, key: StateKey, value: U256) {
        let previous = if value.is_zero() {
            self.state.remove(&key)
        } else {
            self.state.insert(key, value)
        };

        if self.depth > 0 && previous != Some(value) {
            self.journal.push((key, previous));
        }
    }

    /// Open a nested unit.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint {
            index: self.journal.len(),
            depth: self.depth,
        }
    }

    /// Undo every write made since `checkpoint` and close the unit.
    pub fn revert(&mut self, checkpoint: Checkpoint) {
        debug_assert_eq!(checkpoint.depth, self.depth, "checkpoints must close in order");

        let undone = self.journal.len() - checkpoint.index;
        while self.journal.len() > checkpoint.index {
            let Some((key, previous)) = self.journal.pop() else {
                break;
            };
            match previous {
                Some(value) => {
                    self.state.insert(key, value);
                }
                None => {
                    self.state.remove(&key);
                }
            }
        }
        self.depth -= 1;

        trace!(undone, depth = self.depth, "Reverted unit");
    }

    /// Keep the writes made since `checkpoint` and close the unit.
    ///
    /// Writes stay journaled until the outermost unit commits, so an outer
    /// abort still undoes inner committed units.
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        debug_assert_eq!(checkpoint.depth, self.depth, "checkpoints must close in order");

        self.depth -= 1;
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    /// Run `f` as an all-or-nothing unit.
    pub fn atomic<T, E>(&mut self, f: impl FnOnce(&mut World) -> Result<T, E>) -> Result<T, E> {
        let checkpoint = self.checkpoint();
        match f(self) {
            Ok(value) => {
                self.commit(checkpoint);
                Ok(value)
            }
            Err(err) => {
                self.revert(checkpoint);
                Err(err)
            }
        }
    }

    /// Number of open units.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of non-zero slots.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Check if the ledger holds no non-zero slot.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Full view of the non-zero slots, for state comparisons.
    pub fn state(&self) -> &HashMap<StateKey, U256> {
        &self.state
    }
}

/// Shared handle that serialises units against one ledger.
///
/// Each [`Chain::transact`] call holds the lock for the whole unit, which is
/// the serial execution guarantee the unwinder relies on: no other unit can
/// interleave with a running one.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    world: Arc<Mutex<World>>,
}

impl Chain {
    /// Wrap an existing ledger.
    pub fn new(world: World) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
        }
    }

    /// Execute `f` as one atomic unit.
    pub fn transact<T, E>(&self, f: impl FnOnce(&mut World) -> Result<T, E>) -> Result<T, E> {
        let mut world = self.world.lock();
        world.atomic(f)
    }

    /// Read-only access to the ledger.
    pub fn read<T>(&self, f: impl FnOnce(&World) -> T) -> T {
        let world = self.world.lock();
        f(&world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(holder: u8) -> StateKey {
        StateKey::Balance {
            token: Address::repeat_byte(0xaa),
            holder: Address::repeat_byte(holder),
        }
    }

    #[test]
    fn test_missing_slot_reads_zero() {
        let world = World::new();
        assert_eq!(world.get(balance(1)), U256::ZERO);
        assert!(world.is_empty());
    }

    #[test]
    fn test_revert_restores_previous_and_absent_keys() {
        let mut world = World::new();
        world.set(balance(1), U256::from(100));
        let before = world.state().clone();

        let result: Result<(), &str> = world.atomic(|w| {
            w.set(balance(1), U256::from(40));
            w.set(balance(2), U256::from(60));
            Err("abort")
        });

        assert!(result.is_err());
        assert_eq!(world.state(), &before);
        assert_eq!(world.depth(), 0);
    }

    #[test]
    fn test_commit_keeps_writes() {
        let mut world = World::new();
        let result: Result<(), ()> = world.atomic(|w| {
            w.set(balance(1), U256::from(7));
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(world.get(balance(1)), U256::from(7));
    }

    #[test]
    fn test_outer_abort_undoes_inner_commit() {
        let mut world = World::new();
        world.set(balance(1), U256::from(5));

        let result: Result<(), &str> = world.atomic(|w| {
            let inner: Result<(), &str> = w.atomic(|w| {
                w.set(balance(1), U256::from(9));
                Ok(())
            });
            assert!(inner.is_ok());
            assert_eq!(w.get(balance(1)), U256::from(9));
            Err("outer abort")
        });

        assert!(result.is_err());
        assert_eq!(world.get(balance(1)), U256::from(5));
    }

    #[test]
    fn test_inner_abort_keeps_outer_writes() {
        let mut world = World::new();

        let result: Result<(), &str> = world.atomic(|w| {
            w.set(balance(1), U256::from(1));
            let inner: Result<(), &str> = w.atomic(|w| {
                w.set(balance(2), U256::from(2));
                Err("inner abort")
            });
            assert!(inner.is_err());
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(world.get(balance(1)), U256::from(1));
        assert_eq!(world.get(balance(2)), U256::ZERO);
    }

    #[test]
    fn test_zero_write_removes_slot() {
        let mut world = World::new();
        world.set(balance(1), U256::from(3));
        world.set(balance(1), U256::ZERO);
        assert!(world.is_empty());
    }

    #[test]
    fn test_chain_serialises_units_across_threads() {
        let chain = Chain::default();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let chain = chain.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _: Result<(), ()> = chain.transact(|w| {
                            let current = w.get(balance(1));
                            w.set(balance(1), current + U256::from(1));
                            Ok(())
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread");
        }

        assert_eq!(chain.read(|w| w.get(balance(1))), U256::from(800));
    }
}
