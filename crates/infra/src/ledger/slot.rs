//! Per-account critical section.
//!
//! Each account owns one [`AccountSlot`]: its committed state, a working copy
//! while an operation runs, and an explicit phase machine
//! `Idle → Executing(owner) → Idle`.
//!
//! - A call from the owning thread while `Executing` is re-entry and is
//!   rejected immediately.
//! - A call from another thread that holds no slot waits on the condvar until
//!   the slot is idle. A thread already holding some other slot never waits;
//!   it gets [`EnterError::Busy`], so two payouts forwarding between the same
//!   accounts in opposite directions cannot lock each other out.
//! - Only the owning thread reads the working copy. Every other reader sees
//!   the committed state, so a debit that is later rolled back is never
//!   observed.
//! - The phase returns to `Idle` when the [`SlotGuard`] drops, on every exit
//!   path including unwinding. An uncommitted working copy is discarded.
//!
//! The inner mutex is held only for short, non-reentrant sections; it is never
//! held across caller-supplied code (payouts), which is what lets re-entry be
//! detected instead of deadlocking.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use vault_core::{AccountId, Amount};
use vault_accounts::VaultAccount;

thread_local! {
    /// Slots entered and not yet released by the current thread.
    static HELD: Cell<usize> = const { Cell::new(0) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Executing(ThreadId),
}

#[derive(Debug)]
struct SlotState {
    phase: Phase,
    committed: VaultAccount,
    working: Option<VaultAccount>,
}

impl SlotState {
    fn current(&self) -> &VaultAccount {
        self.working.as_ref().unwrap_or(&self.committed)
    }
}

/// Why a slot could not be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnterError {
    Reentrant,
    Busy,
    Poisoned,
}

#[derive(Debug)]
pub(crate) struct AccountSlot {
    state: Mutex<SlotState>,
    idle: Condvar,
}

impl AccountSlot {
    pub(crate) fn new(id: AccountId) -> Self {
        Self {
            state: Mutex::new(SlotState {
                phase: Phase::Idle,
                committed: VaultAccount::empty(id),
                working: None,
            }),
            idle: Condvar::new(),
        }
    }

    /// Enter the critical section.
    ///
    /// Blocks while another thread holds it, unless the caller already holds
    /// a slot, in which case it fails with [`EnterError::Busy`].
    pub(crate) fn enter(&self) -> Result<SlotGuard<'_>, EnterError> {
        let me = thread::current().id();
        let holds_other = HELD.with(Cell::get) > 0;
        let mut state = self.state.lock().map_err(|_| EnterError::Poisoned)?;

        loop {
            match state.phase {
                Phase::Idle => break,
                Phase::Executing(owner) if owner == me => return Err(EnterError::Reentrant),
                Phase::Executing(_) if holds_other => return Err(EnterError::Busy),
                Phase::Executing(_) => {
                    state = self.idle.wait(state).map_err(|_| EnterError::Poisoned)?;
                }
            }
        }

        state.phase = Phase::Executing(me);
        HELD.with(|held| held.set(held.get() + 1));
        Ok(SlotGuard {
            slot: self,
            _not_send: PhantomData,
        })
    }

    /// Balance as seen by the caller: the working copy for the owning thread,
    /// the committed state for everyone else.
    pub(crate) fn balance(&self) -> Amount {
        let me = thread::current().id();
        let state = self.lock();
        match state.phase {
            Phase::Executing(owner) if owner == me => state.current().balance(),
            _ => state.committed.balance(),
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.lock().phase
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of exclusive access to one account; releases the slot on drop.
///
/// Bound to the entering thread, which the per-thread held count relies on.
#[derive(Debug)]
pub(crate) struct SlotGuard<'a> {
    slot: &'a AccountSlot,
    _not_send: PhantomData<*const ()>,
}

impl SlotGuard<'_> {
    pub(crate) fn snapshot(&self) -> VaultAccount {
        self.slot.lock().current().clone()
    }

    /// Mutate the working copy; readers on other threads do not see it until
    /// [`SlotGuard::commit`].
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut VaultAccount) -> R) -> R {
        let mut state = self.slot.lock();
        let state = &mut *state;
        let working = state.working.get_or_insert_with(|| state.committed.clone());
        f(working)
    }

    /// Drop the working copy and return to the committed state.
    pub(crate) fn rollback(&self) {
        self.slot.lock().working = None;
    }

    /// Publish the working copy as the committed state.
    pub(crate) fn commit(&self) {
        let mut state = self.slot.lock();
        if let Some(working) = state.working.take() {
            state.committed = working;
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.slot.lock();
            state.working = None;
            state.phase = Phase::Idle;
        }
        HELD.with(|held| held.set(held.get().saturating_sub(1)));
        self.slot.idle.notify_all();
    }
}
