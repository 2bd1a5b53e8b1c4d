//! Prestate diff summaries
//!
//! Turns a `prestateTracer` diff (`{pre, post}`) into per-account changes and
//! converts post-state back into [`StateOverride`]s so later simulations can
//! start from it.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    errors::AnalysisError,
    types::{signed_delta, AccountState, Address, PrestateDiff, PrestateTraceResponse, StateOverride, B256, I256, U256},
};

/// How a storage slot changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotChangeKind {
    /// Absent before execution
    Created,
    /// Present before and after
    Modified,
    /// Absent after execution
    Deleted,
}

/// One storage slot change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotChange {
    pub slot: B256,
    pub before: Option<B256>,
    pub after: Option<B256>,
    pub kind: SlotChangeKind,
}

/// Changes to a single account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountChange {
    pub address: Address,
    /// Present in post-state only
    pub created: bool,
    pub balance_before: Option<U256>,
    pub balance_after: Option<U256>,
    /// Signed balance delta, zero when the balance did not change
    pub balance_delta: I256,
    pub nonce_before: Option<u64>,
    pub nonce_after: Option<u64>,
    pub code_changed: bool,
    pub storage: Vec<SlotChange>,
}

/// Summary of a prestate diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateDiffSummary {
    /// Touched accounts, sorted by address
    pub accounts: Vec<AccountChange>,
}

impl StateDiffSummary {
    pub fn accounts_touched(&self) -> usize {
        self.accounts.len()
    }

    pub fn slots_changed(&self) -> usize {
        self.accounts.iter().map(|account| account.storage.len()).sum()
    }

    pub fn account(&self, address: Address) -> Option<&AccountChange> {
        self.accounts.iter().find(|account| account.address == address)
    }
}

/// Summarises a diff-mode prestate trace
///
/// # Errors
/// `AnalysisError::NotDiffMode` when the tracer ran in default mode
pub fn summarize_prestate(response: &PrestateTraceResponse) -> Result<StateDiffSummary, AnalysisError> {
    match response {
        PrestateTraceResponse::Diff(diff) => Ok(summarize_state_diff(diff)),
        PrestateTraceResponse::Default(_) => Err(AnalysisError::NotDiffMode),
    }
}

/// Summarises a `{pre, post}` diff
///
/// The tracer omits unchanged fields from `post`, so a balance, nonce or code
/// missing from `post` means "unchanged" unless the whole account is missing,
/// in which case the account was deleted. Storage is different: `pre` only
/// lists changed slots and `post` drops zero values, so a slot listed in
/// `pre` but not in `post` was cleared to zero.
pub fn summarize_state_diff(diff: &PrestateDiff) -> StateDiffSummary {
    let addresses: BTreeSet<Address> = diff.pre.keys().chain(diff.post.keys()).copied().collect();
    let empty = AccountState::default();

    let accounts = addresses
        .into_iter()
        .map(|address| {
            let pre = diff.pre.get(&address).unwrap_or(&empty);
            let post = diff.post.get(&address);
            let created = !diff.pre.contains_key(&address);
            let deleted = post.is_none();
            let post = post.unwrap_or(&empty);

            let balance_after = if deleted { Some(U256::ZERO) } else { post.balance.or(pre.balance) };
            let balance_delta = match (pre.balance, balance_after) {
                (before, Some(after)) => signed_delta(before.unwrap_or_default(), after),
                (_, None) => I256::ZERO,
            };

            AccountChange {
                address,
                created,
                balance_before: pre.balance,
                balance_after,
                balance_delta,
                nonce_before: pre.nonce,
                nonce_after: if deleted { None } else { post.nonce.or(pre.nonce) },
                code_changed: deleted || post.code.as_ref().is_some_and(|code| Some(code) != pre.code.as_ref()),
                storage: slot_changes(&pre.storage, &post.storage),
            }
        })
        .collect();

    StateDiffSummary { accounts }
}

fn slot_changes(pre: &BTreeMap<B256, B256>, post: &BTreeMap<B256, B256>) -> Vec<SlotChange> {
    let slots: BTreeSet<&B256> = pre.keys().chain(post.keys()).collect();
    slots
        .into_iter()
        .filter_map(|slot| {
            let before = pre.get(slot).copied();
            let after = post.get(slot).copied();
            let kind = match (before, after) {
                (None, Some(_)) => SlotChangeKind::Created,
                (Some(_), None) => SlotChangeKind::Deleted,
                (Some(b), Some(a)) if b == a => return None,
                (Some(_), Some(_)) => SlotChangeKind::Modified,
                (None, None) => return None,
            };
            Some(SlotChange { slot: *slot, before, after, kind })
        })
        .collect()
}

/// Converts the post-state of a diff into state overrides
///
/// Slots are emitted as `stateDiff` patches so untouched storage keeps its
/// on-chain value. Slots cleared to zero are patched with zero. Deleted
/// accounts are reset to an empty account.
pub fn post_state_overrides(diff: &PrestateDiff) -> BTreeMap<Address, StateOverride> {
    let mut overrides = BTreeMap::new();
    for (address, post) in &diff.post {
        let mut state_override = StateOverride::for_account(*address);
        state_override.balance = post.balance;
        state_override.nonce = post.nonce;
        state_override.code = post.code.clone();
        let mut slots = post.storage.clone();
        if let Some(pre) = diff.pre.get(address) {
            for slot in pre.storage.keys() {
                slots.entry(*slot).or_insert(B256::ZERO);
            }
        }
        if !slots.is_empty() {
            state_override.state_diff = Some(slots);
        }
        overrides.insert(*address, state_override);
    }
    for address in diff.pre.keys().filter(|address| !diff.post.contains_key(*address)) {
        let mut state_override = StateOverride::for_account(*address);
        state_override.balance = Some(U256::ZERO);
        state_override.nonce = Some(0);
        state_override.code = Some(Default::default());
        state_override.storage = Some(BTreeMap::new());
        overrides.insert(*address, state_override);
    }
    overrides
}

/// Folds `next` into cumulative overrides, slot by slot
pub fn merge_overrides(cumulative: &mut BTreeMap<Address, StateOverride>, next: BTreeMap<Address, StateOverride>) {
    for (address, state_override) in next {
        match cumulative.get_mut(&address) {
            Some(existing) => existing.merge(&state_override),
            None => {
                cumulative.insert(address, state_override);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes};

    const SENDER: Address = address!("1000000000000000000000000000000000000001");
    const TOKEN: Address = address!("2000000000000000000000000000000000000002");
    const DEPLOYED: Address = address!("3000000000000000000000000000000000000003");
    const DESTROYED: Address = address!("4000000000000000000000000000000000000004");

    fn word(value: u64) -> B256 {
        B256::from(U256::from(value))
    }

    fn sample_diff() -> PrestateDiff {
        let mut diff = PrestateDiff::default();
        diff.pre.insert(
            SENDER,
            AccountState { balance: Some(U256::from(1_000)), nonce: Some(5), ..Default::default() },
        );
        diff.post.insert(
            SENDER,
            AccountState { balance: Some(U256::from(400)), nonce: Some(6), ..Default::default() },
        );
        diff.pre.insert(
            TOKEN,
            AccountState {
                storage: BTreeMap::from([(word(1), word(10)), (word(2), word(20)), (word(3), word(30))]),
                ..Default::default()
            },
        );
        diff.post.insert(
            TOKEN,
            AccountState {
                storage: BTreeMap::from([(word(1), word(11)), (word(4), word(40))]),
                ..Default::default()
            },
        );
        diff.post.insert(
            DEPLOYED,
            AccountState {
                balance: Some(U256::from(600)),
                code: Some(Bytes::from_static(&[0x60, 0x00])),
                nonce: Some(1),
                ..Default::default()
            },
        );
        diff.pre.insert(DESTROYED, AccountState { balance: Some(U256::from(7)), ..Default::default() });
        diff
    }

    #[test]
    fn test_summarize_state_diff() {
        let summary = summarize_state_diff(&sample_diff());
        assert_eq!(summary.accounts_touched(), 4);

        let sender = summary.account(SENDER).unwrap();
        assert_eq!(sender.balance_delta, I256::try_from(-600i64).unwrap());
        assert_eq!((sender.nonce_before, sender.nonce_after), (Some(5), Some(6)));
        assert!(!sender.created);

        let token = summary.account(TOKEN).unwrap();
        let kinds: Vec<_> = token.storage.iter().map(|change| (change.slot, change.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (word(1), SlotChangeKind::Modified),
                (word(2), SlotChangeKind::Deleted),
                (word(3), SlotChangeKind::Deleted),
                (word(4), SlotChangeKind::Created),
            ]
        );
        assert_eq!(token.balance_delta, I256::ZERO);

        let deployed = summary.account(DEPLOYED).unwrap();
        assert!(deployed.created);
        assert!(deployed.code_changed);
        assert_eq!(deployed.balance_delta, I256::try_from(600i64).unwrap());

        let destroyed = summary.account(DESTROYED).unwrap();
        assert_eq!(destroyed.balance_after, Some(U256::ZERO));
        assert_eq!(summary.slots_changed(), 4);
    }

    #[test]
    fn test_slot_cleared_to_zero() {
        let mut diff = PrestateDiff::default();
        diff.pre.insert(
            TOKEN,
            AccountState { storage: BTreeMap::from([(word(1), word(10)), (word(2), word(20))]), ..Default::default() },
        );
        diff.post.insert(TOKEN, AccountState { storage: BTreeMap::from([(word(1), word(11))]), ..Default::default() });

        let summary = summarize_state_diff(&diff);
        assert_eq!(summary.slots_changed(), 2);
        let cleared = &summary.account(TOKEN).unwrap().storage[1];
        assert_eq!((cleared.slot, cleared.kind), (word(2), SlotChangeKind::Deleted));
        assert_eq!((cleared.before, cleared.after), (Some(word(20)), None));

        let overrides = post_state_overrides(&diff);
        let slots = overrides[&TOKEN].state_diff.as_ref().unwrap();
        assert_eq!(slots[&word(1)], word(11));
        assert_eq!(slots[&word(2)], B256::ZERO);
    }

    #[test]
    fn test_default_mode_is_rejected() {
        let response = PrestateTraceResponse::Default(BTreeMap::new());
        assert!(matches!(summarize_prestate(&response), Err(AnalysisError::NotDiffMode)));
    }

    #[test]
    fn test_post_state_overrides() {
        let overrides = post_state_overrides(&sample_diff());
        assert_eq!(overrides[&SENDER].balance, Some(U256::from(400)));
        assert_eq!(overrides[&SENDER].nonce, Some(6));
        let token_slots = overrides[&TOKEN].state_diff.as_ref().unwrap();
        assert_eq!(token_slots[&word(4)], word(40));
        assert_eq!(token_slots[&word(3)], B256::ZERO);
        assert!(overrides[&TOKEN].state.is_none());
        assert_eq!(overrides[&DESTROYED].storage, Some(BTreeMap::new()));
        assert!(overrides.values().all(|o| o.validate_state_exclusivity().is_ok()));
    }

    #[test]
    fn test_merge_overrides_keeps_earlier_slots() {
        let mut cumulative = post_state_overrides(&sample_diff());
        let mut next = PrestateDiff::default();
        next.post.insert(
            TOKEN,
            AccountState { storage: BTreeMap::from([(word(1), word(12))]), ..Default::default() },
        );
        next.pre.insert(TOKEN, AccountState::default());
        merge_overrides(&mut cumulative, post_state_overrides(&next));

        let slots = cumulative[&TOKEN].state_diff.as_ref().unwrap();
        assert_eq!(slots[&word(1)], word(12));
        assert_eq!(slots[&word(4)], word(40));
    }
}
