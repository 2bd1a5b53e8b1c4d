//! Token transfer extraction and balance deltas
//!
//! Transfers come from two places:
//! - ERC20 `Transfer` logs (including the `0xeeee…` pseudo token the API
//!   emits for native value when `traceTransfers` is on)
//! - Call frames carrying native value
//!
//! [`BalanceDeltas`] folds them into signed per-account, per-token changes.

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::keccak256;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::types::{signed_delta, Address, CallFrame, LogEntry, B256, I256, NATIVE_TRANSFER_ADDRESS, U256};

/// keccak256("Transfer(address,address,uint256)")
///
/// ERC20 and ERC721 share this signature; ERC721 indexes the token id as a
/// fourth topic.
pub static TRANSFER_EVENT_SIGNATURE: Lazy<B256> =
    Lazy::new(|| keccak256(b"Transfer(address,address,uint256)"));

/// Record of a token transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    /// Token contract (`0xeeee…` for native value)
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

impl TokenTransfer {
    /// Whether this transfer moves native value
    pub fn is_native(&self) -> bool {
        self.token == NATIVE_TRANSFER_ADDRESS
    }
}

/// Parses an ERC20 Transfer event
///
/// # Arguments
/// * `topics` - Event topics:
///   - [0]: Transfer event signature
///   - [1]: From address (indexed)
///   - [2]: To address (indexed)
/// * `data` - ABI-encoded amount (one 32-byte word)
///
/// # Returns
/// * `Some((from, to, amount))` - For a fungible transfer of a non-zero amount
/// * `None` - For other events, ERC721 transfers, malformed data or zero amounts
pub fn parse_transfer_log(topics: &[B256], data: &[u8]) -> Option<(Address, Address, U256)> {
    if topics.len() != 3 || topics[0] != *TRANSFER_EVENT_SIGNATURE || data.len() != 32 {
        return None;
    }
    let amount = U256::from_be_slice(data);
    if amount.is_zero() {
        return None;
    }
    Some((Address::from_word(topics[1]), Address::from_word(topics[2]), amount))
}

/// Whether the topics describe an ERC721 (non-fungible) transfer
pub fn is_nft_transfer(topics: &[B256]) -> bool {
    topics.len() == 4 && topics[0] == *TRANSFER_EVENT_SIGNATURE
}

/// Parses a log into a transfer of the emitting token
pub fn transfer_from_log(address: Address, topics: &[B256], data: &[u8]) -> Option<TokenTransfer> {
    parse_transfer_log(topics, data).map(|(from, to, value)| TokenTransfer { token: address, from, to, value })
}

/// Collects fungible transfers from a list of logs, in order
pub fn collect_log_transfers<'a>(logs: impl IntoIterator<Item = &'a LogEntry>) -> Vec<TokenTransfer> {
    logs.into_iter()
        .filter_map(|log| transfer_from_log(log.address, &log.topics, &log.data))
        .collect()
}

/// Collects every transfer that took effect in a call tree
///
/// Walks frames in pre-order. For each successful frame, its native value is
/// recorded first, then its Transfer logs. Failed subtrees are skipped
/// entirely since their effects were rolled back.
pub fn collect_call_tree_transfers(root: &CallFrame) -> Vec<TokenTransfer> {
    fn walk(frame: &CallFrame, out: &mut Vec<TokenTransfer>) {
        if frame.is_failed() {
            return;
        }
        let moves_value = matches!(frame.kind().as_str(), "CALL" | "CALLCODE" | "CREATE" | "CREATE2");
        if moves_value && !frame.value.is_zero() {
            if let Some(to) = frame.to {
                out.push(TokenTransfer { token: NATIVE_TRANSFER_ADDRESS, from: frame.from, to, value: frame.value });
            }
        }
        out.extend(collect_log_transfers(&frame.logs));
        for child in &frame.calls {
            walk(child, out);
        }
    }

    let mut transfers = Vec::new();
    walk(root, &mut transfers);
    transfers
}

/// Signed balance changes keyed by `(account, token)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceDeltas {
    deltas: HashMap<(Address, Address), I256>,
}

impl BalanceDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds deltas from a sequence of transfers
    pub fn from_transfers<'a>(transfers: impl IntoIterator<Item = &'a TokenTransfer>) -> Self {
        let mut deltas = Self::new();
        for transfer in transfers {
            deltas.apply(transfer);
        }
        deltas
    }

    /// Applies one transfer
    ///
    /// Zero-value transfers and self-transfers leave the deltas unchanged.
    pub fn apply(&mut self, transfer: &TokenTransfer) {
        if transfer.value.is_zero() || transfer.from == transfer.to {
            return;
        }
        let amount = signed_delta(U256::ZERO, transfer.value);
        self.add(transfer.from, transfer.token, -amount);
        self.add(transfer.to, transfer.token, amount);
    }

    /// Adds a signed amount to `(account, token)`
    pub fn add(&mut self, account: Address, token: Address, amount: I256) {
        let entry = self.deltas.entry((account, token)).or_insert(I256::ZERO);
        *entry = entry.saturating_add(amount);
    }

    /// Merges another set of deltas into this one
    pub fn merge(&mut self, other: &BalanceDeltas) {
        for (&(account, token), &amount) in &other.deltas {
            self.add(account, token, amount);
        }
    }

    /// Delta of `account` in `token` (zero when untouched)
    pub fn get(&self, account: Address, token: Address) -> I256 {
        self.deltas.get(&(account, token)).copied().unwrap_or(I256::ZERO)
    }

    /// Non-zero deltas of one account, keyed by token
    pub fn asset_changes_for(&self, account: Address) -> BTreeMap<Address, I256> {
        self.deltas
            .iter()
            .filter(|((holder, _), amount)| *holder == account && !amount.is_zero())
            .map(|((_, token), amount)| (*token, *amount))
            .collect()
    }

    /// Accounts with at least one non-zero delta, sorted
    pub fn accounts(&self) -> Vec<Address> {
        let mut accounts: Vec<_> = self
            .deltas
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|((account, _), _)| *account)
            .collect();
        accounts.sort();
        accounts.dedup();
        accounts
    }

    /// Iterates over every non-zero `(account, token, delta)`
    pub fn iter(&self) -> impl Iterator<Item = (Address, Address, I256)> + '_ {
        self.deltas
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(&(account, token), &amount)| (account, token, amount))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::call_utils::tests::{frame, ALICE, POOL, ROUTER, TOKEN};
    use alloy::primitives::Bytes;

    fn transfer_log(token: Address, from: Address, to: Address, amount: u64) -> LogEntry {
        LogEntry {
            address: token,
            topics: vec![*TRANSFER_EVENT_SIGNATURE, from.into_word(), to.into_word()],
            data: Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec()),
        }
    }

    fn int(value: i64) -> I256 {
        I256::try_from(value).unwrap()
    }

    #[test]
    fn test_parse_transfer_log() {
        let log = transfer_log(TOKEN, ALICE, POOL, 500);
        assert_eq!(parse_transfer_log(&log.topics, &log.data), Some((ALICE, POOL, U256::from(500))));

        let zero = transfer_log(TOKEN, ALICE, POOL, 0);
        assert_eq!(parse_transfer_log(&zero.topics, &zero.data), None);

        let mut nft = transfer_log(TOKEN, ALICE, POOL, 1);
        nft.topics.push(B256::with_last_byte(7));
        nft.data = Bytes::new();
        assert!(is_nft_transfer(&nft.topics));
        assert_eq!(parse_transfer_log(&nft.topics, &nft.data), None);

        let other = LogEntry { address: TOKEN, topics: vec![B256::repeat_byte(9)], data: Bytes::new() };
        assert!(collect_log_transfers([&other]).is_empty());
    }

    #[test]
    fn test_balance_deltas() {
        let transfers = [
            TokenTransfer { token: TOKEN, from: ALICE, to: POOL, value: U256::from(100) },
            TokenTransfer { token: TOKEN, from: POOL, to: ALICE, value: U256::from(30) },
            TokenTransfer { token: NATIVE_TRANSFER_ADDRESS, from: ALICE, to: ALICE, value: U256::from(5) },
            TokenTransfer { token: NATIVE_TRANSFER_ADDRESS, from: ROUTER, to: ALICE, value: U256::ZERO },
        ];
        let deltas = BalanceDeltas::from_transfers(&transfers);

        assert_eq!(deltas.get(ALICE, TOKEN), int(-70));
        assert_eq!(deltas.get(POOL, TOKEN), int(70));
        assert_eq!(deltas.get(ALICE, NATIVE_TRANSFER_ADDRESS), I256::ZERO);
        assert_eq!(deltas.accounts(), vec![ALICE, POOL]);

        let alice = deltas.asset_changes_for(ALICE);
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[&TOKEN], int(-70));
    }

    #[test]
    fn test_call_tree_transfers_skip_reverted_frames() {
        let mut root = frame("CALL", ALICE, ROUTER, 80_000);
        root.value = U256::from(1_000);
        root.logs.push(transfer_log(TOKEN, ALICE, POOL, 50));

        let mut swap = frame("CALL", ROUTER, POOL, 20_000);
        swap.logs.push(transfer_log(TOKEN, POOL, ROUTER, 10));
        let mut failed = frame("CALL", ROUTER, TOKEN, 5_000);
        failed.reverted = true;
        failed.logs.push(transfer_log(TOKEN, ROUTER, ALICE, 999));
        root.calls.extend([swap, failed]);

        let transfers = collect_call_tree_transfers(&root);
        assert_eq!(transfers.len(), 3);
        assert!(transfers[0].is_native());
        assert_eq!(transfers[2].value, U256::from(10));

        let deltas = BalanceDeltas::from_transfers(&transfers);
        assert_eq!(deltas.get(ALICE, NATIVE_TRANSFER_ADDRESS), int(-1_000));
        assert_eq!(deltas.get(ROUTER, TOKEN), int(10));
        assert_eq!(deltas.get(ALICE, TOKEN), int(-50));
    }
}
