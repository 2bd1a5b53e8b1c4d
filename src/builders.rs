//! Fluent request builders
//!
//! Builders collect request fields and validate them in `build()` before
//! anything is sent:
//! - [`TransactionCallBuilder`]: a single call
//! - [`SimulationRequestBuilder`]: `POST /simulate`
//! - [`TraceRequestBuilder`]: `POST /trace/tx`, `/trace/call` and `/trace/call-many`
//! - [`AccessListRequestBuilder`]: `POST /simulate/access-list`
//!
//! # Example
//! ```no_run
//! use altitrace::builders::{SimulationRequestBuilder, TransactionCallBuilder};
//! use alloy::primitives::{address, U256};
//!
//! # fn example() -> Result<(), altitrace::errors::ValidationError> {
//! let request = SimulationRequestBuilder::new()
//!     .call(
//!         TransactionCallBuilder::new()
//!             .from(address!("742d35Cc6634C0532925a3b844Bc9e7595f06e8C"))
//!             .to(address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"))
//!             .value(U256::from(1_000_000_000_000_000u64))
//!             .build(),
//!     )
//!     .account(address!("742d35Cc6634C0532925a3b844Bc9e7595f06e8C"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use crate::{
    errors::ValidationError,
    types::{
        AccessList, AccessListRequest, Address, BlockOverrides, BlockTag, Bundle, Bytes, CallTracerConfig,
        PrestateTracerConfig, SimulationOptions, SimulationParams, SimulationRequest, StateContext,
        StateOverride, StructLoggerConfig, TraceCallManyRequest, TraceCallRequest, TraceConfig,
        TraceTransactionRequest, TransactionCall, TxIndex, B256, U256, U64,
    },
};

/// Smallest number of entries in a batch or bundle
pub const MIN_BATCH_SIZE: usize = 1;
/// Largest number of entries in a batch or bundle
pub const MAX_BATCH_SIZE: usize = 10;

/// Checks that a batch or bundle holds 1..=10 entries
pub fn validate_batch_size(kind: &'static str, actual: usize) -> Result<(), ValidationError> {
    if (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&actual) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSize { kind, min: MIN_BATCH_SIZE, max: MAX_BATCH_SIZE, actual })
    }
}

/// Validates a simulation request the way the API does
pub fn validate_simulation_request(request: &SimulationRequest) -> Result<(), ValidationError> {
    let params = &request.params;
    if params.calls.is_empty() {
        return Err(ValidationError::NoCalls);
    }
    if params.block_number.is_some() && params.block_tag.is_some() {
        return Err(ValidationError::BlockExclusivity);
    }
    if (params.trace_asset_changes || params.trace_transfers) && params.account.is_none() {
        return Err(ValidationError::MissingAccount);
    }
    let overrides = request.options.iter().flat_map(|options| options.state_overrides.iter().flatten());
    for state_override in overrides {
        state_override.validate_state_exclusivity()?;
    }
    Ok(())
}

/// Builder for a single [`TransactionCall`]
#[derive(Debug, Clone, Default)]
pub struct TransactionCallBuilder(TransactionCall);

impl TransactionCallBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: Address) -> Self {
        self.0.from = Some(from);
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.0.to = Some(to);
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.0.data = Some(data.into());
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.0.value = Some(value);
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.0.gas = Some(U64::from(gas));
        self
    }

    pub fn access_list(mut self, access_list: AccessList) -> Self {
        self.0.access_list = Some(access_list);
        self
    }

    pub fn build(self) -> TransactionCall {
        self.0
    }
}

/// Builder for [`SimulationRequest`]
///
/// Asset change and transfer tracing are on by default, as on the API, so an
/// `account` is required unless [`Self::without_asset_tracing`] is used.
#[derive(Debug, Clone, Default)]
pub struct SimulationRequestBuilder {
    params: SimulationParams,
    state_overrides: Vec<StateOverride>,
    block_overrides: Option<BlockOverrides>,
}

impl SimulationRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call
    pub fn call(mut self, call: TransactionCall) -> Self {
        self.params.calls.push(call);
        self
    }

    /// Appends several calls
    pub fn calls(mut self, calls: impl IntoIterator<Item = TransactionCall>) -> Self {
        self.params.calls.extend(calls);
        self
    }

    /// Account whose asset changes are tracked
    pub fn account(mut self, account: Address) -> Self {
        self.params.account = Some(account);
        self
    }

    pub fn block_number(mut self, number: u64) -> Self {
        self.params.block_number = Some(U64::from(number));
        self
    }

    pub fn block_tag(mut self, tag: BlockTag) -> Self {
        self.params.block_tag = Some(tag);
        self
    }

    pub fn validation(mut self, enabled: bool) -> Self {
        self.params.validation = enabled;
        self
    }

    pub fn trace_asset_changes(mut self, enabled: bool) -> Self {
        self.params.trace_asset_changes = enabled;
        self
    }

    pub fn trace_transfers(mut self, enabled: bool) -> Self {
        self.params.trace_transfers = enabled;
        self
    }

    /// Disables both asset change and transfer tracing
    pub fn without_asset_tracing(self) -> Self {
        self.trace_asset_changes(false).trace_transfers(false)
    }

    /// Adds a state override; its `address` must be set
    pub fn state_override(mut self, state_override: StateOverride) -> Self {
        self.state_overrides.push(state_override);
        self
    }

    /// Adds state overrides keyed by account
    pub fn state_overrides(mut self, overrides: impl IntoIterator<Item = (Address, StateOverride)>) -> Self {
        self.state_overrides.extend(overrides.into_iter().map(|(address, mut state_override)| {
            state_override.address = Some(address);
            state_override
        }));
        self
    }

    pub fn block_overrides(mut self, overrides: BlockOverrides) -> Self {
        self.block_overrides = Some(overrides);
        self
    }

    /// Validates and builds the request
    ///
    /// # Errors
    /// * `NoCalls` - No call was added
    /// * `BlockExclusivity` - Both a block number and a tag were set
    /// * `MissingAccount` - Asset tracing is on without an account
    /// * `MissingField("stateOverride.address")` - An override has no address
    /// * `StateExclusivity` - An override sets both `state` and `stateDiff`
    pub fn build(self) -> Result<SimulationRequest, ValidationError> {
        if self.state_overrides.iter().any(|state_override| state_override.address.is_none()) {
            return Err(ValidationError::MissingField("stateOverride.address"));
        }
        let options = (!self.state_overrides.is_empty() || self.block_overrides.is_some()).then(|| {
            SimulationOptions {
                state_overrides: (!self.state_overrides.is_empty()).then_some(self.state_overrides),
                block_overrides: self.block_overrides,
            }
        });
        let request = SimulationRequest { params: self.params, options };
        validate_simulation_request(&request)?;
        Ok(request)
    }
}

/// Target of a trace request
#[derive(Debug, Clone, PartialEq)]
enum TraceTarget {
    Transaction(B256),
    Call(TransactionCall),
    CallMany(Vec<Bundle>),
}

/// A built trace request, ready to be sent to its endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum TraceRequest {
    Transaction(TraceTransactionRequest),
    Call(TraceCallRequest),
    CallMany(TraceCallManyRequest),
}

/// Builder for the trace endpoints
///
/// Starts from one of [`Self::transaction`], [`Self::call`] or
/// [`Self::call_many`]. Only the call tracer is enabled by default.
#[derive(Debug, Clone)]
pub struct TraceRequestBuilder {
    target: TraceTarget,
    config: TraceConfig,
    block: String,
    state_overrides: BTreeMap<Address, StateOverride>,
    block_overrides: Option<BlockOverrides>,
    tx_index: TxIndex,
}

impl TraceRequestBuilder {
    fn with_target(target: TraceTarget) -> Self {
        Self {
            target,
            config: TraceConfig::default(),
            block: BlockTag::Latest.to_string(),
            state_overrides: BTreeMap::new(),
            block_overrides: None,
            tx_index: TxIndex::End,
        }
    }

    /// Traces a mined transaction
    pub fn transaction(hash: B256) -> Self {
        Self::with_target(TraceTarget::Transaction(hash))
    }

    /// Traces a call on top of a block
    pub fn call(call: TransactionCall) -> Self {
        Self::with_target(TraceTarget::Call(call))
    }

    /// Traces bundles of calls executed sequentially
    pub fn call_many(bundles: Vec<Bundle>) -> Self {
        Self::with_target(TraceTarget::CallMany(bundles))
    }

    pub fn with_call_tracer(mut self, only_top_call: bool, with_logs: bool) -> Self {
        self.config.call_tracer = Some(CallTracerConfig { only_top_call, with_logs });
        self
    }

    pub fn without_call_tracer(mut self) -> Self {
        self.config.call_tracer = None;
        self
    }

    pub fn with_prestate_tracer(mut self, diff_mode: bool) -> Self {
        self.config.prestate_tracer = Some(PrestateTracerConfig { diff_mode, ..Default::default() });
        self
    }

    pub fn with_struct_logger(mut self, config: StructLoggerConfig) -> Self {
        self.config.struct_logger = Some(config);
        self
    }

    pub fn with_4byte_tracer(mut self) -> Self {
        self.config.four_byte_tracer = true;
        self
    }

    /// Replaces the whole tracer configuration
    pub fn tracer_config(mut self, config: TraceConfig) -> Self {
        self.config = config;
        self
    }

    /// Block tag to execute on
    pub fn block_tag(mut self, tag: BlockTag) -> Self {
        self.block = tag.to_string();
        self
    }

    /// Block number to execute on
    pub fn block_number(mut self, number: u64) -> Self {
        self.block = format!("0x{number:x}");
        self
    }

    /// Raw block parameter (tag or hex number)
    pub fn block(mut self, block: impl Into<String>) -> Self {
        self.block = block.into();
        self
    }

    pub fn state_override(mut self, address: Address, state_override: StateOverride) -> Self {
        self.state_overrides.insert(address, state_override);
        self
    }

    pub fn state_overrides(mut self, overrides: BTreeMap<Address, StateOverride>) -> Self {
        self.state_overrides.extend(overrides);
        self
    }

    pub fn block_overrides(mut self, overrides: BlockOverrides) -> Self {
        self.block_overrides = Some(overrides);
        self
    }

    /// Position within the block for `call_many`
    pub fn tx_index(mut self, tx_index: TxIndex) -> Self {
        self.tx_index = tx_index;
        self
    }

    /// Validates and builds the request
    ///
    /// # Errors
    /// * `StateExclusivity` - An override sets both `state` and `stateDiff`
    /// * `InvalidSize` - A `call_many` request holds 0 or more than 10 bundles
    /// * `NoCalls` - A bundle holds no transaction
    pub fn build(self) -> Result<TraceRequest, ValidationError> {
        for state_override in self.state_overrides.values() {
            state_override.validate_state_exclusivity()?;
        }
        match self.target {
            TraceTarget::Transaction(transaction_hash) => {
                Ok(TraceRequest::Transaction(TraceTransactionRequest { transaction_hash, tracer_config: self.config }))
            }
            TraceTarget::Call(call) => Ok(TraceRequest::Call(TraceCallRequest {
                call,
                block: self.block,
                tracer_config: self.config,
                state_overrides: (!self.state_overrides.is_empty()).then_some(self.state_overrides),
                block_overrides: self.block_overrides,
            })),
            TraceTarget::CallMany(bundles) => {
                validate_batch_size("bundles", bundles.len())?;
                if bundles.iter().any(|bundle| bundle.transactions.is_empty()) {
                    return Err(ValidationError::NoCalls);
                }
                Ok(TraceRequest::CallMany(TraceCallManyRequest {
                    bundles,
                    state_context: StateContext { block: self.block, tx_index: self.tx_index },
                    tracer_config: self.config,
                }))
            }
        }
    }
}

/// Builder for [`AccessListRequest`]
#[derive(Debug, Clone)]
pub struct AccessListRequestBuilder {
    call: Option<TransactionCall>,
    block: String,
}

impl Default for AccessListRequestBuilder {
    fn default() -> Self {
        Self { call: None, block: BlockTag::Latest.to_string() }
    }
}

impl AccessListRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call(mut self, call: TransactionCall) -> Self {
        self.call = Some(call);
        self
    }

    pub fn block_tag(mut self, tag: BlockTag) -> Self {
        self.block = tag.to_string();
        self
    }

    pub fn block_number(mut self, number: u64) -> Self {
        self.block = format!("0x{number:x}");
        self
    }

    pub fn block(mut self, block: impl Into<String>) -> Self {
        self.block = block.into();
        self
    }

    /// Builds the request
    ///
    /// # Errors
    /// `MissingField("params")` when no call was set
    pub fn build(self) -> Result<AccessListRequest, ValidationError> {
        let params = self.call.ok_or(ValidationError::MissingField("params"))?;
        Ok(AccessListRequest { params, block: self.block })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageSlot;
    use alloy::primitives::address;

    const ALICE: Address = address!("742d35cc6634c0532925a3b844bc9e7595f06e8c");
    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

    fn transfer_call() -> TransactionCall {
        TransactionCallBuilder::new().from(ALICE).to(USDC).value(U256::from(1)).gas(100_000).build()
    }

    #[test]
    fn test_simulation_builder_happy_path() {
        let mut balance = StateOverride::default();
        balance.balance = Some(U256::from(10).pow(U256::from(18)));
        let request = SimulationRequestBuilder::new()
            .call(transfer_call())
            .account(ALICE)
            .block_tag(BlockTag::Latest)
            .state_overrides([(ALICE, balance)])
            .build()
            .unwrap();

        assert_eq!(request.params.calls.len(), 1);
        let overrides = request.options.unwrap().state_overrides.unwrap();
        assert_eq!(overrides[0].address, Some(ALICE));
    }

    #[test]
    fn test_simulation_builder_validation() {
        assert_eq!(SimulationRequestBuilder::new().account(ALICE).build().unwrap_err(), ValidationError::NoCalls);

        let err = SimulationRequestBuilder::new()
            .call(transfer_call())
            .account(ALICE)
            .block_number(100)
            .block_tag(BlockTag::Safe)
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::BlockExclusivity);

        let err = SimulationRequestBuilder::new().call(transfer_call()).build().unwrap_err();
        assert_eq!(err, ValidationError::MissingAccount);
        assert!(SimulationRequestBuilder::new().call(transfer_call()).without_asset_tracing().build().is_ok());

        let mut conflicting = StateOverride::for_account(USDC);
        conflicting.state = Some(vec![StorageSlot { slot: B256::ZERO, value: B256::ZERO }]);
        conflicting.state_diff = Some(BTreeMap::new());
        let err = SimulationRequestBuilder::new()
            .call(transfer_call())
            .without_asset_tracing()
            .state_override(conflicting)
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::StateExclusivity { .. }));

        let err = SimulationRequestBuilder::new()
            .call(transfer_call())
            .without_asset_tracing()
            .state_override(StateOverride::default())
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("stateOverride.address"));
    }

    #[test]
    fn test_trace_builder_call() {
        let request = TraceRequestBuilder::call(transfer_call())
            .block_number(0x10)
            .with_prestate_tracer(true)
            .with_4byte_tracer()
            .build()
            .unwrap();
        match request {
            TraceRequest::Call(call) => {
                assert_eq!(call.block, "0x10");
                assert!(call.tracer_config.four_byte_tracer);
                assert!(call.tracer_config.prestate_tracer.unwrap().diff_mode);
                assert!(call.tracer_config.call_tracer.is_some());
                assert!(call.state_overrides.is_none());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_trace_builder_call_many_limits() {
        let bundle = Bundle { transactions: vec![transfer_call()], block_override: None };
        assert!(TraceRequestBuilder::call_many(vec![bundle.clone(); 10]).build().is_ok());

        let err = TraceRequestBuilder::call_many(vec![bundle; 11]).build().unwrap_err();
        assert_eq!(err, ValidationError::InvalidSize { kind: "bundles", min: 1, max: 10, actual: 11 });
        assert!(TraceRequestBuilder::call_many(vec![]).build().is_err());
        assert_eq!(
            TraceRequestBuilder::call_many(vec![Bundle::default()]).build().unwrap_err(),
            ValidationError::NoCalls
        );
    }

    #[test]
    fn test_access_list_builder() {
        assert_eq!(AccessListRequestBuilder::new().build().unwrap_err(), ValidationError::MissingField("params"));
        let request = AccessListRequestBuilder::new().call(transfer_call()).build().unwrap();
        assert_eq!(request.block, "latest");
    }
}
