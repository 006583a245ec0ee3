/*!
 * Credential Escrow Smart Contract
 *
 * This contract holds tokens in custody between a requestor (IDR) who asks for
 * credential verifications and a verifier (IDV) who performs them. A platform
 * account takes a configurable cut of every successful verification.
 *
 * Key features:
 * - Deterministic placement ids shared by every request of a batch
 * - Exact-price placement checked against the credential price registry
 * - Release (before timeout) with a proportional platform fee
 * - Refund (after timeout) of the full amount to the requestor
 * - Partial batch release that moves the retained requests to a new placement
 * - Admin controls: pause, fee rate, timeout threshold, ownership
 *
 * Lifecycle per (requestor, verifier, request id):
 *   Empty -> Placed -> Released        (absorbing)
 *   Empty -> Placed -> Refunded -> Placed again
 *
 * Every entry point is one atomic invocation. All checks run before the first
 * write. Records are written before funds move, so a failed token transfer
 * returns an error and the host rolls back those writes along with any events.
 */

#![no_std]

mod admin;
mod events;
mod fee;
mod placement_id;
mod pricing;
mod storage;
mod types;


use soroban_sdk::{contract, contractimpl, log, token, vec, Address, BytesN, Env, Vec};

pub use admin::DEFAULT_TIMEOUT_THRESHOLD;
pub use events::{
    EscrowBatchReleased, EscrowMoved, EscrowPlaced, EscrowRefunded, EscrowReleased,
};
pub use fee::{DEFAULT_FEE_RATE, RATE_PRECISION};
pub use pricing::{CredentialItemPrice, PricingClient};
pub use types::{Error, ErrorCategory, EscrowSnapshot, Placement, PlacementState, RequestKey};

use admin::EscrowConfig;
use fee::FeeSplit;

#[contract]
pub struct CredentialEscrowContract;

#[contractimpl]
impl CredentialEscrowContract {
    /// Initializes the escrow with its roles and collaborators.
    /// Can only be called once.
    ///
    /// # Arguments
    /// * `owner` - Administrator: pause, fee rate, timeout threshold, ownership
    /// * `token` - Token contract holding the escrowed funds
    /// * `platform` - Releases escrows and receives the platform fee
    /// * `pricing` - Credential price registry used to validate placed amounts
    ///
    /// The token is probed with `decimals()`, a non-token address aborts initialization.
    pub fn initialize(env: Env, owner: Address, token: Address, platform: Address, pricing: Address) -> Result<(), Error> {
        if admin::is_initialized(&env) {
            return Err(Error::AlreadyInitialized);
        }
        owner.require_auth();

        token::Client::new(&env, &token).decimals();

        admin::write_initial_config(&env, &owner, &token, &platform, &pricing);
        Ok(())
    }

    // ================================================================================================
    // PLACEMENT
    // ================================================================================================

    /// Places escrow for a single verification request.
    ///
    /// See [`Self::place_batch`], this is a batch of one.
    pub fn place(
        env: Env,
        requestor: Address,
        verifier: Address,
        request_id: BytesN<32>,
        amount: i128,
        credential_item_ids: Vec<BytesN<32>>,
    ) -> Result<BytesN<32>, Error> {
        let request_ids = vec![&env, request_id];
        Self::place_batch(env, requestor, verifier, request_ids, amount, credential_item_ids)
    }

    /// Places escrow for a batch of verification requests under one placement id.
    ///
    /// The requestor must have approved this contract to spend `amount` beforehand.
    ///
    /// # Business Flow
    /// 1. Checks pause state and the requestor's signature
    /// 2. Validates request ids (non-empty, non-zero, no duplicates) and items
    /// 3. Requires `amount` to equal the quoted price of the items times the number of requests
    /// 4. Records the placement and points every request at it
    /// 5. Pulls `amount` from the requestor into custody
    /// 6. Emits one `placed` event per request
    ///
    /// # Returns
    /// The placement id shared by every request of the batch
    ///
    /// # Errors
    /// - ContractPaused, EmptyRequestIds, InvalidRequestId, DuplicateRequestId
    /// - EmptyCredentialItems, AmountMismatch
    /// - AlreadyPlaced / AlreadyReleased: a request is live or was released before
    /// - InsufficientAllowance, TokenTransferFailed
    pub fn place_batch(
        env: Env,
        requestor: Address,
        verifier: Address,
        request_ids: Vec<BytesN<32>>,
        amount: i128,
        credential_item_ids: Vec<BytesN<32>>,
    ) -> Result<BytesN<32>, Error> {
        admin::require_not_paused(&env)?;
        requestor.require_auth();

        placement_id::validate_request_ids(&env, &request_ids)?;
        if credential_item_ids.is_empty() {
            return Err(Error::EmptyCredentialItems);
        }

        let config = admin::load_config(&env)?;
        let per_request = pricing::validate_amount(
            &env,
            &config.pricing,
            &verifier,
            &credential_item_ids,
            request_ids.len(),
            amount,
        )?;

        let token_client = token::Client::new(&env, &config.token);
        let custody = env.current_contract_address();
        let allowance = token_client.allowance(&requestor, &custody);
        if allowance < amount {
            log!(&env, "Insufficient allowance. Required: {}, Available: {}", amount, allowance);
            return Err(Error::InsufficientAllowance);
        }

        let placement_id = placement_id::derive(&env, &requestor, &verifier, &request_ids);
        storage::begin_placement(
            &env,
            &requestor,
            &verifier,
            &placement_id,
            &request_ids,
            per_request,
            &credential_item_ids,
        )?;

        if amount > 0 {
            match token_client.try_transfer_from(&custody, &requestor, &custody, &amount) {
                Ok(Ok(())) => {}
                _ => {
                    log!(&env, "Token transfer into custody failed for amount: {}", amount);
                    return Err(Error::TokenTransferFailed);
                }
            }
        }

        for request_id in request_ids.iter() {
            events::emit_placed(
                &env,
                EscrowPlaced {
                    requestor: requestor.clone(),
                    verifier: verifier.clone(),
                    request_id,
                    credential_item_ids: credential_item_ids.clone(),
                    amount: per_request,
                    placement_id: placement_id.clone(),
                },
            );
        }

        admin::bump_instance(&env);
        Ok(placement_id)
    }

    // ================================================================================================
    // RELEASE
    // ================================================================================================

    /// Releases a single-request placement to the verifier.
    /// Only the platform can release.
    pub fn release(env: Env, requestor: Address, verifier: Address, request_id: BytesN<32>) -> Result<(), Error> {
        let to_release = vec![&env, request_id];
        let to_keep = Vec::new(&env);
        Self::release_batch(env, requestor, verifier, to_release, to_keep).map(|_| ())
    }

    /// Releases some or all requests of a placement.
    ///
    /// `to_release` and `to_keep` together must be exactly the members of one live
    /// placement. The released share is paid out (verifier amount to the verifier,
    /// platform fee to the platform). When `to_keep` is non-empty the kept requests
    /// move to a new placement derived from `to_keep` alone, with the same items and
    /// the same placement ledger.
    ///
    /// # Fee Handling
    /// The fee is computed once on the total released amount. Released events carry
    /// the per-request floor of the fee and of the verifier amount; the remainder is
    /// reported in the `rel_batch` summary event.
    ///
    /// # Returns
    /// The new placement id of the kept requests, if any
    ///
    /// # Errors
    /// - ContractPaused, EmptyRequestIds, InvalidRequestId, DuplicateRequestId
    /// - NotPlaced, PlacementMismatch, AlreadyReleased, AlreadyRefunded
    /// - TimedOut: the placement reached the timeout threshold and can only be refunded
    /// - TokenTransferFailed
    pub fn release_batch(
        env: Env,
        requestor: Address,
        verifier: Address,
        to_release: Vec<BytesN<32>>,
        to_keep: Vec<BytesN<32>>,
    ) -> Result<Option<BytesN<32>>, Error> {
        admin::require_not_paused(&env)?;
        admin::require_platform(&env)?;

        if to_release.is_empty() {
            return Err(Error::EmptyRequestIds);
        }
        let mut members = to_release.clone();
        members.append(&to_keep);
        placement_id::validate_request_ids(&env, &members)?;

        let config = admin::load_config(&env)?;
        let (old_id, placement) = storage::load_live(&env, &requestor, &verifier, &members)?;
        if Self::placement_age(&env, &placement) >= config.timeout_threshold {
            return Err(Error::TimedOut);
        }

        let per_request = placement.amount / members.len() as i128;
        let released_amount = per_request * to_release.len() as i128;
        let split = FeeSplit::new(released_amount, config.fee_rate, to_release.len());

        let new_id = if to_keep.is_empty() {
            None
        } else {
            let new_id = placement_id::derive(&env, &requestor, &verifier, &to_keep);
            let kept_amount = placement.amount - released_amount;
            storage::split_retain(&env, &requestor, &verifier, &old_id, &new_id, &to_keep, kept_amount)?;
            Some(new_id)
        };
        storage::finalize(&env, &old_id, PlacementState::Released)?;

        Self::pay_out(&env, &config, &verifier, split.idv_fee)?;
        Self::pay_out(&env, &config, &config.platform, split.platform_fee)?;

        for request_id in to_release.iter() {
            events::emit_released(
                &env,
                EscrowReleased {
                    requestor: requestor.clone(),
                    verifier: verifier.clone(),
                    request_id,
                    credential_item_ids: placement.credential_item_ids.clone(),
                    platform_fee: split.platform_fee_per_item,
                    idv_fee: split.idv_fee_per_item,
                    placement_id: old_id.clone(),
                },
            );
        }
        events::emit_batch_released(
            &env,
            EscrowBatchReleased {
                requestor: requestor.clone(),
                verifier: verifier.clone(),
                placement_id: old_id.clone(),
                released_amount,
                platform_fee: split.platform_fee,
                idv_fee: split.idv_fee,
                platform_fee_dust: split.platform_fee_dust,
                idv_fee_dust: split.idv_fee_dust,
            },
        );
        if let Some(new_id) = &new_id {
            for request_id in to_keep.iter() {
                events::emit_moved(
                    &env,
                    EscrowMoved {
                        requestor: requestor.clone(),
                        verifier: verifier.clone(),
                        request_id,
                        credential_item_ids: placement.credential_item_ids.clone(),
                        amount: per_request,
                        old_placement_id: old_id.clone(),
                        placement_id: new_id.clone(),
                    },
                );
            }
        }

        admin::bump_instance(&env);
        Ok(new_id)
    }

    // ================================================================================================
    // REFUND
    // ================================================================================================

    /// Refunds a single-request placement to the requestor.
    /// Callable by the requestor or the platform once the placement timed out.
    pub fn refund(
        env: Env,
        caller: Address,
        requestor: Address,
        verifier: Address,
        request_id: BytesN<32>,
    ) -> Result<(), Error> {
        let request_ids = vec![&env, request_id];
        Self::refund_batch(env, caller, requestor, verifier, request_ids)
    }

    /// Refunds every request of a placement to the requestor.
    ///
    /// `request_ids` must be exactly the members of one live placement, and the
    /// placement must have reached the timeout threshold. The refunded keys can be
    /// placed again afterwards.
    ///
    /// # Errors
    /// - ContractPaused, Unauthorized
    /// - EmptyRequestIds, InvalidRequestId, DuplicateRequestId
    /// - NotPlaced, PlacementMismatch, AlreadyReleased, AlreadyRefunded
    /// - NotTimedOut
    /// - TokenTransferFailed
    pub fn refund_batch(
        env: Env,
        caller: Address,
        requestor: Address,
        verifier: Address,
        request_ids: Vec<BytesN<32>>,
    ) -> Result<(), Error> {
        admin::require_not_paused(&env)?;
        admin::require_requestor_or_platform(&env, &caller, &requestor)?;
        placement_id::validate_request_ids(&env, &request_ids)?;

        let config = admin::load_config(&env)?;
        let (placement_id, placement) = storage::load_live(&env, &requestor, &verifier, &request_ids)?;
        if Self::placement_age(&env, &placement) < config.timeout_threshold {
            return Err(Error::NotTimedOut);
        }

        let per_request = placement.amount / request_ids.len() as i128;
        storage::finalize(&env, &placement_id, PlacementState::Refunded)?;
        Self::pay_out(&env, &config, &requestor, placement.amount)?;

        for request_id in request_ids.iter() {
            events::emit_refunded(
                &env,
                EscrowRefunded {
                    requestor: requestor.clone(),
                    verifier: verifier.clone(),
                    request_id,
                    credential_item_ids: placement.credential_item_ids.clone(),
                    amount: per_request,
                    placement_id: placement_id.clone(),
                },
            );
        }

        admin::bump_instance(&env);
        Ok(())
    }

    // ================================================================================================
    // VERIFICATION (read-only, available while paused)
    // ================================================================================================

    /// Returns the state of the placement a request currently belongs to.
    pub fn verify(env: Env, requestor: Address, verifier: Address, request_id: BytesN<32>) -> EscrowSnapshot {
        let key = storage::request_key(&requestor, &verifier, &request_id);
        storage::read(&env, &key, admin::timeout_threshold(&env))
    }

    /// Returns the state of the placement derived from a set of request ids.
    ///
    /// A set that could never have been placed (empty, zero or repeated ids) reads
    /// as the empty sentinel. Repeated ids would cancel out of the derived id and
    /// alias the placement of the remaining ids.
    pub fn verify_batch(env: Env, requestor: Address, verifier: Address, request_ids: Vec<BytesN<32>>) -> EscrowSnapshot {
        let placement = match placement_id::validate_request_ids(&env, &request_ids) {
            Ok(()) => {
                let id = placement_id::derive(&env, &requestor, &verifier, &request_ids);
                storage::read_placement(&env, &id)
            }
            Err(_) => None,
        };
        storage::snapshot(&env, placement, admin::timeout_threshold(&env))
    }

    /// Returns the state of a placement by id.
    pub fn verify_placement(env: Env, placement_id: BytesN<32>) -> EscrowSnapshot {
        let placement = storage::read_placement(&env, &placement_id);
        storage::snapshot(&env, placement, admin::timeout_threshold(&env))
    }

    /// Derives the placement id a batch would get.
    pub fn calculate_placement_id(
        env: Env,
        requestor: Address,
        verifier: Address,
        request_ids: Vec<BytesN<32>>,
    ) -> Result<BytesN<32>, Error> {
        placement_id::validate_request_ids(&env, &request_ids)?;
        Ok(placement_id::derive(&env, &requestor, &verifier, &request_ids))
    }

    /// Platform fee the current rate takes from `amount`.
    pub fn calculate_platform_fee(env: Env, amount: i128) -> i128 {
        fee::platform_fee(amount, admin::fee_rate(&env))
    }

    // ================================================================================================
    // ADMINISTRATION (owner only)
    // ================================================================================================

    /// Sets the number of ledgers after which a placement can no longer be released
    /// and becomes refundable. Must be at least 1.
    pub fn set_timeout_threshold(env: Env, blocks: u32) -> Result<(), Error> {
        admin::set_timeout_threshold(&env, blocks)
    }

    /// Sets the platform fee rate in units of `RATE_PRECISION` (0 to 100%).
    pub fn set_fee_rate(env: Env, rate: u32) -> Result<(), Error> {
        admin::set_fee_rate(&env, rate)
    }

    /// Halts place, release and refund. Verification stays available.
    pub fn pause(env: Env) -> Result<(), Error> {
        admin::set_paused(&env, true)
    }

    pub fn unpause(env: Env) -> Result<(), Error> {
        admin::set_paused(&env, false)
    }

    pub fn transfer_ownership(env: Env, new_owner: Address) -> Result<(), Error> {
        admin::transfer_ownership(&env, &new_owner)
    }

    /// Changes the account that releases escrows and collects platform fees.
    /// Live placements are not affected.
    pub fn set_platform(env: Env, new_platform: Address) -> Result<(), Error> {
        admin::set_platform(&env, &new_platform)
    }

    // ================================================================================================
    // QUERY FUNCTIONS (GETTERS)
    // ================================================================================================

    pub fn get_owner(env: Env) -> Result<Address, Error> {
        admin::owner(&env)
    }

    pub fn get_platform(env: Env) -> Result<Address, Error> {
        admin::platform(&env)
    }

    pub fn get_token(env: Env) -> Result<Address, Error> {
        admin::token(&env)
    }

    pub fn get_pricing(env: Env) -> Result<Address, Error> {
        admin::pricing(&env)
    }

    pub fn get_platform_fee_rate(env: Env) -> u32 {
        admin::fee_rate(&env)
    }

    pub fn get_rate_precision(_env: Env) -> u32 {
        RATE_PRECISION
    }

    pub fn get_timeout_threshold(env: Env) -> u32 {
        admin::timeout_threshold(&env)
    }

    pub fn is_paused(env: Env) -> bool {
        admin::is_paused(&env)
    }
}

impl CredentialEscrowContract {
    fn placement_age(env: &Env, placement: &Placement) -> u32 {
        env.ledger().sequence().saturating_sub(placement.placed_at)
    }

    /// Pays `amount` out of custody. Zero amounts are skipped.
    fn pay_out(env: &Env, config: &EscrowConfig, to: &Address, amount: i128) -> Result<(), Error> {
        if amount <= 0 {
            return Ok(());
        }

        let token_client = token::Client::new(env, &config.token);
        match token_client.try_transfer(&env.current_contract_address(), to, &amount) {
            Ok(Ok(())) => Ok(()),
            _ => {
                log!(env, "Token transfer out of custody failed for amount: {}", amount);
                Err(Error::TokenTransferFailed)
            }
        }
    }
}
