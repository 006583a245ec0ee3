/*!
 * Type Definitions for the Credential Escrow Smart Contract
 *
 * This module defines the data structures, storage keys and error codes shared by
 * the escrow engine, the placement store and the admin guard. Event payloads live
 * in `events.rs` and the price collaborator types live in `pricing.rs`.
 */

use soroban_sdk::{contracterror, contracttype, Address, BytesN, Vec};

// ================================================================================================
// CORE DATA STRUCTURES
// ================================================================================================

/// Lifecycle state of a placement.
///
/// The numeric values are part of the read surface: `verify` reports them to
/// off-chain indexers, so they must never be renumbered.
///
/// # Transitions
/// - Empty -> Placed (place / place_batch, or split_retain for a retained subset)
/// - Placed -> Released (release / release_batch), absorbing for the key set
/// - Placed -> Refunded (refund / refund_batch), the key set becomes re-placeable
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum PlacementState {
    /// No escrow has ever been placed under this key
    Empty = 0,
    /// Funds are held in custody by the contract
    Placed = 1,
    /// Funds were paid out to the verifier and the platform
    Released = 2,
    /// Funds were returned to the requestor
    Refunded = 3,
}

/// An escrowed-fund record covering one or more verification requests.
///
/// A placement is stored under its derived placement id. Every request of a batch
/// points at the same placement, so `amount` is the aggregate of all of them.
///
/// # Invariants
/// - While `state == Placed`: `amount == per_request_price * member_count`
/// - On a terminal transition the amount is zeroed, the funds have left custody
/// - `credential_item_ids` never changes after placement
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Placement {
    /// Total escrowed units across every request pointing at this placement
    pub amount: i128,

    /// Current lifecycle state
    pub state: PlacementState,

    /// Credential items being paid for, in the order the requestor supplied them
    pub credential_item_ids: Vec<BytesN<32>>,

    /// Ledger sequence number at which the funds entered custody.
    /// Used as the logical clock for the timeout threshold.
    pub placed_at: u32,
}

/// Key of a single verification request: one requestor, one verifier, one request id.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestKey {
    pub requestor: Address,
    pub verifier: Address,
    pub request_id: BytesN<32>,
}

/// Read-only view of a placement as returned by the `verify*` functions.
///
/// A key that was never placed yields the all-zero sentinel
/// (`amount == 0`, `state == Empty`, no items, zero blocks, not refundable).
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowSnapshot {
    pub amount: i128,
    pub state: PlacementState,
    pub credential_item_ids: Vec<BytesN<32>>,

    /// Ledgers elapsed since the funds were placed
    pub blocks_since_placement: u32,

    /// True when the placement is Placed and old enough to be refunded
    pub can_refund: bool,
}

/// Storage keys.
///
/// Configuration and roles live in instance storage, they are read by every call.
/// Pointers and placements live in persistent storage, one entry per key.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    Owner,
    Platform,
    Token,
    Pricing,
    FeeRate,
    TimeoutThreshold,
    Paused,
    Pointer(RequestKey),
    Placement(BytesN<32>),
}

// ================================================================================================
// ERROR DEFINITIONS
// ================================================================================================

/// Error codes for every rejected escrow operation.
///
/// Codes are grouped by category so that clients can tell a bad input from a
/// state conflict without a lookup table. Every error aborts the whole call:
/// no storage is written, no funds move and no events are published.
///
/// # Error Code Ranges
/// - 1-19: Validation errors (malformed input, amount mismatch, bad configuration values)
/// - 20-39: State errors (the key or placement is in the wrong lifecycle state)
/// - 40-49: Authorization errors
/// - 50-59: Availability errors (contract paused)
/// - 60-69: Token transfer errors
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    // ========== Validation Errors (1-19) ==========

    /// A request id is all zero bytes
    InvalidRequestId = 1,

    /// No request ids were supplied (or nothing to release)
    EmptyRequestIds = 2,

    /// The same request id appears twice in one call.
    /// XOR-folding would cancel it out of the placement id, so it is rejected up front.
    DuplicateRequestId = 3,

    /// No credential items were supplied for a placement
    EmptyCredentialItems = 4,

    /// The declared amount differs from the quoted price (in either direction)
    AmountMismatch = 5,

    /// Fee rate is above `RATE_PRECISION` (100%)
    FeeRateOutOfRange = 6,

    /// Timeout threshold must be at least one ledger
    InvalidTimeoutThreshold = 7,

    /// The request ids supplied are not exactly the member set of the placement they point to
    PlacementMismatch = 8,

    /// An amount computation overflowed `i128`
    ArithmeticOverflow = 9,

    // ========== State Errors (20-39) ==========

    /// At least one request is already held in escrow
    AlreadyPlaced = 20,

    /// At least one request was already released, the key can never be placed again
    AlreadyReleased = 21,

    /// The placement was already refunded
    AlreadyRefunded = 22,

    /// The request was never placed
    NotPlaced = 23,

    /// The placement reached the timeout threshold, it can only be refunded
    TimedOut = 24,

    /// The placement has not reached the timeout threshold yet, it cannot be refunded
    NotTimedOut = 25,

    /// `initialize` was already called
    AlreadyInitialized = 26,

    /// The contract has not been initialized
    NotInitialized = 27,

    // ========== Authorization Errors (40-49) ==========

    /// Caller is neither the requestor nor the platform
    Unauthorized = 40,

    // ========== Availability Errors (50-59) ==========

    /// Contract is paused, place/release/refund are disabled
    ContractPaused = 50,

    // ========== Token Transfer Errors (60-69) ==========

    /// Requestor has not approved the contract for the full amount, or lacks the balance
    InsufficientAllowance = 60,

    /// A token transfer into or out of custody failed
    TokenTransferFailed = 61,
}

/// Coarse error taxonomy used by clients to decide whether resubmitting makes sense.
///
/// Follows the code ranges above. Adding an error variant requires placing it here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    Validation,
    State,
    Authorization,
    Unavailable,
    Transfer,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidRequestId
            | Error::EmptyRequestIds
            | Error::DuplicateRequestId
            | Error::EmptyCredentialItems
            | Error::AmountMismatch
            | Error::FeeRateOutOfRange
            | Error::InvalidTimeoutThreshold
            | Error::PlacementMismatch
            | Error::ArithmeticOverflow => ErrorCategory::Validation,
            Error::AlreadyPlaced
            | Error::AlreadyReleased
            | Error::AlreadyRefunded
            | Error::NotPlaced
            | Error::TimedOut
            | Error::NotTimedOut
            | Error::AlreadyInitialized
            | Error::NotInitialized => ErrorCategory::State,
            Error::Unauthorized => ErrorCategory::Authorization,
            Error::ContractPaused => ErrorCategory::Unavailable,
            Error::InsufficientAllowance | Error::TokenTransferFailed => ErrorCategory::Transfer,
        }
    }
}
