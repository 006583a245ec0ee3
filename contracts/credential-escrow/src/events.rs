/*!
 * Escrow Events
 *
 * Per-request notifications consumed by off-chain indexers. The field names of the
 * payload structs are a compatibility surface and must not change.
 *
 * Every escrow event is published with the topics `(name, requestor, verifier)`
 * and one of the payload structs below as data.
 */

use soroban_sdk::{contracttype, symbol_short, Address, BytesN, Env, Symbol, Vec};

// ================================================================================================
// EVENT NAMES
// ================================================================================================

/// Funds for one request entered custody
pub const ESCROW_PLACED: Symbol = symbol_short!("placed");

/// One request was released to the verifier and the platform
pub const ESCROW_RELEASED: Symbol = symbol_short!("released");

/// Totals of one release call, including the per-item rounding dust
pub const ESCROW_BATCH_RELEASED: Symbol = symbol_short!("rel_batch");

/// One request was refunded to the requestor
pub const ESCROW_REFUNDED: Symbol = symbol_short!("refunded");

/// One retained request moved to a new placement after a partial release
pub const ESCROW_MOVED: Symbol = symbol_short!("moved");

pub const PAUSED: Symbol = symbol_short!("paused");
pub const UNPAUSED: Symbol = symbol_short!("unpaused");
pub const FEE_RATE_UPDATED: Symbol = symbol_short!("fee_rate");
pub const TIMEOUT_UPDATED: Symbol = symbol_short!("timeout");
pub const OWNER_UPDATED: Symbol = symbol_short!("owner");
pub const PLATFORM_UPDATED: Symbol = symbol_short!("platform");

// ================================================================================================
// EVENT PAYLOADS
// ================================================================================================

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowPlaced {
    pub requestor: Address,
    pub verifier: Address,
    pub request_id: BytesN<32>,
    pub credential_item_ids: Vec<BytesN<32>>,
    /// Amount escrowed for this request alone
    pub amount: i128,
    pub placement_id: BytesN<32>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowReleased {
    pub requestor: Address,
    pub verifier: Address,
    pub request_id: BytesN<32>,
    pub credential_item_ids: Vec<BytesN<32>>,
    /// Floor of the batch platform fee divided by the number of released requests
    pub platform_fee: i128,
    /// Floor of the batch verifier payout divided by the number of released requests
    pub idv_fee: i128,
    pub placement_id: BytesN<32>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowBatchReleased {
    pub requestor: Address,
    pub verifier: Address,
    pub placement_id: BytesN<32>,
    pub released_amount: i128,
    pub platform_fee: i128,
    pub idv_fee: i128,
    pub platform_fee_dust: i128,
    pub idv_fee_dust: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowRefunded {
    pub requestor: Address,
    pub verifier: Address,
    pub request_id: BytesN<32>,
    pub credential_item_ids: Vec<BytesN<32>>,
    pub amount: i128,
    pub placement_id: BytesN<32>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowMoved {
    pub requestor: Address,
    pub verifier: Address,
    pub request_id: BytesN<32>,
    pub credential_item_ids: Vec<BytesN<32>>,
    pub amount: i128,
    pub old_placement_id: BytesN<32>,
    pub placement_id: BytesN<32>,
}

// ================================================================================================
// EMITTERS
// ================================================================================================

pub fn emit_placed(env: &Env, event: EscrowPlaced) {
    let topics = (ESCROW_PLACED, event.requestor.clone(), event.verifier.clone());
    env.events().publish(topics, event);
}

pub fn emit_released(env: &Env, event: EscrowReleased) {
    let topics = (ESCROW_RELEASED, event.requestor.clone(), event.verifier.clone());
    env.events().publish(topics, event);
}

pub fn emit_batch_released(env: &Env, event: EscrowBatchReleased) {
    let topics = (ESCROW_BATCH_RELEASED, event.requestor.clone(), event.verifier.clone());
    env.events().publish(topics, event);
}

pub fn emit_refunded(env: &Env, event: EscrowRefunded) {
    let topics = (ESCROW_REFUNDED, event.requestor.clone(), event.verifier.clone());
    env.events().publish(topics, event);
}

pub fn emit_moved(env: &Env, event: EscrowMoved) {
    let topics = (ESCROW_MOVED, event.requestor.clone(), event.verifier.clone());
    env.events().publish(topics, event);
}
