/*!
 * Escrow Store
 *
 * Keyed record store for request pointers and placements.
 *
 * - `DataKey::Pointer(RequestKey)` -> placement id the request currently belongs to
 * - `DataKey::Placement(id)`       -> aggregate `Placement` record
 *
 * Every mutating primitive checks all of its preconditions before its first write,
 * so a primitive that returns an error has not changed anything.
 */

use soroban_sdk::{Address, BytesN, Env, Vec};

use crate::admin::DAY_IN_LEDGERS;
use crate::placement_id;
use crate::types::{DataKey, EscrowSnapshot, Error, Placement, PlacementState, RequestKey};

const PERSISTENT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = PERSISTENT_BUMP_AMOUNT - DAY_IN_LEDGERS;

// ================================================================================================
// RAW ACCESS
// ================================================================================================

pub fn request_key(requestor: &Address, verifier: &Address, request_id: &BytesN<32>) -> RequestKey {
    RequestKey {
        requestor: requestor.clone(),
        verifier: verifier.clone(),
        request_id: request_id.clone(),
    }
}

pub fn read_pointer(env: &Env, key: &RequestKey) -> Option<BytesN<32>> {
    env.storage().persistent().get(&DataKey::Pointer(key.clone()))
}

pub fn read_placement(env: &Env, placement_id: &BytesN<32>) -> Option<Placement> {
    env.storage()
        .persistent()
        .get(&DataKey::Placement(placement_id.clone()))
}

fn write_pointer(env: &Env, key: RequestKey, placement_id: &BytesN<32>) {
    let key = DataKey::Pointer(key);
    env.storage().persistent().set(&key, placement_id);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

fn write_placement(env: &Env, placement_id: &BytesN<32>, placement: &Placement) {
    let key = DataKey::Placement(placement_id.clone());
    env.storage().persistent().set(&key, placement);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

fn state_error(state: PlacementState) -> Error {
    match state {
        PlacementState::Placed => Error::AlreadyPlaced,
        PlacementState::Released => Error::AlreadyReleased,
        PlacementState::Refunded => Error::AlreadyRefunded,
        PlacementState::Empty => Error::NotPlaced,
    }
}

// ================================================================================================
// PRIMITIVES
// ================================================================================================

/// Places `request_ids` under `placement_id`.
///
/// Fails if any request currently belongs to a Placed or Released placement.
/// Requests whose placement was refunded are free and get repointed.
/// If `placement_id` already holds a Placed placement the new amount is added to it.
pub fn begin_placement(
    env: &Env,
    requestor: &Address,
    verifier: &Address,
    placement_id: &BytesN<32>,
    request_ids: &Vec<BytesN<32>>,
    per_request_amount: i128,
    credential_item_ids: &Vec<BytesN<32>>,
) -> Result<(), Error> {
    for request_id in request_ids.iter() {
        let key = request_key(requestor, verifier, &request_id);
        if let Some(current) = read_pointer(env, &key).and_then(|id| read_placement(env, &id)) {
            match current.state {
                PlacementState::Placed | PlacementState::Released => return Err(state_error(current.state)),
                PlacementState::Refunded | PlacementState::Empty => {}
            }
        }
    }

    let added = per_request_amount
        .checked_mul(request_ids.len() as i128)
        .ok_or(Error::ArithmeticOverflow)?;
    let placement = aggregate(env, placement_id, added, credential_item_ids, env.ledger().sequence())?;

    write_placement(env, placement_id, &placement);
    for request_id in request_ids.iter() {
        write_pointer(env, request_key(requestor, verifier, &request_id), placement_id);
    }

    Ok(())
}

/// Builds the record to store under `placement_id` when `amount` more units join it.
fn aggregate(
    env: &Env,
    placement_id: &BytesN<32>,
    amount: i128,
    credential_item_ids: &Vec<BytesN<32>>,
    placed_at: u32,
) -> Result<Placement, Error> {
    match read_placement(env, placement_id) {
        Some(existing) if existing.state == PlacementState::Placed => Ok(Placement {
            amount: existing.amount.checked_add(amount).ok_or(Error::ArithmeticOverflow)?,
            ..existing
        }),
        _ => Ok(Placement {
            amount,
            state: PlacementState::Placed,
            credential_item_ids: credential_item_ids.clone(),
            placed_at,
        }),
    }
}

/// Resolves the live placement whose member set is exactly `request_ids`.
///
/// The placement id is derived from the supplied set, so the caller has to name every
/// member: a subset or a superset derives a different id and is rejected.
pub fn load_live(
    env: &Env,
    requestor: &Address,
    verifier: &Address,
    request_ids: &Vec<BytesN<32>>,
) -> Result<(BytesN<32>, Placement), Error> {
    let placement_id = placement_id::derive(env, requestor, verifier, request_ids);

    for request_id in request_ids.iter() {
        let pointer = read_pointer(env, &request_key(requestor, verifier, &request_id)).ok_or(Error::NotPlaced)?;
        if pointer != placement_id {
            // The request lives in a placement with different members
            return Err(match read_placement(env, &pointer) {
                Some(other) if other.state != PlacementState::Placed => state_error(other.state),
                _ => Error::PlacementMismatch,
            });
        }
    }

    let placement = read_placement(env, &placement_id).ok_or(Error::NotPlaced)?;
    if placement.state != PlacementState::Placed {
        return Err(state_error(placement.state));
    }

    Ok((placement_id, placement))
}

/// Moves a Placed placement to a terminal state and zeroes its amount.
///
/// Member pointers are left in place: Released keys stay bound to the terminal record
/// forever, Refunded keys are free and `begin_placement` will overwrite them.
pub fn finalize(env: &Env, placement_id: &BytesN<32>, outcome: PlacementState) -> Result<Placement, Error> {
    if outcome != PlacementState::Released && outcome != PlacementState::Refunded {
        return Err(Error::NotPlaced);
    }

    let placement = read_placement(env, placement_id).ok_or(Error::NotPlaced)?;
    if placement.state != PlacementState::Placed {
        return Err(state_error(placement.state));
    }

    let finalized = Placement {
        amount: 0,
        state: outcome,
        ..placement.clone()
    };
    write_placement(env, placement_id, &finalized);

    Ok(placement)
}

/// Gives the retained members of a partially released placement their own placement.
///
/// The new placement keeps the original `placed_at`, moving requests does not restart
/// their timeout. The released members keep pointing at `old_id`.
pub fn split_retain(
    env: &Env,
    requestor: &Address,
    verifier: &Address,
    old_id: &BytesN<32>,
    new_id: &BytesN<32>,
    retained: &Vec<BytesN<32>>,
    retained_amount: i128,
) -> Result<(), Error> {
    let old = read_placement(env, old_id).ok_or(Error::NotPlaced)?;
    if old.state != PlacementState::Placed {
        return Err(state_error(old.state));
    }
    for request_id in retained.iter() {
        let key = request_key(requestor, verifier, &request_id);
        if read_pointer(env, &key).as_ref() != Some(old_id) {
            return Err(Error::PlacementMismatch);
        }
    }

    let placement = aggregate(env, new_id, retained_amount, &old.credential_item_ids, old.placed_at)?;
    write_placement(env, new_id, &placement);
    for request_id in retained.iter() {
        write_pointer(env, request_key(requestor, verifier, &request_id), new_id);
    }

    Ok(())
}

// ================================================================================================
// READS
// ================================================================================================

/// Builds the `verify` view of a placement. An absent placement yields the empty sentinel.
pub fn snapshot(env: &Env, placement: Option<Placement>, timeout_threshold: u32) -> EscrowSnapshot {
    match placement {
        Some(placement) => {
            let blocks_since_placement = env.ledger().sequence().saturating_sub(placement.placed_at);
            EscrowSnapshot {
                amount: placement.amount,
                state: placement.state,
                credential_item_ids: placement.credential_item_ids,
                blocks_since_placement,
                can_refund: placement.state == PlacementState::Placed
                    && blocks_since_placement >= timeout_threshold,
            }
        }
        None => EscrowSnapshot {
            amount: 0,
            state: PlacementState::Empty,
            credential_item_ids: Vec::new(env),
            blocks_since_placement: 0,
            can_refund: false,
        },
    }
}

/// Snapshot of the placement a single request currently points to.
pub fn read(env: &Env, key: &RequestKey, timeout_threshold: u32) -> EscrowSnapshot {
    let placement = read_pointer(env, key).and_then(|id| read_placement(env, &id));
    snapshot(env, placement, timeout_threshold)
}
