/*!
 * Placement Identity
 *
 * A placement id is derived from the requestor, the verifier and the *set* of
 * request ids it covers:
 *
 *   combined = keccak256(id_1) ^ keccak256(id_2) ^ ... ^ keccak256(id_n)
 *   placement_id = keccak256(xdr(requestor) || xdr(verifier) || combined)
 *
 * XOR is commutative and associative, so the id does not depend on the order in
 * which the batch members are supplied. This is what lets a partial release
 * recompute the id of the retained subset without knowing how it was placed.
 */

use soroban_sdk::{xdr::ToXdr, Address, Bytes, BytesN, Env, Map, Vec};

use crate::types::Error;

const ZERO_DIGEST: [u8; 32] = [0u8; 32];

/// Derives the placement id for a set of request ids.
///
/// Callers validate the ids first with [`validate_request_ids`]; a duplicate id
/// would cancel its own contribution to `combined`.
pub fn derive(env: &Env, requestor: &Address, verifier: &Address, request_ids: &Vec<BytesN<32>>) -> BytesN<32> {
    let combined = fold_request_digests(env, request_ids);

    let mut payload: Bytes = requestor.clone().to_xdr(env);
    payload.append(&verifier.clone().to_xdr(env));
    payload.extend_from_array(&combined);

    env.crypto().keccak256(&payload).to_bytes()
}

/// XOR-folds the keccak256 digest of every request id.
///
/// The fold starts at the zero digest, the identity element of XOR, so a single
/// request folds to its own digest.
pub fn fold_request_digests(env: &Env, request_ids: &Vec<BytesN<32>>) -> [u8; 32] {
    request_ids.iter().fold(ZERO_DIGEST, |mut acc, request_id| {
        let digest = env
            .crypto()
            .keccak256(&Bytes::from_array(env, &request_id.to_array()))
            .to_array();
        for (byte, d) in acc.iter_mut().zip(digest.iter()) {
            *byte ^= d;
        }
        acc
    })
}

/// Rejects id sets that cannot yield a sound placement id:
/// empty sets, all-zero ids and ids repeated within the same call.
pub fn validate_request_ids(env: &Env, request_ids: &Vec<BytesN<32>>) -> Result<(), Error> {
    if request_ids.is_empty() {
        return Err(Error::EmptyRequestIds);
    }

    let mut seen: Map<BytesN<32>, bool> = Map::new(env);
    for request_id in request_ids.iter() {
        if request_id.to_array() == ZERO_DIGEST {
            return Err(Error::InvalidRequestId);
        }
        if seen.contains_key(request_id.clone()) {
            return Err(Error::DuplicateRequestId);
        }
        seen.set(request_id, true);
    }

    Ok(())
}
