//! Price collaborator interface.
//!
//! The price registry is a separate contract. The escrow only needs one query
//! from it, so the interface is declared here and called through the generated
//! `PricingClient`.

use soroban_sdk::{contractclient, contracttype, log, Address, BytesN, Env, Vec};

use crate::types::Error;

/// Price quoted by the registry for one credential item of one verifier.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialItemPrice {
    pub price: i128,
    /// True when the verifier has not set a price and the registry answered with its fallback
    pub is_fallback: bool,
    /// True when the credential item is deprecated in the catalog
    pub deprecated: bool,
}

#[contractclient(name = "PricingClient")]
pub trait PricingInterface {
    fn get_price(env: Env, verifier: Address, credential_item_id: BytesN<32>) -> CredentialItemPrice;
}

/// Sums the current prices of `credential_item_ids` for `verifier`.
/// This is the amount one request has to escrow.
pub fn quote_per_request(
    env: &Env,
    pricing: &Address,
    verifier: &Address,
    credential_item_ids: &Vec<BytesN<32>>,
) -> Result<i128, Error> {
    let client = PricingClient::new(env, pricing);

    let mut total: i128 = 0;
    for item_id in credential_item_ids.iter() {
        let quote = client.get_price(verifier, &item_id);
        if quote.is_fallback || quote.deprecated {
            log!(
                env,
                "Price quote flags. Fallback: {}, Deprecated: {}",
                quote.is_fallback,
                quote.deprecated
            );
        }
        total = total.checked_add(quote.price).ok_or(Error::ArithmeticOverflow)?;
    }

    Ok(total)
}

/// Checks that `amount` is exactly the quoted price times the number of requests.
///
/// Both overpaying and underpaying are rejected. Returns the per-request price.
pub fn validate_amount(
    env: &Env,
    pricing: &Address,
    verifier: &Address,
    credential_item_ids: &Vec<BytesN<32>>,
    request_count: u32,
    amount: i128,
) -> Result<i128, Error> {
    if amount < 0 {
        return Err(Error::AmountMismatch);
    }

    let per_request = quote_per_request(env, pricing, verifier, credential_item_ids)?;
    let expected = per_request
        .checked_mul(request_count as i128)
        .ok_or(Error::ArithmeticOverflow)?;

    if amount != expected {
        log!(env, "Amount mismatch. Expected: {}, Provided: {}", expected, amount);
        return Err(Error::AmountMismatch);
    }

    Ok(per_request)
}
