/*!
 * Admin Guard
 *
 * Authorization, pause state and configuration. Every escrow entry point calls the
 * guards it needs before touching any placement:
 *
 * - `require_not_paused`: place, release and refund (never verify)
 * - `require_owner`: configuration changes
 * - `require_platform`: release
 * - `require_requestor_or_platform`: refund
 *
 * Configuration is read once per operation into an `EscrowConfig` snapshot, so a
 * call uses the values it observed when it was validated.
 */

use soroban_sdk::{log, Address, Env};

use crate::events::{
    FEE_RATE_UPDATED, OWNER_UPDATED, PAUSED, PLATFORM_UPDATED, TIMEOUT_UPDATED, UNPAUSED,
};
use crate::fee::{self, DEFAULT_FEE_RATE};
use crate::types::{DataKey, Error};

/// Roughly eight hours of ledgers before an unreleased escrow becomes refundable
pub const DEFAULT_TIMEOUT_THRESHOLD: u32 = 5800;

// Entry lifetimes, in ledgers (~5s each)
pub(crate) const DAY_IN_LEDGERS: u32 = 17_280;
pub(crate) const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
pub(crate) const INSTANCE_LIFETIME_THRESHOLD: u32 = INSTANCE_BUMP_AMOUNT - DAY_IN_LEDGERS;

/// Configuration observed at the start of an operation.
#[derive(Clone, Debug)]
pub struct EscrowConfig {
    pub token: Address,
    pub platform: Address,
    pub pricing: Address,
    pub fee_rate: u32,
    pub timeout_threshold: u32,
}

pub fn is_initialized(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Owner)
}

pub fn write_initial_config(env: &Env, owner: &Address, token: &Address, platform: &Address, pricing: &Address) {
    let storage = env.storage().instance();
    storage.set(&DataKey::Owner, owner);
    storage.set(&DataKey::Token, token);
    storage.set(&DataKey::Platform, platform);
    storage.set(&DataKey::Pricing, pricing);
    storage.set(&DataKey::FeeRate, &DEFAULT_FEE_RATE);
    storage.set(&DataKey::TimeoutThreshold, &DEFAULT_TIMEOUT_THRESHOLD);
    storage.set(&DataKey::Paused, &false);
    bump_instance(env);
}

pub fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

fn read_address(env: &Env, key: &DataKey) -> Result<Address, Error> {
    env.storage().instance().get(key).ok_or(Error::NotInitialized)
}

pub fn owner(env: &Env) -> Result<Address, Error> {
    read_address(env, &DataKey::Owner)
}

pub fn platform(env: &Env) -> Result<Address, Error> {
    read_address(env, &DataKey::Platform)
}

pub fn token(env: &Env) -> Result<Address, Error> {
    read_address(env, &DataKey::Token)
}

pub fn pricing(env: &Env) -> Result<Address, Error> {
    read_address(env, &DataKey::Pricing)
}

pub fn fee_rate(env: &Env) -> u32 {
    env.storage()
        .instance()
        .get(&DataKey::FeeRate)
        .unwrap_or(DEFAULT_FEE_RATE)
}

pub fn timeout_threshold(env: &Env) -> u32 {
    env.storage()
        .instance()
        .get(&DataKey::TimeoutThreshold)
        .unwrap_or(DEFAULT_TIMEOUT_THRESHOLD)
}

pub fn is_paused(env: &Env) -> bool {
    env.storage().instance().get(&DataKey::Paused).unwrap_or(false)
}

pub fn load_config(env: &Env) -> Result<EscrowConfig, Error> {
    Ok(EscrowConfig {
        token: token(env)?,
        platform: platform(env)?,
        pricing: pricing(env)?,
        fee_rate: fee_rate(env),
        timeout_threshold: timeout_threshold(env),
    })
}

// ================================================================================================
// GUARDS
// ================================================================================================

pub fn require_not_paused(env: &Env) -> Result<(), Error> {
    if is_paused(env) {
        return Err(Error::ContractPaused);
    }
    Ok(())
}

/// Requires the owner's signature. Fails the invocation in the host otherwise.
pub fn require_owner(env: &Env) -> Result<Address, Error> {
    let owner = owner(env)?;
    owner.require_auth();
    Ok(owner)
}

pub fn require_platform(env: &Env) -> Result<Address, Error> {
    let platform = platform(env)?;
    platform.require_auth();
    Ok(platform)
}

/// Refunds may be triggered by the requestor who placed the funds or by the platform.
pub fn require_requestor_or_platform(env: &Env, caller: &Address, requestor: &Address) -> Result<(), Error> {
    caller.require_auth();
    if caller != requestor && *caller != platform(env)? {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

// ================================================================================================
// CONFIGURATION UPDATES (owner only)
// ================================================================================================

pub fn set_paused(env: &Env, paused: bool) -> Result<(), Error> {
    let owner = require_owner(env)?;
    env.storage().instance().set(&DataKey::Paused, &paused);
    bump_instance(env);

    let name = if paused { PAUSED } else { UNPAUSED };
    env.events().publish((name, owner), paused);
    Ok(())
}

pub fn set_fee_rate(env: &Env, rate: u32) -> Result<(), Error> {
    let owner = require_owner(env)?;
    fee::validate_rate(rate)?;

    env.storage().instance().set(&DataKey::FeeRate, &rate);
    bump_instance(env);

    log!(env, "Platform fee rate updated: {}", rate);
    env.events().publish((FEE_RATE_UPDATED, owner), rate);
    Ok(())
}

pub fn set_timeout_threshold(env: &Env, blocks: u32) -> Result<(), Error> {
    let owner = require_owner(env)?;
    if blocks == 0 {
        return Err(Error::InvalidTimeoutThreshold);
    }

    env.storage().instance().set(&DataKey::TimeoutThreshold, &blocks);
    bump_instance(env);

    log!(env, "Timeout threshold updated: {}", blocks);
    env.events().publish((TIMEOUT_UPDATED, owner), blocks);
    Ok(())
}

pub fn transfer_ownership(env: &Env, new_owner: &Address) -> Result<(), Error> {
    let owner = require_owner(env)?;
    env.storage().instance().set(&DataKey::Owner, new_owner);
    bump_instance(env);

    env.events().publish((OWNER_UPDATED, owner), new_owner.clone());
    Ok(())
}

pub fn set_platform(env: &Env, new_platform: &Address) -> Result<(), Error> {
    let owner = require_owner(env)?;
    env.storage().instance().set(&DataKey::Platform, new_platform);
    bump_instance(env);

    env.events().publish((PLATFORM_UPDATED, owner), new_platform.clone());
    Ok(())
}
