//! Vesting schedules
//!
//! A vault may be configured to send a fixed amount of an asset to a destination every day, at a
//! given time of day in Central European Time, starting after a cliff of some days. This module
//! parses such configurations, computes when the first transfer happens and builds the transfer
//! request for each vest. Running the schedule is left to the caller.

use crate::{
    error::Error,
    request::{erc20_transfer, native_transfer, CreateTransactionRequest, EvmChain},
};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::{Tz, CET};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::{collections::BTreeMap, fmt};

/// Format of the time of day a vest happens at.
pub const VESTING_TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ecosystem {
    Evm,
    Solana,
    Utxo,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ecosystem::Evm => write!(f, "evm"),
            Ecosystem::Solana => write!(f, "solana"),
            Ecosystem::Utxo => write!(f, "utxo"),
        }
    }
}

/// Whether the vested asset is the coin of the chain or a token contract on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Native,
    Erc20,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssetKind::Native => write!(f, "native"),
            AssetKind::Erc20 => write!(f, "erc20"),
        }
    }
}

/// Parse a "HH:MM" time of day.
pub fn parse_vesting_time(s: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(s, VESTING_TIME_FORMAT)
        .map_err(|e| Error::Vesting(format!("invalid vesting time '{}': {}", s, e)))
}

mod hh_mm {
    use super::{parse_vesting_time, VESTING_TIME_FORMAT};

    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(VESTING_TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_vesting_time(&s).map_err(de::Error::custom)
    }
}

/// The vesting of one asset out of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetVesting {
    /// The asset ticker, eg "BNB" or "USDT".
    pub asset: String,
    pub ecosystem: Ecosystem,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// The chain name, eg "bsc" or "ethereum".
    pub chain: String,
    pub destination: String,
    /// The amount sent at each vest, in asset units (eg "0.5").
    pub value: String,
    #[serde(default)]
    pub note: Option<String>,
    /// Number of days before the first vest.
    pub cliff_days: u32,
    /// Time of day of the vest, in CET.
    #[serde(with = "hh_mm")]
    pub vesting_time: NaiveTime,
}

/// The vesting of one asset out of a given vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VestingConfig {
    pub vault_id: Uuid,
    pub vesting: AssetVesting,
}

/// Parse the vesting configurations of a set of vaults, given as a JSON object mapping each vault
/// id to the list of assets it vests.
pub fn parse_vault_configs(json: &str) -> Result<Vec<VestingConfig>, Error> {
    let vaults: BTreeMap<Uuid, Vec<AssetVesting>> = serde_json::from_str(json)?;
    let configs: Vec<VestingConfig> = vaults
        .into_iter()
        .flat_map(|(vault_id, assets)| {
            assets
                .into_iter()
                .map(move |vesting| VestingConfig { vault_id, vesting })
        })
        .collect();
    tracing::debug!(count = configs.len(), "Loaded vesting configurations");

    Ok(configs)
}

fn is_zero_amount(value: &str) -> bool {
    value.bytes().any(|b| b.is_ascii_digit()) && value.bytes().all(|b| b == b'0' || b == b'.')
}

// The earliest instant `time` designates in CET on this day.
fn cet_instant(day: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>, Error> {
    CET.from_local_datetime(&day.and_time(time))
        .earliest()
        .ok_or_else(|| {
            Error::Vesting(format!(
                "{} does not exist in CET on {}",
                time.format(VESTING_TIME_FORMAT),
                day
            ))
        })
}

/// When the first vest of this configuration happens, if it was scheduled at `now`.
///
/// The first vest is on the day (in CET) `cliff_days` after `now`, at the vesting time. If that
/// is not after `now`, it is pushed to the next day.
pub fn first_vesting_time(
    config: &VestingConfig,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, Error> {
    let vesting = &config.vesting;
    let cliff = now
        .checked_add_signed(Duration::days(i64::from(vesting.cliff_days)))
        .ok_or_else(|| Error::Vesting(format!("cliff of {} days is too long", vesting.cliff_days)))?;

    let mut day = cliff.with_timezone(&CET).date_naive();
    let mut first = cet_instant(day, vesting.vesting_time)?.with_timezone(&Utc);
    if first <= now {
        day = day
            .succ_opt()
            .ok_or_else(|| Error::Vesting(format!("no day after {}", day)))?;
        first = cet_instant(day, vesting.vesting_time)?.with_timezone(&Utc);
    }
    tracing::debug!(
        vault_id = %config.vault_id,
        asset = %vesting.asset,
        first_vest = %first,
        "Computed first vesting time"
    );

    Ok(first)
}

impl VestingConfig {
    /// The request to send for one vest of this asset, or `None` if the vested amount is zero.
    pub fn transfer_request(&self) -> Result<Option<CreateTransactionRequest>, Error> {
        let vesting = &self.vesting;
        if is_zero_amount(&vesting.value) {
            tracing::warn!(
                vault_id = %self.vault_id,
                asset = %vesting.asset,
                "Vesting amount is zero, nothing to send"
            );
            return Ok(None);
        }

        let request = match (vesting.ecosystem, vesting.kind) {
            (Ecosystem::Evm, AssetKind::Native) => native_transfer(
                vesting.chain.parse::<EvmChain>()?,
                self.vault_id,
                &vesting.destination,
                &vesting.value,
                vesting.note.clone(),
            )?,
            (Ecosystem::Evm, AssetKind::Erc20) => erc20_transfer(
                vesting.chain.parse::<EvmChain>()?,
                &vesting.asset,
                self.vault_id,
                &vesting.destination,
                &vesting.value,
                vesting.note.clone(),
            )?,
            (ecosystem, kind) => {
                return Err(Error::UnsupportedAsset(format!(
                    "unsupported configuration: type={}, ecosystem={}",
                    kind, ecosystem
                )))
            }
        };

        Ok(Some(request))
    }
}
