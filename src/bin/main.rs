// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use csv::{ReaderBuilder, Trim};
use digitvl_rewards::{
    CoinLedger, Config, EscrowAllocator, ListenHistory, MemoryLedger, RedisCoinStore,
    StaticSponsorship, UserId, Wallet, WalletAddress,
};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "digitvl-rewards")]
#[command(about = "Coin balances and sponsorship escrow payouts", long_about = None)]
struct Args {
    /// TOML config file; defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dry-run a sponsorship allocation against an in-memory ledger
    ///
    /// Example: digitvl-rewards allocate --sponsorship drop.toml --listeners plays.csv
    Allocate {
        /// Sponsorship inputs (TOML)
        #[arg(long, value_name = "FILE")]
        sponsorship: PathBuf,

        /// Listen history CSV with columns: wallet,last_listened_at
        #[arg(long, value_name = "FILE")]
        listeners: PathBuf,

        /// Hex-encoded 32-byte seed of the sponsor key
        #[arg(long, value_name = "HEX")]
        sponsor_seed: Option<String>,

        /// Hex-encoded 32-byte seed of the artist key
        #[arg(long, value_name = "HEX")]
        artist_seed: Option<String>,
    },
    /// Read or add coins in the configured cache
    Coins {
        #[command(subcommand)]
        action: CoinsAction,
    },
}

#[derive(Subcommand, Debug)]
enum CoinsAction {
    /// Add coins to a user
    Add {
        #[arg(long)]
        user: u64,
        /// Defaults to the in-app action reward
        #[arg(long)]
        amount: Option<u32>,
    },
    /// Print a user's balance
    Get {
        #[arg(long)]
        user: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    let result = match args.command {
        Command::Allocate {
            sponsorship,
            listeners,
            sponsor_seed,
            artist_seed,
        } => run_allocate(&config, &sponsorship, &listeners, sponsor_seed, artist_seed),
        Command::Coins { action } => run_coins(&config, action),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_allocate(
    config: &Config,
    sponsorship_path: &Path,
    listeners_path: &Path,
    sponsor_seed: Option<String>,
    artist_seed: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sponsorship = StaticSponsorship::from_file(sponsorship_path)?;
    let file = File::open(listeners_path)
        .map_err(|e| format!("opening '{}': {}", listeners_path.display(), e))?;
    let (candidates, history) = read_listen_history(BufReader::new(file))?;
    if sponsorship.listener_wallets.is_empty() {
        sponsorship.listener_wallets = candidates;
    }

    let sponsor = wallet_from_seed(sponsor_seed.as_deref())?;
    let artist = match artist_seed.as_deref() {
        Some(seed) => wallet_from_seed(Some(seed))?,
        None => {
            // Without the artist's key a dry run signs with an ephemeral one.
            let artist = Wallet::generate();
            info!(
                configured = %sponsorship.artist_wallet,
                ephemeral = %artist.address(),
                "no artist seed, using ephemeral artist key"
            );
            sponsorship.artist_wallet = artist.address().clone();
            artist
        }
    };

    let allocator = EscrowAllocator::new(MemoryLedger::new(), sponsor, artist, config.escrow.clone());
    let report = allocator.allocate(&sponsorship.id, &sponsorship, &history, Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_coins(config: &Config, action: CoinsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = RedisCoinStore::open(&config.cache.redis_url)?;
    let ledger = CoinLedger::with_rewards(store, config.rewards.clone());

    match action {
        CoinsAction::Add { user, amount } => {
            let amount = amount.unwrap_or(config.rewards.in_app_action);
            let total = ledger.increment(UserId(user), amount)?;
            println!("{}", serde_json::json!({ "user": user, "total_coins": total }));
        }
        CoinsAction::Get { user } => {
            let coins = ledger.balance(UserId(user))?;
            println!("{}", serde_json::json!({ "user": user, "coins": coins }));
        }
    }
    Ok(())
}

fn wallet_from_seed(seed: Option<&str>) -> Result<Wallet, Box<dyn std::error::Error>> {
    let Some(seed) = seed else {
        return Ok(Wallet::generate());
    };
    let bytes = hex::decode(seed)?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("seed must be 32 bytes, got {}", bytes.len()))?;
    Ok(Wallet::from_seed(&seed))
}

#[derive(Debug, Deserialize)]
struct ListenRecord {
    wallet: String,
    last_listened_at: DateTime<Utc>,
}

/// Reads the listen history CSV.
///
/// Returns the wallets in row order (duplicates kept) and the latest listen
/// per wallet. Malformed rows are skipped.
pub fn read_listen_history<R: Read>(
    reader: R,
) -> Result<(Vec<WalletAddress>, ListenHistory), csv::Error> {
    let mut candidates = Vec::new();
    let mut history = ListenHistory::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<ListenRecord>() {
        match result {
            Ok(record) => {
                let wallet = WalletAddress::new(record.wallet);
                history.record(wallet.clone(), record.last_listened_at);
                candidates.push(wallet);
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed listen row");
                continue;
            }
        }
    }

    Ok((candidates, history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn parse_listen_rows() {
        let csv = "wallet,last_listened_at\n\
                   rFan1,2025-03-01T10:00:00Z\n\
                   rFan2,2025-03-02T10:00:00Z\n";

        let (candidates, history) = read_listen_history(Cursor::new(csv)).unwrap();

        assert_eq!(candidates, vec![WalletAddress::new("rFan1"), WalletAddress::new("rFan2")]);
        assert_eq!(
            history.last_listened(&WalletAddress::new("rFan2")),
            Some(Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn parse_with_whitespace() {
        let csv = "wallet,last_listened_at\n rFan1 , 2025-03-01T10:00:00Z \n";
        let (candidates, _) = read_listen_history(Cursor::new(csv)).unwrap();
        assert_eq!(candidates, vec![WalletAddress::new("rFan1")]);
    }

    #[test]
    fn duplicate_rows_stay_candidates() {
        let csv = "wallet,last_listened_at\n\
                   rFan1,2025-03-01T10:00:00Z\n\
                   rFan1,2025-03-05T10:00:00Z\n";
        let (candidates, history) = read_listen_history(Cursor::new(csv)).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(
            history.last_listened(&WalletAddress::new("rFan1")),
            Some(Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn skip_malformed_rows() {
        let csv = "wallet,last_listened_at\n\
                   rFan1,2025-03-01T10:00:00Z\n\
                   rFan2,yesterday\n\
                   rFan3,2025-03-01T11:00:00Z\n";
        let (candidates, _) = read_listen_history(Cursor::new(csv)).unwrap();
        assert_eq!(candidates, vec![WalletAddress::new("rFan1"), WalletAddress::new("rFan3")]);
    }

    #[test]
    fn seed_must_be_32_bytes() {
        assert!(wallet_from_seed(Some("abcd")).is_err());
        assert!(wallet_from_seed(Some("zz")).is_err());
        let seed = "01".repeat(32);
        let wallet = wallet_from_seed(Some(&seed)).unwrap();
        assert_eq!(wallet.address(), Wallet::from_seed(&[1u8; 32]).address());
    }
}
