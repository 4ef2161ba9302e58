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

//! Benchmarks for coin accounting and allocation runs.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Allocation arithmetic
//! - Full allocation runs against the in-memory ledger
//! - Parallel coin increments on one and on many users

use chrono::{Duration, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use digitvl_rewards::{
    Allocation, CoinLedger, EscrowAllocator, EscrowConfig, FanSplitFormula, ListenHistory,
    MemoryCoinStore, MemoryLedger, SponsorshipId, StaticSponsorship, UserId, Wallet,
    WalletAddress,
};
use rayon::prelude::*;
use rust_decimal_macros::dec;

// =============================================================================
// Helper Functions
// =============================================================================

fn make_sponsorship(artist: &Wallet, listeners: usize) -> StaticSponsorship {
    StaticSponsorship {
        id: SponsorshipId("bench".into()),
        artist_wallet: artist.address().clone(),
        platform_wallet: WalletAddress::new("rPlatform"),
        fan_split_percentage: dec!(0.3),
        sponsorship_fee: dec!(1000),
        listener_wallets: (0..listeners)
            .map(|i| WalletAddress::new(format!("rFan{i}")))
            .collect(),
    }
}

fn make_history(sponsorship: &StaticSponsorship) -> ListenHistory {
    let listened = Utc::now() - Duration::hours(1);
    sponsorship
        .listener_wallets
        .iter()
        .map(|wallet| (wallet.clone(), listened))
        .collect()
}

// =============================================================================
// Allocation Benchmarks
// =============================================================================

fn bench_allocation_compute(c: &mut Criterion) {
    c.bench_function("allocation_compute", |b| {
        b.iter(|| {
            let allocation =
                Allocation::compute(black_box(dec!(100)), black_box(dec!(0.3)), dec!(0.05))
                    .unwrap();
            let pool = allocation.listener_pool(dec!(100), FanSplitFormula::AsDeployed);
            black_box(Allocation::listener_share(pool, 4));
        })
    });
}

fn bench_allocation_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_run");

    for listeners in [1, 10, 100].iter() {
        // escrow-create + one payment per listener + platform payment
        group.throughput(Throughput::Elements(*listeners as u64 + 2));
        group.bench_with_input(
            BenchmarkId::from_parameter(listeners),
            listeners,
            |b, &listeners| {
                let artist_seed = [2u8; 32];
                let artist = Wallet::from_seed(&artist_seed);
                let sponsorship = make_sponsorship(&artist, listeners);
                let history = make_history(&sponsorship);

                b.iter(|| {
                    let allocator = EscrowAllocator::new(
                        MemoryLedger::new(),
                        Wallet::from_seed(&[1u8; 32]),
                        Wallet::from_seed(&artist_seed),
                        EscrowConfig::default(),
                    );
                    let report = allocator
                        .allocate(&sponsorship.id, &sponsorship, &history, Utc::now())
                        .unwrap();
                    black_box(report);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_increments_same_user(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_increments_same_user");

    for count in [1_000, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = CoinLedger::new(MemoryCoinStore::new());

                (0..count).into_par_iter().for_each(|_| {
                    ledger.increment(UserId(1), 5).unwrap();
                });

                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_parallel_increments_different_users(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_increments_different_users");

    for count in [1_000, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = CoinLedger::new(MemoryCoinStore::new());

                (0..count).into_par_iter().for_each(|i| {
                    ledger.increment(UserId(i as u64 % 1_000), 5).unwrap();
                });

                black_box(&ledger);
            })
        });
    }
    group.finish();
}

criterion_group!(
    single_threaded,
    bench_allocation_compute,
    bench_allocation_run,
);

criterion_group!(
    multi_threaded,
    bench_parallel_increments_same_user,
    bench_parallel_increments_different_users,
);

criterion_main!(single_threaded, multi_threaded);
