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

//! Key-value stores backing the coin counters.
//!
//! Counters live in hash fields: key `users:{id}:coins`, field `{id}`.

use crate::base::UserId;
use crate::error::CoinError;
use dashmap::DashMap;
use parking_lot::Mutex;
use redis::Commands;
use tracing::{debug, warn};

/// Returns the cache key and hash field holding a user's coins.
pub fn coin_key(user_id: UserId) -> (String, String) {
    (format!("users:{user_id}:coins"), user_id.to_string())
}

/// Hash-field counter store.
pub trait CoinStore: Send + Sync {
    /// Atomically adds `delta` to the field, creating it at zero first if
    /// absent. Returns the new value.
    fn increment_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CoinError>;

    /// Reads the field, `None` if it was never written.
    fn get(&self, key: &str, field: &str) -> Result<Option<i64>, CoinError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryCoinStore {
    fields: DashMap<(String, String), i64>,
}

impl MemoryCoinStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl CoinStore for MemoryCoinStore {
    fn increment_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CoinError> {
        // The entry guard holds the shard lock for the read-modify-write.
        let mut value = self
            .fields
            .entry((key.to_string(), field.to_string()))
            .or_insert(0);
        let next = value.checked_add(delta).ok_or(CoinError::Overflow)?;
        *value = next;
        Ok(next)
    }

    fn get(&self, key: &str, field: &str) -> Result<Option<i64>, CoinError> {
        Ok(self
            .fields
            .get(&(key.to_string(), field.to_string()))
            .map(|value| *value))
    }
}

/// Redis-backed store using `HINCRBY` / `HGET`.
///
/// Holds a single connection, opened lazily and dropped after any error so
/// the next call reconnects.
pub struct RedisCoinStore {
    client: redis::Client,
    connection: Mutex<Option<redis::Connection>>,
}

impl RedisCoinStore {
    pub fn open(url: &str) -> Result<Self, CoinError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> Result<T, CoinError> {
        let mut slot = self.connection.lock();
        if slot.is_none() {
            debug!("opening redis connection");
            *slot = Some(self.client.get_connection().map_err(unavailable)?);
        }
        let Some(connection) = slot.as_mut() else {
            return Err(CoinError::Unavailable("no connection".into()));
        };

        match op(connection) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(error = %e, "redis command failed, dropping connection");
                *slot = None;
                Err(unavailable(e))
            }
        }
    }
}

impl CoinStore for RedisCoinStore {
    fn increment_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CoinError> {
        self.with_connection(|conn| conn.hincr(key, field, delta))
    }

    fn get(&self, key: &str, field: &str) -> Result<Option<i64>, CoinError> {
        self.with_connection(|conn| conn.hget(key, field))
    }
}

fn unavailable(e: redis::RedisError) -> CoinError {
    CoinError::Unavailable(e.to_string())
}
