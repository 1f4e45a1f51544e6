//! Redis-backed [`ScoreStore`].

use std::collections::BTreeSet;

use parking_lot::Mutex;
use redis::Commands;

use crate::error::Result;
use crate::store::{Score, ScoreStore};

/// Sensor database reached over a single Redis connection.
///
/// The connection is shared behind a mutex; each call holds the lock for one
/// command only.
pub struct RedisStore {
    conn: Mutex<redis::Connection>,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// `url` accepts every form the redis client understands, e.g.
    /// `redis://127.0.0.1:6379` or `redis+unix:///var/run/redis/redis.sock`.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        tracing::info!(url = %url, "connected to Redis");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl ScoreStore for RedisStore {
    fn exists(&self, key: &str) -> Result<bool> {
        let exists: bool = self.conn.lock().exists(key)?;
        Ok(exists)
    }

    fn score_of(&self, key: &str, member: &str) -> Result<Option<Score>> {
        let score: Option<Score> = self.conn.lock().zscore(key, member)?;
        Ok(score)
    }

    fn descending_range(&self, key: &str, min: Score, max: Score) -> Result<Vec<(String, Score)>> {
        let range: Vec<(String, Score)> =
            self.conn.lock().zrevrangebyscore_withscores(key, max, min)?;
        Ok(range)
    }

    fn top(&self, key: &str, count: usize) -> Result<Vec<(String, Score)>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(count - 1).unwrap_or(isize::MAX);
        let range: Vec<(String, Score)> = self.conn.lock().zrevrange_withscores(key, 0, stop)?;
        Ok(range)
    }

    fn is_member(&self, set_key: &str, value: &str) -> Result<bool> {
        let member: bool = self.conn.lock().sismember(set_key, value)?;
        Ok(member)
    }

    fn members_of(&self, set_key: &str) -> Result<BTreeSet<String>> {
        let members: BTreeSet<String> = self.conn.lock().smembers(set_key)?;
        Ok(members)
    }

    fn hash_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn.lock().hget(key, field)?;
        Ok(value)
    }

    fn string(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn.lock().get(key)?;
        Ok(value)
    }
}
