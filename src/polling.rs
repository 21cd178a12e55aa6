use std::collections::{HashMap, HashSet};
use std::iter::FusedIterator;
use std::thread;
use std::time::Duration;

use crate::consumer::{Consumer, TopicPartition};
use crate::errors::{KafkaRestError, Result};
use crate::record::Record;
use crate::transport::Transport;

/// How many times [`Consumer::consume_latest`] tries to read the tail of the partition.
pub const CONSUME_LATEST_ATTEMPTS: usize = 10;

/// Outcome of a single attempt at reading the tail of a partition.
enum TailRead {
    /// The partition never held any record.
    EmptyPartition,
    Found(Record),
    NothingYet,
}

impl<T: Transport> Consumer<T> {
    /// Read the most recent record of the topic.
    ///
    /// The REST Proxy has no endpoint for this, so it's approximated: the consumer instance
    /// is assigned the first partition of the topic, then positioned one record before its
    /// end offset, and whatever comes back from fetching is drained keeping the last record.
    /// HTTP errors during an attempt are logged and the attempt is repeated,
    /// up to [`CONSUME_LATEST_ATTEMPTS`] times.
    ///
    /// Returns `None` if the partition is empty, or no record was read within the attempts.
    ///
    /// **NOTE:** This is best-effort: records produced between reading the end offset
    /// and fetching can make the result not the actual latest. Only the first partition
    /// is considered. The consumer instance must be created, and not subscribed:
    /// see [`Consumer::unsubscribed_session`].
    pub fn consume_latest(&mut self) -> Result<Option<Record>> {
        let topic = self.topic().to_string();
        let partition = match self.partitions(&topic)?.first() {
            Some(p) => p.partition,
            None => return Err(KafkaRestError::NoPartitions(topic)),
        };

        // Subscribing would not have the partition until the first fetch: no way to seek before that.
        self.assign(&[TopicPartition::new(topic.as_str(), partition)])?;

        for attempt in 1..=CONSUME_LATEST_ATTEMPTS {
            match self.read_tail(&topic, partition) {
                Ok(TailRead::EmptyPartition) => {
                    tracing::debug!(topic = topic.as_str(), partition, "Partition is empty");
                    return Ok(None);
                },
                Ok(TailRead::Found(record)) => return Ok(Some(record)),
                Ok(TailRead::NothingYet) => {
                    tracing::debug!(
                        topic = topic.as_str(),
                        partition,
                        attempt,
                        "No record at the tail of the partition yet"
                    );
                },
                Err(e @ KafkaRestError::Http { .. }) => {
                    tracing::warn!(
                        topic = topic.as_str(),
                        partition,
                        attempt,
                        "Failed to read the tail of the partition: {e}"
                    );
                },
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    fn read_tail(&self, topic: &str, partition: i32) -> Result<TailRead> {
        let end_offset = self.offsets(topic, partition)?.end_offset;
        if end_offset <= 0 {
            return Ok(TailRead::EmptyPartition);
        }

        self.seek(topic, partition, end_offset - 1)?;

        Ok(match self.consume_earliest(None, None)?.pop() {
            Some(record) => TailRead::Found(record),
            None => TailRead::NothingYet,
        })
    }

    /// Poll for the records with the given keys, until all of them have been seen.
    ///
    /// Each iteration sleeps `interval_sec` seconds, fetches the available records, and yields
    /// a [`KeyedBatch`]: the records whose key was still awaited, and the keys still awaited after that.
    /// A key is yielded at most once: if a fetch returns several records with the same awaited key,
    /// the last one is kept. Records with keys not awaited are dropped.
    ///
    /// The iterator ends when every key has been seen, or after yielding an error.
    /// If some key never shows up, it never ends: callers can stop iterating when they see fit.
    ///
    /// Fails without sending anything if `interval_sec` is negative or not finite.
    pub fn consume<I, K>(&self, keys: I, interval_sec: f64) -> Result<KeyedPoll<'_, T>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let interval =
            Duration::try_from_secs_f64(interval_sec).map_err(|_| KafkaRestError::InvalidPollInterval(interval_sec))?;

        Ok(KeyedPoll {
            consumer: self,
            pending: keys.into_iter().map(Into::into).collect(),
            interval,
            failed: false,
        })
    }

    /// Same as [`Self::consume`], but waits until all the keys have been seen,
    /// and returns all the matching records.
    pub fn consume_all<I, K>(&self, keys: I, interval_sec: f64) -> Result<Vec<Record>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut records = Vec::new();
        for batch in self.consume(keys, interval_sec)? {
            records.extend(batch?.records);
        }

        Ok(records)
    }
}

/// What [`KeyedPoll`] yields at each iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedBatch {
    /// Records whose key was awaited, in the order they were fetched.
    pub records: Vec<Record>,

    /// Keys still awaited.
    pub remaining: HashSet<String>,
}

/// Iterator returned by [`Consumer::consume`].
pub struct KeyedPoll<'a, T: Transport> {
    consumer: &'a Consumer<T>,
    pending: HashSet<String>,
    interval: Duration,
    failed: bool,
}

impl<T: Transport> KeyedPoll<'_, T> {
    /// Keys not seen so far.
    pub fn remaining(&self) -> &HashSet<String> {
        &self.pending
    }

    fn take_pending(&mut self, records: Vec<Record>) -> Vec<Record> {
        let mut matched: Vec<Record> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in records {
            let key = match record.key_str() {
                Some(key) if self.pending.contains(key) => key.to_string(),
                _ => continue,
            };

            match positions.get(&key).copied() {
                Some(i) => matched[i] = record,
                None => {
                    positions.insert(key, matched.len());
                    matched.push(record);
                },
            }
        }

        for key in positions.keys() {
            self.pending.remove(key);
        }

        matched
    }
}

impl<T: Transport> Iterator for KeyedPoll<'_, T> {
    type Item = Result<KeyedBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pending.is_empty() {
            return None;
        }

        thread::sleep(self.interval);

        let records = match self.consumer.consume_earliest(None, None) {
            Ok(records) => records,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            },
        };

        let matched = self.take_pending(records);
        tracing::debug!(matched = matched.len(), remaining = self.pending.len(), "Polled for awaited keys");

        Some(Ok(KeyedBatch {
            records: matched,
            remaining: self.pending.clone(),
        }))
    }
}

impl<T: Transport> FusedIterator for KeyedPoll<'_, T> {}
