//! Proof-of-compute: puzzle solving and difficulty retargeting
//!
//! Difficulty is the number of leading `'0'` hex characters a digest must
//! carry. The puzzle digest is `SHA-256(header_bytes || decimal nonce)`.

use crate::core::Transaction;
use crate::crypto::{meets_difficulty, sha256_hex};
use crate::mining::CancelToken;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Highest meaningful difficulty: a SHA-256 hex digest has 64 characters
pub const MAX_DIFFICULTY: u32 = 64;

/// Retargeting never lowers difficulty below this
pub const MIN_RETARGET_DIFFICULTY: u32 = 1;

/// Target block time in seconds
pub const TARGET_BLOCK_TIME: f64 = 60.0;

/// Number of recent block timestamps kept for retargeting
pub const RETARGET_WINDOW: usize = 10;

/// How many nonces are tried between cancellation checks
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Mining errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MiningError {
    #[error("Mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("Nonce space exhausted after {attempts} attempts")]
    NonceSpaceExhausted { attempts: u64 },
    #[error("Difficulty {0} exceeds the digest length")]
    DifficultyOutOfRange(u32),
}

/// A nonce whose digest meets the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleSolution {
    pub nonce: u64,
    pub digest: String,
    /// Number of digests computed to find it
    pub attempts: u64,
}

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    pub fn new(hash_attempts: u64, elapsed: Duration) -> Self {
        let time_ms = elapsed.as_millis();
        let hash_rate = if time_ms > 0 {
            hash_attempts as f64 / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };

        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// Puzzle generator/solver and difficulty controller
#[derive(Debug, Clone)]
pub struct ProofOfCompute {
    difficulty: u32,
    target_block_time: f64,
    recent_timestamps: VecDeque<f64>,
    window: usize,
}

impl ProofOfCompute {
    pub fn new(difficulty: u32) -> Self {
        Self::with_target_block_time(difficulty, TARGET_BLOCK_TIME)
    }

    pub fn with_target_block_time(difficulty: u32, target_block_time: f64) -> Self {
        Self {
            difficulty,
            target_block_time,
            recent_timestamps: VecDeque::with_capacity(RETARGET_WINDOW),
            window: RETARGET_WINDOW,
        }
    }

    /// Change how many recent timestamps are kept
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(2);
        while self.recent_timestamps.len() > self.window {
            self.recent_timestamps.pop_front();
        }
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target_block_time(&self) -> f64 {
        self.target_block_time
    }

    /// The required digest prefix: `difficulty` zero characters
    pub fn calculate_target(&self) -> String {
        "0".repeat(self.difficulty as usize)
    }

    /// Whether a digest satisfies the current target
    pub fn is_valid_digest(&self, digest: &str) -> bool {
        meets_difficulty(digest, self.difficulty)
    }

    /// Search nonces from zero until the digest meets the target
    pub fn solve_puzzle(
        &self,
        header: &[u8],
        cancel: &CancelToken,
    ) -> Result<PuzzleSolution, MiningError> {
        self.solve_puzzle_from(header, 0, cancel)
    }

    /// Search nonces starting at `start`
    ///
    /// Stops with `Cancelled` when the token fires and with
    /// `NonceSpaceExhausted` instead of wrapping past `u64::MAX`.
    pub fn solve_puzzle_from(
        &self,
        header: &[u8],
        start: u64,
        cancel: &CancelToken,
    ) -> Result<PuzzleSolution, MiningError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(MiningError::DifficultyOutOfRange(self.difficulty));
        }

        let mut prefix = Sha256::new();
        prefix.update(header);

        let mut nonce = start;
        let mut attempts = 0u64;

        loop {
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(MiningError::Cancelled { attempts });
            }

            let digest = hex::encode(
                prefix
                    .clone()
                    .chain_update(nonce.to_string().as_bytes())
                    .finalize(),
            );
            attempts += 1;

            if self.is_valid_digest(&digest) {
                return Ok(PuzzleSolution {
                    nonce,
                    digest,
                    attempts,
                });
            }

            nonce = nonce
                .checked_add(1)
                .ok_or(MiningError::NonceSpaceExhausted { attempts })?;
        }
    }

    /// Linear retarget over the given block timestamps (seconds)
    ///
    /// Average interval below target: difficulty + 1. Above target:
    /// difficulty - 1, floored at [`MIN_RETARGET_DIFFICULTY`]. Equal, or
    /// fewer than two timestamps: unchanged.
    pub fn adjust_difficulty(&mut self, recent_block_timestamps: &[f64]) -> u32 {
        let previous = self.difficulty;
        let count = recent_block_timestamps.len();
        if count < 2 {
            return self.difficulty;
        }

        let span = recent_block_timestamps[count - 1] - recent_block_timestamps[0];
        let average = span / (count - 1) as f64;

        if average < self.target_block_time {
            self.difficulty = self.difficulty.saturating_add(1).min(MAX_DIFFICULTY);
        } else if average > self.target_block_time {
            self.difficulty = self
                .difficulty
                .saturating_sub(1)
                .max(MIN_RETARGET_DIFFICULTY);
        }

        if self.difficulty != previous {
            info!(
                "Difficulty adjusted from {} to {} (average interval {:.2}s, target {:.2}s)",
                previous, self.difficulty, average, self.target_block_time
            );
        } else {
            debug!(
                "Difficulty unchanged at {} (average interval {:.2}s)",
                self.difficulty, average
            );
        }

        self.difficulty
    }

    /// Remember a mined block's timestamp in the retarget window
    pub fn record_block_time(&mut self, timestamp: f64) {
        self.recent_timestamps.push_back(timestamp);
        while self.recent_timestamps.len() > self.window {
            self.recent_timestamps.pop_front();
        }
    }

    pub fn recent_timestamps(&self) -> Vec<f64> {
        self.recent_timestamps.iter().copied().collect()
    }

    /// Retarget over the recorded window
    pub fn retarget(&mut self) -> u32 {
        let window = self.recent_timestamps();
        self.adjust_difficulty(&window)
    }

    /// Summary digest over the batch's transaction hashes
    ///
    /// Non-normative telemetry; nothing verifies it.
    pub fn generate_computational_proof(&self, transactions: &[Transaction]) -> String {
        let joined: String = transactions.iter().map(Transaction::hash).collect();
        sha256_hex(joined.as_bytes())
    }

    /// Arbitrary sample in [0, 1) recorded next to the proof
    pub fn sample_thermodynamic_entropy(&self) -> f64 {
        rand::random::<f64>()
    }
}

impl Default for ProofOfCompute {
    fn default() -> Self {
        Self::new(MIN_RETARGET_DIFFICULTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::leading_zeros;

    #[test]
    fn test_target_calculation() {
        let pow = ProofOfCompute::new(3);
        assert_eq!(pow.calculate_target(), "000");
        assert_eq!(ProofOfCompute::new(0).calculate_target(), "");
    }

    #[test]
    fn test_puzzle_solving() {
        let pow = ProofOfCompute::new(2);
        let solution = pow
            .solve_puzzle(b"test_header", &CancelToken::new())
            .unwrap();

        assert!(leading_zeros(&solution.digest) >= 2);
        assert!(&solution.digest[..2] <= pow.calculate_target().as_str());
        assert_eq!(
            solution.digest,
            sha256_hex(format!("test_header{}", solution.nonce).as_bytes())
        );
        assert_eq!(solution.attempts, solution.nonce + 1);
    }

    #[test]
    fn test_zero_difficulty_accepts_first_nonce() {
        let pow = ProofOfCompute::new(0);
        let solution = pow.solve_puzzle(b"anything", &CancelToken::new()).unwrap();
        assert_eq!(solution.nonce, 0);
        assert_eq!(solution.attempts, 1);
    }

    #[test]
    fn test_cancelled_search() {
        let pow = ProofOfCompute::new(MAX_DIFFICULTY);
        let token = CancelToken::new();
        token.cancel();

        assert_eq!(
            pow.solve_puzzle(b"header", &token),
            Err(MiningError::Cancelled { attempts: 0 })
        );
    }

    #[test]
    fn test_nonce_exhaustion_is_surfaced() {
        let pow = ProofOfCompute::new(MAX_DIFFICULTY);
        let result = pow.solve_puzzle_from(b"header", u64::MAX - 3, &CancelToken::new());
        assert_eq!(result, Err(MiningError::NonceSpaceExhausted { attempts: 4 }));
    }

    #[test]
    fn test_difficulty_out_of_range() {
        let pow = ProofOfCompute::new(MAX_DIFFICULTY + 1);
        assert_eq!(
            pow.solve_puzzle(b"header", &CancelToken::new()),
            Err(MiningError::DifficultyOutOfRange(MAX_DIFFICULTY + 1))
        );
    }

    #[test]
    fn test_difficulty_increases_for_fast_blocks() {
        let mut pow = ProofOfCompute::new(1);
        let block_times: Vec<f64> = (0..10).map(|i| i as f64 * 30.0).collect();
        let new_difficulty = pow.adjust_difficulty(&block_times);
        assert!(new_difficulty >= 1);
        assert_eq!(new_difficulty, 2);
    }

    #[test]
    fn test_difficulty_decreases_for_slow_blocks() {
        let mut pow = ProofOfCompute::new(3);
        let block_times: Vec<f64> = (0..10).map(|i| i as f64 * 120.0).collect();
        assert_eq!(pow.adjust_difficulty(&block_times), 2);
        assert_eq!(pow.adjust_difficulty(&block_times), 1);
        assert_eq!(pow.adjust_difficulty(&block_times), 1);
    }

    #[test]
    fn test_difficulty_unchanged_on_target_or_short_window() {
        let mut pow = ProofOfCompute::new(4);
        let on_target: Vec<f64> = (0..5).map(|i| i as f64 * 60.0).collect();
        assert_eq!(pow.adjust_difficulty(&on_target), 4);
        assert_eq!(pow.adjust_difficulty(&[100.0]), 4);
        assert_eq!(pow.adjust_difficulty(&[]), 4);
    }

    #[test]
    fn test_difficulty_saturates_at_max() {
        let mut pow = ProofOfCompute::new(MAX_DIFFICULTY);
        assert_eq!(pow.adjust_difficulty(&[0.0, 1.0]), MAX_DIFFICULTY);
    }

    #[test]
    fn test_window_retarget() {
        let mut pow = ProofOfCompute::new(2).with_window(3);
        for t in [0.0, 1000.0, 1010.0, 1020.0] {
            pow.record_block_time(t);
        }
        assert_eq!(pow.recent_timestamps(), vec![1000.0, 1010.0, 1020.0]);
        assert_eq!(pow.retarget(), 3);
    }

    #[test]
    fn test_computational_proof_is_deterministic() {
        let pow = ProofOfCompute::default();
        let txs = vec![Transaction::reward("a", 1.0), Transaction::reward("b", 2.0)];
        assert_eq!(
            pow.generate_computational_proof(&txs),
            pow.generate_computational_proof(&txs)
        );
        let sample = pow.sample_thermodynamic_entropy();
        assert!((0.0..1.0).contains(&sample));
    }
}
