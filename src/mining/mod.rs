//! Mining module: proof-of-compute, cancellation and transaction pooling

pub mod cancel;
pub mod mempool;
pub mod proof;

pub use cancel::CancelToken;
pub use mempool::{Mempool, MempoolEntry, MempoolSnapshot, MempoolStats};
pub use proof::{
    MiningError, MiningStats, ProofOfCompute, PuzzleSolution, MAX_DIFFICULTY,
    MIN_RETARGET_DIFFICULTY, RETARGET_WINDOW, TARGET_BLOCK_TIME,
};
