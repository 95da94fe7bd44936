use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Generator used for recruitment deviations. Owned by the caller and passed
/// into each quarter so that futures can be replayed from a saved seed.
pub type RecruitmentRng = ChaCha12Rng;

/// Create a deterministic generator from a seed.
pub fn recruitment_rng(seed: u64) -> RecruitmentRng {
    ChaCha12Rng::seed_from_u64(seed)
}
