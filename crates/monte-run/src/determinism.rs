use monte_core::derive_substream_seed;

/// Seed used for state `state_index` when every state is reseeded.
///
/// Depends only on the master seed and the state index, so a state's chain is
/// the same whether the series runs from the start or restarts midway.
pub fn state_seed(master_seed: u64, state_index: usize) -> u64 {
    derive_substream_seed(master_seed, state_index as u64)
}

/// Seed for the equilibration run preceding state `state_index`.
pub fn equilibration_seed(master_seed: u64, state_index: usize) -> u64 {
    derive_substream_seed(master_seed ^ 0xA5A5_A5A5_A5A5_A5A5, state_index as u64)
}
