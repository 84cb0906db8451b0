use tabflow_core::types::ContainerFootprints;

/// Maximum additional map containers the cluster can host concurrently.
///
/// Bin-packing simulation over `node_count` bins of `node_slots` capacity:
/// the master container lands in bin 0, then the already-committed reduce
/// containers are placed round-robin over the bins starting with the bin
/// after the master's (wrapping). Reducers may over-subscribe a bin; the
/// model only tracks consumed slots, matching a scheduler that has already
/// accepted them. Each bin then contributes `floor(free / map_slots)`
/// additional mappers, with free capacity clamped at zero.
pub fn max_additional_mappers(
    node_count: u32,
    reducer_count: u32,
    footprints: ContainerFootprints,
) -> u32 {
    let ContainerFootprints {
        node_slots,
        master_slots,
        map_slots,
        reduce_slots,
    } = footprints;

    if node_count == 0 || map_slots == 0 {
        return 0;
    }

    let mut consumed = vec![0u64; node_count as usize];
    consumed[0] += u64::from(master_slots);
    for reducer in 0..reducer_count {
        let bin = ((reducer + 1) % node_count) as usize;
        consumed[bin] += u64::from(reduce_slots);
    }

    let total: u64 = consumed
        .iter()
        .map(|&used| u64::from(node_slots).saturating_sub(used) / u64::from(map_slots))
        .sum();
    u32::try_from(total).unwrap_or(u32::MAX)
}
