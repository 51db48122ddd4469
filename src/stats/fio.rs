// fio latency histogram layout (clat_hist log): log-linear buckets, FIO_IO_U_PLAT_BITS = 6.
// Values in the log are ns; edges here are returned in us.

/// Bucket count of fio's completion-latency histogram.
pub const PLAT_NR: usize = 1216;

const PLAT_BITS: i32 = 6;
const PLAT_VAL: usize = 1 << PLAT_BITS;

/// Lower edge (ns) of bucket `idx`.
pub fn plat_idx_to_val(idx: usize) -> f64 {
    // below 2 * PLAT_VAL buckets are 1 ns wide
    if idx < (PLAT_VAL << 1) {
        return idx as f64;
    }
    let error_bits = (idx >> PLAT_BITS) as i32 - 1;
    let base = 2f64.powi(error_bits + PLAT_BITS);
    let k = (idx % PLAT_VAL) as f64;
    base + k * 2f64.powi(error_bits)
}

/// `buckets + 1` edges in us: lower edges of every bucket plus the upper edge of the last one.
pub fn lat_bin_edges(buckets: usize) -> Vec<f64> {
    (0..=buckets).map(|i| plat_idx_to_val(i) / 1000.0).collect()
}
