/// Irregular-cost workload evaluated once per scheduled index.
///
/// This is the Fibonacci sequence computed by naive recursion, so the cost of a call grows
/// exponentially with `n`. The engines evaluate it at `index % modulus`, which makes the cost
/// of neighboring indices wildly different and the choice of scheduling policy observable.
///
/// The function is pure and may be called from any number of threads at once.
///
/// Do not memoize this. The uneven cost is the point.
///
/// # Examples
///
/// ```
/// use par_patterns::workload;
///
/// assert_eq!(workload(0), 0);
/// assert_eq!(workload(1), 1);
/// assert_eq!(workload(10), 55);
/// ```
#[must_use]
pub fn workload(n: usize) -> u64 {
    match n {
        0 => 0,
        1 => 1,
        // Wrapping only matters past n = 93, which would take geological time to reach.
        _ => workload(n.wrapping_sub(1)).wrapping_add(workload(n.wrapping_sub(2))),
    }
}
