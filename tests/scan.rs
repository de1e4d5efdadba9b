use proptest::prelude::*;
use wgscan::{
    inclusive_scan_cpu, scan_inclusive, Access, DeviceExecutor, Error, HostExecutor, NumericArray,
    PrefixSum,
};

fn scan_with(block_size: usize, values: &[f64]) -> Vec<f64> {
    let executor = HostExecutor::new(block_size).unwrap();
    let mut array = NumericArray::from(values);
    scan_inclusive(&executor, &mut array).unwrap();
    array.into_vec()
}

/// Values whose partial sums are exact in `f64`, so any summation order agrees.
fn exact_values(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((-4000i32..4000).prop_map(|x| f64::from(x) / 4.0), 0..max_len)
}

#[test]
fn test_five_elements_block_two() {
    assert_eq!(
        scan_with(2, &[1.0, 2.0, 3.0, 4.0, 5.0]),
        vec![1.0, 3.0, 6.0, 10.0, 15.0]
    );
}

#[test]
fn test_nine_ones_block_two() {
    let expected: Vec<f64> = (1..=9).map(f64::from).collect();
    assert_eq!(scan_with(2, &[1.0; 9]), expected);
}

#[test]
fn test_default_block_size_many_levels() {
    // 256^2 + 1 elements need three levels.
    let input: Vec<f64> = (0..256 * 256 + 1).map(|i| f64::from(i % 5)).collect();
    assert_eq!(scan_with(256, &input), inclusive_scan_cpu(&input));
}

#[test]
fn test_exact_multiples_of_block_size() {
    for blocks in [1usize, 2, 3, 4, 8, 9] {
        let input: Vec<f64> = (0..blocks * 4).map(|i| i as f64).collect();
        assert_eq!(scan_with(4, &input), inclusive_scan_cpu(&input), "{blocks} blocks");
    }
}

#[test]
fn test_empty_and_singleton() {
    assert!(scan_with(256, &[]).is_empty());
    assert_eq!(scan_with(256, &[7.25]), vec![7.25]);
}

#[test]
fn test_non_power_of_two_block() {
    let input: Vec<f64> = (1..=50).map(f64::from).collect();
    assert_eq!(scan_with(7, &input), inclusive_scan_cpu(&input));
}

#[test]
fn test_block_size_is_reduction_factor() {
    let executor = HostExecutor::new(32).unwrap();
    assert_eq!(PrefixSum::new(&executor).block_size(), 32);
}

#[test]
fn test_device_buffer_write_read_exact() {
    let executor = HostExecutor::new(8).unwrap();
    let data = [1.0 / 3.0, -1e-308, 6.02214076e23, -0.0];
    let buffer = executor.allocate(data.len(), Access::ReadOnly).unwrap();
    executor.write(&buffer, &data).unwrap();
    let mut back = [0.0; 4];
    executor.read(&buffer, &mut back).unwrap();
    assert_eq!(data.map(f64::to_bits), back.map(f64::to_bits));
}

#[test]
fn test_degenerate_block_size_is_device_init_error() {
    assert!(matches!(HostExecutor::new(0), Err(Error::DeviceInit(_))));
    assert!(matches!(HostExecutor::new(1), Err(Error::DeviceInit(_))));
}

proptest! {
    #[test]
    fn scan_matches_sequential_reference(values in exact_values(300), block_size in 2usize..20) {
        prop_assert_eq!(scan_with(block_size, &values), inclusive_scan_cpu(&values));
    }

    #[test]
    fn single_block_is_plain_prefix_sum(values in exact_values(64)) {
        prop_assert_eq!(scan_with(64, &values), inclusive_scan_cpu(&values));
    }

    #[test]
    fn non_negative_input_is_non_decreasing(
        values in prop::collection::vec((0u32..1000).prop_map(|x| f64::from(x) / 8.0), 0..200),
        block_size in 2usize..16,
    ) {
        let result = scan_with(block_size, &values);
        prop_assert!(result.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn real_inputs_within_tolerance(
        values in prop::collection::vec(-1.0e3f64..1.0e3, 0..200),
        block_size in 2usize..9,
    ) {
        let result = scan_with(block_size, &values);
        let expected = inclusive_scan_cpu(&values);
        let scale: f64 = values.iter().map(|v| v.abs()).sum::<f64>().max(1.0);
        for (got, want) in result.iter().zip(&expected) {
            prop_assert!((got - want).abs() <= 1e-9 * scale, "{} vs {}", got, want);
        }
    }
}
