use super::*;

/// Direct evaluation of every window, for comparison.
fn median_filter_naive(input: &[f32], size: usize) -> Vec<f32> {
    let half = (size / 2) as isize;
    (0..input.len() as isize)
        .map(|i| {
            let mut window: Vec<f32> = (i - half..=i + half)
                .map(|j| input[reflect_index(j, input.len())])
                .collect();
            window.sort_by(f32::total_cmp);
            window[size / 2]
        })
        .collect()
}

#[test]
fn test_reflect_index() {
    // d c b a | a b c d | d c b a
    let len = 4;
    assert_eq!(reflect_index(-1, len), 0);
    assert_eq!(reflect_index(-4, len), 3);
    assert_eq!(reflect_index(3, len), 3);
    assert_eq!(reflect_index(4, len), 3);
    assert_eq!(reflect_index(7, len), 0);
    assert_eq!(reflect_index(8, len), 0);
}

#[test]
fn test_constant_is_unchanged() {
    let input = vec![5.0f32; 17];
    assert_eq!(median_filter_reflect(&input, 7), input);
}

#[test]
fn test_removes_single_spike() {
    let mut input = vec![1.0f32; 11];
    input[5] = 100.0;
    let output = median_filter_reflect(&input, 3);
    assert!(output.iter().all(|&v| v == 1.0));
}

#[test]
fn test_edges_use_reflection() {
    // Window 3 at index 0 sees [a, a, b].
    let input = [1.0f32, 10.0, 20.0, 30.0];
    let output = median_filter_reflect(&input, 3);
    assert_eq!(output, vec![1.0, 10.0, 20.0, 30.0]);

    let input = [10.0f32, 1.0, 20.0, 2.0];
    let output = median_filter_reflect(&input, 3);
    assert_eq!(output[0], 10.0);
    assert_eq!(output[3], 2.0);
}

#[test]
fn test_matches_naive_with_window_larger_than_input() {
    let input: Vec<f32> = (0..9).map(|i| ((i * 37) % 11) as f32 - 4.0).collect();
    for size in [1, 3, 5, 9, 15, 31] {
        assert_eq!(
            median_filter_reflect(&input, size),
            median_filter_naive(&input, size),
            "size {size}"
        );
    }
}

#[test]
fn test_matches_naive_on_long_profile() {
    let input: Vec<f32> = (0..300)
        .map(|i| ((i * 7919) % 257) as f32 * 0.25 + (i as f32 * 0.01).sin())
        .collect();
    for size in [3, 7, 63, 127] {
        assert_eq!(
            median_filter_reflect(&input, size),
            median_filter_naive(&input, size)
        );
    }
}

#[test]
fn test_clamp_odd_size() {
    assert_eq!(clamp_odd_size(35, 100), 35);
    assert_eq!(clamp_odd_size(35, 20), 19);
    assert_eq!(clamp_odd_size(35, 21), 21);
    assert_eq!(clamp_odd_size(5, 0), 1);
}

#[test]
#[should_panic(expected = "must be odd")]
fn test_even_size_panics() {
    median_filter_reflect(&[1.0, 2.0], 4);
}
