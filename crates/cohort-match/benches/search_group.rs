use std::collections::BTreeSet;

use cohort_match::{Activity, combine, determine_main_field};

fn synthetic_activity(n: u64) -> Activity {
    Activity {
        today: (0..n).collect(),
        then: (0..n).filter(|id| id % 3 != 0).collect(),
        before: (0..n).filter(|id| id % 7 == 0).collect(),
    }
}

#[divan::bench(args = [1_000, 10_000, 100_000])]
fn combine_windows(bencher: divan::Bencher, n: u64) {
    let activity = synthetic_activity(n);
    let exclude: BTreeSet<u64> = (0..n).step_by(101).collect();
    bencher.bench(|| combine(&activity, true, &exclude));
}

#[divan::bench]
fn main_field(bencher: divan::Bencher) {
    let fields: Vec<u32> = (0..500).map(|i| 1000 + (i % 27) * 100 + (i % 5)).collect();
    bencher.bench(|| determine_main_field(&fields));
}

fn main() {
    divan::main();
}
