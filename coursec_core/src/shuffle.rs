/// A seeded pseudo random number generator yielding floats in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Prng {
	state: u32,
}

impl Prng {
	pub fn next_f64(&mut self) -> f64 {
		// mulberry32
		self.state = self.state.wrapping_add(0x6D2B_79F5);
		let mut t = self.state;
		t = (t ^ (t >> 15)).wrapping_mul(t | 1);
		t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
		f64::from(t ^ (t >> 14)) / 4_294_967_296.0
	}
}

impl Iterator for Prng {
	type Item = f64;

	fn next(&mut self) -> Option<Self::Item> {
		Some(self.next_f64())
	}
}

/// Create a generator seeded with the 31-multiplier hash of the UTF-16 code
/// units of `seed`.
pub fn create_prng(seed: &str) -> Prng {
	let hash = seed
		.encode_utf16()
		.fold(0_i32, |hash, unit| {
			hash.wrapping_mul(31).wrapping_add(i32::from(unit))
		});

	Prng {
		state: hash as u32,
	}
}

/// Return a Fisher-Yates shuffled copy of `items`. The same items and seed
/// always produce the same order.
pub fn deterministic_shuffle<T: Clone>(items: &[T], seed: &str) -> Vec<T> {
	let mut shuffled = items.to_vec();
	let mut prng = create_prng(seed);

	for index in (1..shuffled.len()).rev() {
		let other = (prng.next_f64() * (index + 1) as f64).floor() as usize;
		shuffled.swap(index, other.min(index));
	}

	shuffled
}
