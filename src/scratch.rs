//! Emergency scratch-code generation

use rand::RngCore;

/// Scratch codes are eight decimal digits
pub const SCRATCH_MODULO: u32 = 100_000_000;

/// Upper bound on the number of scratch codes per secret file
pub const MAX_SCRATCH_CODES: usize = 10;

/// Draw `n` scratch codes from the given entropy source.
///
/// `n` is clamped to `0..=10`. Values that would render with a leading zero
/// are rejected and redrawn, so every returned code is exactly eight digits.
pub fn generate<R: RngCore>(n: usize, rng: &mut R) -> Vec<u32> {
    let n = n.min(MAX_SCRATCH_CODES);
    let mut codes = Vec::with_capacity(n);
    while codes.len() < n {
        let mut buf = [0u8; 4];
        rng.fill_bytes(&mut buf);
        let code = (u32::from_be_bytes(buf) & 0x7fff_ffff) % SCRATCH_MODULO;
        if code < SCRATCH_MODULO / 10 {
            continue;
        }
        codes.push(code);
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hands out a fixed byte sequence, then zeroes.
    struct ByteRng {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl ByteRng {
        fn new(words: &[u32]) -> Self {
            let mut bytes = Vec::new();
            for w in words {
                bytes.extend_from_slice(&w.to_be_bytes());
            }
            Self { bytes, pos: 0 }
        }
    }

    impl RngCore for ByteRng {
        fn next_u32(&mut self) -> u32 {
            let mut buf = [0u8; 4];
            self.fill_bytes(&mut buf);
            u32::from_be_bytes(buf)
        }

        fn next_u64(&mut self) -> u64 {
            let mut buf = [0u8; 8];
            self.fill_bytes(&mut buf);
            u64::from_be_bytes(buf)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest.iter_mut() {
                *b = self.bytes.get(self.pos).copied().unwrap_or(0xff);
                self.pos += 1;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn deterministic_draws() {
        let mut rng = ByteRng::new(&[0x7fff_ffff, 1_234_567_890, 42_424_242]);
        let codes = generate(3, &mut rng);
        assert_eq!(codes.len(), 3);
        for code in codes {
            assert!((10_000_000..SCRATCH_MODULO).contains(&code));
        }
    }

    #[test]
    fn leading_zero_values_are_redrawn() {
        // First word reduces below 10^7 and must be skipped.
        let mut rng = ByteRng::new(&[1_000_000, 87_654_321]);
        let codes = generate(1, &mut rng);
        assert_eq!(codes, vec![87_654_321]);
    }

    #[test]
    fn count_is_clamped() {
        let mut rng = ByteRng::new(&[]);
        assert_eq!(generate(15, &mut rng).len(), MAX_SCRATCH_CODES);
        assert!(generate(0, &mut rng).is_empty());
    }
}
