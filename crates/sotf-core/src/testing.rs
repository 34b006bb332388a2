//! Test-only helpers.

use rand::RngCore;

/// An RNG that returns the same word forever.
///
/// `low()` makes every `random::<f64>()` draw `0.0`; `high()` makes it just
/// below `1.0`. Range draws over a single element always pick it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConstRng(u64);

impl ConstRng {
    pub(crate) const fn low() -> Self {
        Self(0)
    }

    pub(crate) const fn high() -> Self {
        Self(u64::MAX)
    }
}

impl RngCore for ConstRng {
    fn next_u32(&mut self) -> u32 {
        u32::try_from(self.0 >> 32).unwrap_or(u32::MAX)
    }

    fn next_u64(&mut self) -> u64 {
        self.0
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        let byte = if self.0 == 0 { 0 } else { u8::MAX };
        dst.fill(byte);
    }
}
