///! @see: RFC 1950, 8.2. Verification of the checksum
const MOD_ADLER: u32 = 65521;
/// largest n such that 255n(n+1)/2 + (n+1)(MOD_ADLER-1) <= 2^32-1
const NMAX: usize = 5552;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    s1: u32,
    s2: u32,
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Adler32 {
    pub fn new() -> Self {
        Self { s1: 1, s2: 0 }
    }

    pub fn update(&mut self, data: &[u8]) {
        for batch in data.chunks(NMAX) {
            for byte in batch {
                self.s1 += *byte as u32;
                self.s2 += self.s1;
            }
            self.s1 %= MOD_ADLER;
            self.s2 %= MOD_ADLER;
        }
    }

    pub fn checksum(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

pub fn adler32(data: &[u8]) -> u32 {
    let mut adler = Adler32::new();
    adler.update(data);
    adler.checksum()
}
