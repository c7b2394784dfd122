use core::fmt;

/// Number of TTIs after which the TTI counter wraps (1024 radio frames of 10 subframes)
pub const TTI_WRAP: u32 = 10240;

/// Transmission time interval counter, one per 1 ms subframe, modulo 10240
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tti(u32);

impl Tti {
    pub fn new(tti: u32) -> Self {
        Tti(tti % TTI_WRAP)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// System frame number
    pub fn sfn(self) -> u32 {
        self.0 / 10
    }

    /// Subframe index within the radio frame
    pub fn sf_idx(self) -> u32 {
        self.0 % 10
    }

    pub fn add_ttis(self, n: u32) -> Tti {
        Tti((self.0 + n % TTI_WRAP) % TTI_WRAP)
    }

    pub fn sub_ttis(self, n: u32) -> Tti {
        Tti((self.0 + TTI_WRAP - n % TTI_WRAP) % TTI_WRAP)
    }

    /// Signed distance `self - other`, taking wraparound into account
    pub fn diff(self, other: Tti) -> i32 {
        let mut d = self.0 as i32 - other.0 as i32;
        let wrap = TTI_WRAP as i32;
        if d < -wrap / 2 {
            d += wrap;
        } else if d >= wrap / 2 {
            d -= wrap;
        }
        d
    }

    /// Age of this TTI compared to now
    #[inline(always)]
    pub fn age(self, now: Tti) -> i32 {
        now.diff(self)
    }

    /// Returns true when `self` lies in the inclusive range [start, end], with wraparound
    pub fn in_window(self, start: Tti, end: Tti) -> bool {
        let len = end.diff(start);
        let off = self.diff(start);
        len >= 0 && off >= 0 && off <= len
    }
}

impl From<u32> for Tti {
    fn from(v: u32) -> Self {
        Tti::new(v)
    }
}

impl fmt::Display for Tti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4}/{}", self.sfn(), self.sf_idx())
    }
}

impl fmt::Debug for Tti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4}/{}", self.sfn(), self.sf_idx())
    }
}
