use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSize(pub u16);

impl PageSize {
    /// Zero is lifted to one; anything above `max` is capped.
    pub fn clamped(requested: Option<u16>, default: u16, max: u16) -> Self {
        let size = requested.unwrap_or(default).max(1);
        PageSize(size.min(max.max(1)))
    }

    pub fn get(self) -> i64 {
        i64::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageNumber(pub u32);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(1);

    pub fn get(self) -> i64 {
        i64::from(self.0.max(1))
    }
}
