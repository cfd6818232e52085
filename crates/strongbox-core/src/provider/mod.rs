//! Contract for the platform secret store the gateway drives.
//!
//! Providers are synchronous and may block; the gateway makes sure they are
//! only ever called from its worker thread.

pub mod memory;
pub mod record;

use std::fmt;

use crate::attributes::AttributeSet;

/// Platform status code. Values follow the keychain's `OSStatus` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const UNIMPLEMENTED: Status = Status(-4);
    pub const IO: Status = Status(-36);
    pub const PARAM: Status = Status(-50);
    pub const INTERNAL_COMPONENT: Status = Status(-2070);
    pub const DUPLICATE_ITEM: Status = Status(-25299);
    pub const ITEM_NOT_FOUND: Status = Status(-25300);
    pub const INTERACTION_NOT_ALLOWED: Status = Status(-25308);
    pub const DECODE: Status = Status(-26275);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }

    pub fn is_not_found(self) -> bool {
        self == Status::ITEM_NOT_FOUND
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Status::SUCCESS => "success",
            Status::UNIMPLEMENTED => "unimplemented",
            Status::IO => "io",
            Status::PARAM => "param",
            Status::INTERNAL_COMPONENT => "internal component",
            Status::DUPLICATE_ITEM => "duplicate item",
            Status::ITEM_NOT_FOUND => "item not found",
            Status::INTERACTION_NOT_ALLOWED => "interaction not allowed",
            Status::DECODE => "decode",
            _ => return None,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({name})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Successful answer to a `copy_matching` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Payload of the single matched item (`ReturnData` without attributes).
    Data(Vec<u8>),
    /// Attributes of each matched item (`ReturnAttributes`). Includes the
    /// payload when `ReturnData` was also requested.
    Items(Vec<AttributeSet>),
}

/// Blocking secret store primitive.
///
/// Every method returns `Err` with the platform status for anything other
/// than success. Missing items are reported as [`Status::ITEM_NOT_FOUND`];
/// interpreting that is the gateway's job.
pub trait SecureStoreProvider: Send + Sync + 'static {
    fn add(&self, attributes: &AttributeSet) -> Result<(), Status>;

    fn update(&self, query: &AttributeSet, changes: &AttributeSet) -> Result<(), Status>;

    fn delete(&self, query: &AttributeSet) -> Result<(), Status>;

    fn copy_matching(&self, query: &AttributeSet) -> Result<QueryResult, Status>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_known_codes() {
        assert_eq!(Status::ITEM_NOT_FOUND.to_string(), "-25300 (item not found)");
        assert_eq!(Status::new(-1).to_string(), "-1");
        assert!(Status::new(-25300).is_not_found());
        assert!(Status::SUCCESS.is_success());
    }
}
