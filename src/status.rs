//! Run status bitmask
//!
//! Every kind of failure owns one bit. Bits are only ever added during a run,
//! and the final value becomes the process exit code.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Status(u8);

impl Status {
    pub const OK: Status = Status(0);
    pub const COMMAND_LINE_ERROR: Status = Status(1);
    pub const NOT_FOUND_ERROR: Status = Status(2);
    pub const CONTENT_ERROR: Status = Status(4);
    pub const CONTENT_MISMATCH: Status = Status(8);
    pub const XSD_SCHEMA_ERROR: Status = Status(16);
    pub const VERSION_ERROR: Status = Status(32);

    const NAMED: [(Status, &'static str); 6] = [
        (Status::COMMAND_LINE_ERROR, "CommandLineError"),
        (Status::NOT_FOUND_ERROR, "NotFoundError"),
        (Status::CONTENT_ERROR, "ContentError"),
        (Status::CONTENT_MISMATCH, "ContentMismatch"),
        (Status::XSD_SCHEMA_ERROR, "XsdSchemaError"),
        (Status::VERSION_ERROR, "VersionError"),
    ];

    const KNOWN_BITS: u8 = 0b0011_1111;

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Interpret a numeric exit code, rejecting codes that carry unassigned bits
    pub fn from_code(code: i64) -> Option<Status> {
        let byte = u8::try_from(code).ok()?;
        (byte & !Self::KNOWN_BITS == 0).then_some(Status(byte))
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Status) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Human description of a numeric exit code
    pub fn describe(code: i64) -> String {
        match Status::from_code(code) {
            Some(status) => status.to_string(),
            None => format!("The requested error code {} appears meaningless.", code),
        }
    }

    /// Names of the bits set, in ascending bit order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        Status(self.0 | rhs.0)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            f.write_str("Ok")
        } else {
            f.write_str(&self.names().join(", "))
        }
    }
}
