// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// One row of the roster, as resolved by the caller from the external
/// tabular source.
///
/// The identity is the concatenation of the first and last names and acts as
/// the primary key of a student within a sheet. The presence flag is already
/// resolved against the requested week column.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct RosterEntry {
    pub identity: String,
    pub present: bool,
}

// ******** Output data structures *********

/// The outcome of one examinee draw.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Selection {
    /// Identities drawn this time, in draw order. Empty when nobody was
    /// eligible.
    pub drawn: Vec<String>,
    /// Number of rows marked present in the roster.
    pub present_count: usize,
    /// The one-third quota computed from the present count.
    pub quota: usize,
}

/// One group of identities, in assignment order. The first member is the
/// rapporteur of the group.
pub type Group = Vec<String>;

/// One completed run of the group generation: a full partition of the roster
/// into ordered groups.
pub type Drawing = Vec<Group>;

/// Errors that prevent a draw from completing successfully.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DrawErrors {
    InvalidGroupCount,
    NoUniqueGrouping,
}

impl Error for DrawErrors {}

impl Display for DrawErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawErrors::InvalidGroupCount => {
                write!(f, "the number of groups must be at least 1")
            }
            DrawErrors::NoUniqueGrouping => {
                write!(f, "no unused grouping found within the attempts bound")
            }
        }
    }
}

// ********* Configuration **********

/// Retry bound of the unique-grouping loop. Reaching it is fatal for the
/// request: the caller gets [DrawErrors::NoUniqueGrouping] and history is
/// left untouched.
pub const MAX_ATTEMPTS: u32 = 100;
