use core::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum PduParseErr {
    BufferEnded { field: Option<&'static str> },
    InvalidValue { field: &'static str, value: u64 },
    InconsistentLength { expected: usize, found: usize },
    Inconsistency { field: &'static str, reason: &'static str },
    TooManyElements { field: &'static str, max: usize },
    NotImplemented { field: Option<&'static str> },
}

impl fmt::Display for PduParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PduParseErr::BufferEnded { field: Some(field) } => write!(f, "buffer ended while reading {}", field),
            PduParseErr::BufferEnded { field: None } => write!(f, "buffer ended"),
            PduParseErr::InvalidValue { field, value } => write!(f, "invalid value {} for {}", value, field),
            PduParseErr::InconsistentLength { expected, found } => {
                write!(f, "inconsistent length: expected {} found {}", expected, found)
            }
            PduParseErr::Inconsistency { field, reason } => write!(f, "inconsistent {}: {}", field, reason),
            PduParseErr::TooManyElements { field, max } => write!(f, "more than {} {}", max, field),
            PduParseErr::NotImplemented { field } => write!(f, "not implemented: {:?}", field),
        }
    }
}

/// Checks whether a value matches an expected value. If not, returns PduParseErr::InvalidValue
#[macro_export]
macro_rules! expect_value {
    ($value:ident, $expected:expr) => {
        $crate::expect_value!(@inner $value, $expected, stringify!($value))
    };
    ($value:expr, $expected:expr, $field:expr) => {
        $crate::expect_value!(@inner $value, $expected, $field)
    };

    (@inner $value:expr, $expected:expr, $field:expr) => {{
        let val = $value;
        if val == $expected {
            Ok(())
        } else {
            Err($crate::PduParseErr::InvalidValue {
                field: $field,
                value: val.into(),
            })
        }
    }};
}

/// Use when an assertion has already failed. Generates a PduParseErr::InvalidValue
#[macro_export]
macro_rules! expect_failed {
    ($value:ident) => {
        $crate::expect_failed!(@inner $value, stringify!($value))
    };
    ($value:expr, $field:expr) => {
        $crate::expect_failed!(@inner $value, $field)
    };

    (@inner $value:expr, $field:expr) => {{
        Err($crate::PduParseErr::InvalidValue {
            field: $field,
            value: $value as u64,
        })
    }};
}

#[macro_export]
macro_rules! let_field {
    ($buf:expr, $ident:ident, $bits:expr) => {
        let $ident = $buf.read_field($bits, stringify!($ident))?;
    };
}
