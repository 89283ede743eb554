//! HTTP method as a typed enum.
//!
//! Only the six verbs a resource can implement are modelled. Any other method
//! string fails to parse and is answered by the not-implemented fallback.

use std::fmt;
use std::str::FromStr;

/// A method a [`ResourceSpec`](crate::ResourceSpec) can respond to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Get,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Every method, in canonical order.
    pub const ALL: [Method; 6] = [
        Self::Get,
        Self::Options,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get     => "GET",
            Self::Options => "OPTIONS",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Patch   => "PATCH",
            Self::Delete  => "DELETE",
        }
    }

    /// Position of this method in [`Method::ALL`].
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Get     => 0,
            Self::Options => 1,
            Self::Post    => 2,
            Self::Put     => 3,
            Self::Patch   => 4,
            Self::Delete  => 5,
        }
    }
}

/// Returned when a method string is not one of the six supported verbs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown http method `{0}`")]
pub struct UnknownMethod(pub String);

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET"     => Ok(Self::Get),
            "OPTIONS" => Ok(Self::Options),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "PATCH"   => Ok(Self::Patch),
            "DELETE"  => Ok(Self::Delete),
            _         => Err(UnknownMethod(s.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
