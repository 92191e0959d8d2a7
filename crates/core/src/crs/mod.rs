//! Coordinate Reference System handling

mod transform;

pub use transform::{CrsTransform, IdentityTransform, UtmTransform};

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinate Reference System tag.
///
/// Only identifies a CRS; projection math lives behind [`CrsTransform`].
/// Serialized as its textual form (`"EPSG:32610"`, a PROJ string or WKT).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

const WKT_KEYWORDS: [&str; 6] = ["PROJCS", "GEOGCS", "PROJCRS", "GEOGCRS", "COMPD_CS", "LOCAL_CS"];

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison; no attempt at semantic WKT/PROJ matching
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Short identifier for logs and error messages
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt.char_indices().nth(50).map_or(wkt.len(), |(i, _)| i);
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

impl FromStr for CRS {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some((authority, code)) = s.split_once(':') {
            if authority.eq_ignore_ascii_case("epsg") {
                return code
                    .trim()
                    .parse::<u32>()
                    .map(CRS::from_epsg)
                    .map_err(|_| Error::InvalidParameter {
                        name: "crs",
                        value: s.to_string(),
                        reason: "EPSG code must be a positive integer".into(),
                    });
            }
        }

        if s.starts_with('+') {
            return Ok(CRS::from_proj(s));
        }

        let upper = s.to_ascii_uppercase();
        if WKT_KEYWORDS.iter().any(|k| upper.starts_with(k)) {
            return Ok(CRS::from_wkt(s));
        }

        Err(Error::InvalidParameter {
            name: "crs",
            value: s.to_string(),
            reason: "expected EPSG:<code>, a PROJ string or WKT".into(),
        })
    }
}

impl TryFrom<String> for CRS {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CRS> for String {
    fn from(crs: CRS) -> Self {
        match (crs.epsg, crs.proj, crs.wkt) {
            (Some(code), _, _) => format!("EPSG:{}", code),
            (None, Some(proj), _) => proj,
            (None, None, Some(wkt)) => wkt,
            (None, None, None) => String::new(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(32610)));
    }

    #[test]
    fn test_crs_parse() {
        assert_eq!("EPSG:32610".parse::<CRS>().unwrap(), CRS::from_epsg(32610));
        assert_eq!("epsg: 4326".parse::<CRS>().unwrap(), CRS::wgs84());
        assert_eq!(
            "+proj=utm +zone=10".parse::<CRS>().unwrap().proj(),
            Some("+proj=utm +zone=10")
        );
        assert!("GEOGCS[\"WGS 84\"]".parse::<CRS>().unwrap().wkt().is_some());
        assert!("EPSG:abc".parse::<CRS>().is_err());
        assert!("mercator".parse::<CRS>().is_err());
    }

    #[test]
    fn test_crs_string_roundtrip() {
        let text: String = CRS::from_epsg(32610).into();
        assert_eq!(text, "EPSG:32610");
        assert_eq!(CRS::try_from(text).unwrap(), CRS::from_epsg(32610));
    }
}
