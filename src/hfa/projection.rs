//! Projection resolution.
//!
//! This is a deliberate two-case whitelist, not a general resolver:
//! geographic NAD83 and UTM/NAD83 by zone are recognized, every other
//! datum/projection combination is a fatal unsupported-feature error. A
//! sibling `.prj` WKT file bypasses internal metadata entirely.

use std::io::{Read, Seek};

use log::info;

use super::dictionary::value::Value;
use super::dictionary::Dictionary;
use super::entry::EntryTree;
use super::error::{HfaError, Result};

/// Erdas projection numbers.
const PRO_GEOGRAPHIC: i64 = 0;
const PRO_UTM: i64 = 1;

/// A resolved coordinate reference system handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    pub epsg: Option<u32>,
    pub wkt: Option<String>,
    pub name: String,
}

impl Crs {
    /// Wrap a WKT definition as a handle, taking the outer quoted name if
    /// one is present.
    pub fn from_wkt(wkt: &str) -> Crs {
        let name = wkt
            .split('"')
            .nth(1)
            .unwrap_or("unnamed")
            .to_string();
        Crs {
            epsg: None,
            wkt: Some(wkt.trim().to_string()),
            name,
        }
    }

    pub fn geographic_nad83() -> Crs {
        Crs {
            epsg: Some(4269),
            wkt: None,
            name: "NAD83".to_string(),
        }
    }

    pub fn utm_nad83(zone: u32) -> Result<Crs> {
        if !(1..=60).contains(&zone) {
            return Err(HfaError::UnsupportedProjection {
                datum: "NAD83".to_string(),
                projection: PRO_UTM,
            });
        }
        Ok(Crs {
            epsg: Some(26900 + zone),
            wkt: None,
            name: format!("NAD83 / UTM zone {}N", zone),
        })
    }
}

/// Resolve the CRS from the band entry's `Projection` → `Datum` sub-entries.
///
/// Absent projection metadata yields `None`; present but non-whitelisted
/// metadata is a fatal error.
pub fn resolve<R: Read + Seek>(
    cur: &mut R,
    tree: &mut EntryTree,
    dict: &mut Dictionary,
    band_entry: u64,
) -> Result<Option<Crs>> {
    let Some(projection) = tree.named_child(cur, band_entry, "Projection")? else {
        return Ok(None);
    };
    let values = tree.field_values(cur, dict, projection)?;
    let pro_number = values.get("proNumber").and_then(Value::as_int).unwrap_or(-1);
    let pro_zone = values.get("proZone").and_then(Value::as_int).unwrap_or(0);

    let datum_name = match tree.named_child(cur, projection, "Datum")? {
        Some(datum) => tree
            .field_values(cur, dict, datum)?
            .get("datumname")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        None => String::new(),
    };

    if datum_name != "NAD83" {
        return Err(HfaError::UnsupportedProjection {
            datum: datum_name,
            projection: pro_number,
        });
    }
    let crs = match pro_number {
        PRO_GEOGRAPHIC => Crs::geographic_nad83(),
        PRO_UTM => Crs::utm_nad83(u32::try_from(pro_zone).unwrap_or(0))?,
        _ => {
            return Err(HfaError::UnsupportedProjection {
                datum: datum_name,
                projection: pro_number,
            })
        }
    };
    info!("Resolved projection: {}", crs.name);
    Ok(Some(crs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wkt_handle_extracts_name() {
        let crs = Crs::from_wkt("GEOGCS[\"NAD83\",DATUM[\"North_American_Datum_1983\"]]");
        assert_eq!(crs.name, "NAD83");
        assert_eq!(crs.epsg, None);
        assert!(crs.wkt.unwrap().starts_with("GEOGCS"));
    }

    #[test]
    fn utm_zones_map_to_epsg_269xx() {
        assert_eq!(Crs::utm_nad83(13).unwrap().epsg, Some(26913));
        assert!(Crs::utm_nad83(0).is_err());
        assert!(Crs::utm_nad83(61).is_err());
    }

    #[test]
    fn geographic_nad83_is_epsg_4269() {
        assert_eq!(Crs::geographic_nad83().epsg, Some(4269));
    }
}
