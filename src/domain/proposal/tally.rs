use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const NO_DATA: &str = "NaN";

/// A vote weight or percentage reported by the portal.
///
/// The portal sends the literal token `"NaN"` while nobody has voted yet.
/// That sentinel is kept as [`Tally::NoData`] so it survives storage and
/// compares equal to itself; only display conversion turns it into `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Tally {
    #[default]
    NoData,
    Value(f64),
}

impl Tally {
    /// Numeric view for display and sorting. `NoData` reads as zero.
    pub fn as_f64(&self) -> f64 {
        match self {
            Tally::NoData => 0.0,
            Tally::Value(v) => *v,
        }
    }

    /// Rounded to two decimals, `0.0` for the sentinel.
    pub fn display(&self) -> String {
        let rounded = (self.as_f64() * 100.0).round() / 100.0;
        if rounded.fract() == 0.0 { format!("{:.1}", rounded) } else { format!("{}", rounded) }
    }

    fn parse(text: &str) -> Option<Tally> {
        let text = text.trim();
        if text.eq_ignore_ascii_case(NO_DATA) {
            return Some(Tally::NoData);
        }
        text.parse::<f64>().ok().filter(|v| v.is_finite()).map(Tally::Value)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tally::NoData => f.write_str(NO_DATA),
            Tally::Value(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tally::NoData => serializer.serialize_str(NO_DATA),
            Tally::Value(v) => serializer.serialize_f64(*v),
        }
    }
}

struct TallyVisitor;

impl<'de> Visitor<'de> for TallyVisitor {
    type Value = Tally;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a finite number or the \"NaN\" sentinel")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Tally, E> {
        if v.is_finite() {
            Ok(Tally::Value(v))
        } else {
            Ok(Tally::NoData)
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tally, E> {
        Ok(Tally::Value(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tally, E> {
        Ok(Tally::Value(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Tally, E> {
        Tally::parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for Tally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TallyVisitor)
    }
}
