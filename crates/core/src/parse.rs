//! Tab-separated line parsing for both feeds.
//!
//! Every line must carry exactly three fields. Anything else is a
//! [`CoreError::MalformedRecord`], and batch parsing stops at the first one.

use std::str::FromStr;

use crate::records::{AppearanceRecord, RatingRecord};
use crate::{CoreError, Feed};

const FIELDS: usize = 3;

/// Parse a whole batch, failing on the first malformed line.
pub fn parse_batch<T, S>(lines: &[S]) -> Result<Vec<T>, CoreError>
where
    T: FromStr<Err = CoreError>,
    S: AsRef<str>,
{
    lines.iter().map(|line| line.as_ref().parse()).collect()
}

fn split_fields(feed: Feed, line: &str) -> Result<[&str; FIELDS], CoreError> {
    let trimmed = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = trimmed.split('\t');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(a), Some(b), Some(c), None) => Ok([a, b, c]),
        _ => {
            let found = trimmed.split('\t').count();
            Err(CoreError::malformed(
                feed,
                line,
                format!("expected {FIELDS} tab-separated fields, found {found}"),
            ))
        }
    }
}

impl FromStr for AppearanceRecord {
    type Err = CoreError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let [actor, movie, year] = split_fields(Feed::Appearance, line)?;
        Ok(AppearanceRecord::new(actor, movie, year))
    }
}

impl FromStr for RatingRecord {
    type Err = CoreError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let [rate, movie, year] = split_fields(Feed::Rating, line)?;
        let rate: f64 = rate
            .trim()
            .parse()
            .map_err(|e| CoreError::malformed(Feed::Rating, line, format!("rate {rate:?}: {e}")))?;
        // Rating sums must stay monotone.
        if !rate.is_finite() || rate < 0.0 {
            return Err(CoreError::malformed(
                Feed::Rating,
                line,
                format!("rate {rate} is not a finite non-negative number"),
            ));
        }
        Ok(RatingRecord::new(rate, movie, year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_appearance_line() {
        let rec: AppearanceRecord = "Tom Hanks\tBig\t1988".parse().unwrap();
        assert_eq!(rec, AppearanceRecord::new("Tom Hanks", "Big", "1988"));
    }

    #[test]
    fn parses_rating_line_with_crlf() {
        let rec: RatingRecord = "7.3\tBig\t1988\r".parse().unwrap();
        assert_eq!(rec.rate, 7.3);
        assert_eq!(rec.movie, "Big");
        assert_eq!(rec.year, "1988");
    }

    #[test]
    fn rejects_wrong_field_count() {
        for line in ["A1\tM1", "A1\tM1\t2000\textra", "", "no tabs at all"] {
            let err = line.parse::<AppearanceRecord>().unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedRecord { feed: Feed::Appearance, .. }),
                "{line:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_bad_rates() {
        for line in ["abc\tM1\t2000", "-1.0\tM1\t2000", "NaN\tM1\t2000", "inf\tM1\t2000"] {
            let err = line.parse::<RatingRecord>().unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedRecord { feed: Feed::Rating, .. }),
                "{line:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn batch_fails_fast() {
        let lines = ["A1\tM1\t2000", "broken", "A2\tM1\t2000"];
        let err = parse_batch::<AppearanceRecord, _>(&lines).unwrap_err();
        match err {
            CoreError::MalformedRecord { line, .. } => assert_eq!(line, "broken"),
            other => panic!("unexpected error {other:?}"),
        }

        let ok = parse_batch::<AppearanceRecord, _>(&lines[..1]).unwrap();
        assert_eq!(ok.len(), 1);
        assert!(parse_batch::<RatingRecord, String>(&[]).unwrap().is_empty());
    }
}
