//! CLI parsing helpers for clap value parsers.

use std::num::NonZeroUsize;

pub(super) fn parse_jobs(s: &str) -> Result<NonZeroUsize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("{s} is not a valid number"))?;
    match NonZeroUsize::new(value) {
        Some(jobs) if value <= super::MAX_JOBS => Ok(jobs),
        _ => Err(format!("jobs must be between 1 and {}", super::MAX_JOBS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1)]
    #[case("64", 64)]
    fn accepts_range_bounds(#[case] input: &str, #[case] expected: usize) {
        assert_eq!(parse_jobs(input).map(NonZeroUsize::get), Ok(expected));
    }

    #[rstest]
    fn reports_range() {
        assert_eq!(parse_jobs("0"), Err("jobs must be between 1 and 64".to_owned()));
        assert_eq!(parse_jobs("x"), Err("x is not a valid number".to_owned()));
    }
}
