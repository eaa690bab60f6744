use fileserver::range::{negotiate, parse_range};
use fileserver::RangeSpec;

#[cfg(test)]
mod range_parsing_tests {
    use super::*;

    #[test]
    fn test_closed_range() {
        assert_eq!(parse_range("bytes=0-9", 100), RangeSpec::Partial { start: 0, end: 9 });
        assert_eq!(parse_range("bytes=10-10", 100), RangeSpec::Partial { start: 10, end: 10 });
    }

    #[test]
    fn test_open_ended_range_runs_to_last_byte() {
        assert_eq!(parse_range("bytes=0-", 100), RangeSpec::Partial { start: 0, end: 99 });
        assert_eq!(parse_range("bytes=42-", 100), RangeSpec::Partial { start: 42, end: 99 });
    }

    #[test]
    fn test_end_is_clamped_to_size() {
        assert_eq!(parse_range("bytes=90-500", 100), RangeSpec::Partial { start: 90, end: 99 });
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(parse_range("bytes=-10", 100), RangeSpec::Partial { start: 90, end: 99 });
        assert_eq!(parse_range("bytes=-500", 100), RangeSpec::Partial { start: 0, end: 99 });
        assert_eq!(parse_range("bytes=-0", 100), RangeSpec::Unsatisfiable);
    }

    #[test]
    fn test_start_at_or_beyond_size_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=100-110", 100), RangeSpec::Unsatisfiable);
        assert_eq!(parse_range("bytes=200-", 100), RangeSpec::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-", 0), RangeSpec::Unsatisfiable);
        assert_eq!(parse_range("bytes=-5", 0), RangeSpec::Unsatisfiable);
    }

    #[test]
    fn test_inverted_range_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=50-10", 100), RangeSpec::Unsatisfiable);
    }

    #[test]
    fn test_malformed_headers_fall_back_to_whole_file() {
        for header in ["bytes=abc-def", "bytes=", "bytes=5", "items=0-5", "0-5", "bytes=1-x", "bytes=--3"] {
            assert_eq!(parse_range(header, 100), RangeSpec::Whole, "header {:?}", header);
        }
    }

    #[test]
    fn test_only_first_range_is_honored() {
        assert_eq!(
            parse_range("bytes=0-4, 10-20, 30-", 100),
            RangeSpec::Partial { start: 0, end: 4 }
        );
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        assert_eq!(parse_range(" bytes= 3 - 7 ", 100), RangeSpec::Partial { start: 3, end: 7 });
    }
}

#[cfg(test)]
mod range_negotiation_tests {
    use super::*;

    #[test]
    fn test_disabled_or_absent_means_whole() {
        assert_eq!(negotiate(Some("bytes=0-1"), 10, false), RangeSpec::Whole);
        assert_eq!(negotiate(None, 10, true), RangeSpec::Whole);
        assert_eq!(negotiate(Some("bytes=0-1"), 10, true), RangeSpec::Partial { start: 0, end: 1 });
    }

    #[test]
    fn test_content_range_values() {
        assert_eq!(
            RangeSpec::Partial { start: 0, end: 99 }.content_range(100).as_deref(),
            Some("bytes 0-99/100")
        );
        assert_eq!(RangeSpec::Unsatisfiable.content_range(100).as_deref(), Some("bytes */100"));
        assert_eq!(RangeSpec::Whole.content_range(100), None);
    }
}
