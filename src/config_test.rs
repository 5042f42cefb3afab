use super::*;

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: i64 = env_parse("__TEST_NONEXISTENT_KEY_98765__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__TEST_RL_EP_VALID__", "250") };
    let val: i64 = env_parse("__TEST_RL_EP_VALID__", 0);
    assert_eq!(val, 250);
    unsafe { std::env::remove_var("__TEST_RL_EP_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__TEST_RL_EP_INVALID__", "notanumber") };
    let val: i64 = env_parse("__TEST_RL_EP_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__TEST_RL_EP_INVALID__") };
}

// =============================================================================
// EndpointCategory
// =============================================================================

#[test]
fn parse_known_categories() {
    assert_eq!(EndpointCategory::parse("auth"), EndpointCategory::Auth);
    assert_eq!(EndpointCategory::parse("pitch-write"), EndpointCategory::PitchWrite);
    assert_eq!(EndpointCategory::parse("analytics-read"), EndpointCategory::AnalyticsRead);
    assert_eq!(EndpointCategory::parse("upload"), EndpointCategory::Upload);
    assert_eq!(EndpointCategory::parse("default"), EndpointCategory::Default);
}

#[test]
fn parse_unknown_category_falls_back_to_default() {
    assert_eq!(EndpointCategory::parse("billing"), EndpointCategory::Default);
    assert_eq!(EndpointCategory::parse(""), EndpointCategory::Default);
    assert_eq!(EndpointCategory::parse("AUTH"), EndpointCategory::Default);
}

#[test]
fn as_str_round_trips_through_parse() {
    for cat in [
        EndpointCategory::Auth,
        EndpointCategory::PitchWrite,
        EndpointCategory::AnalyticsRead,
        EndpointCategory::Upload,
        EndpointCategory::Default,
    ] {
        assert_eq!(EndpointCategory::parse(cat.as_str()), cat);
    }
}

// =============================================================================
// PolicyTable
// =============================================================================

#[test]
fn table_defaults_match_published_policy() {
    let table = PolicyTable::from_env();

    let auth = table.get(EndpointCategory::Auth);
    assert_eq!(auth.window_ms, 900_000);
    assert_eq!(auth.max_requests, 5);

    let pitch = table.get(EndpointCategory::PitchWrite);
    assert_eq!(pitch.window_ms, 60_000);
    assert_eq!(pitch.max_requests, 10);

    let analytics = table.get(EndpointCategory::AnalyticsRead);
    assert_eq!(analytics.window_ms, 60_000);
    assert_eq!(analytics.max_requests, 30);

    let upload = table.get(EndpointCategory::Upload);
    assert_eq!(upload.window_ms, 60_000);
    assert_eq!(upload.max_requests, 5);

    let default = table.get(EndpointCategory::Default);
    assert_eq!(default.window_ms, 60_000);
    assert_eq!(default.max_requests, 100);
}

#[test]
fn policy_window_duration_conversion() {
    let policy = RateLimitPolicy { window_ms: 1500, max_requests: 1 };
    assert_eq!(policy.window(), Duration::from_millis(1500));
}
