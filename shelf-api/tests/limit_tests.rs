use shelf_api::limits::{enforce_limit, enforce_max_body_size, LimitError, MAX_BODY_BYTES};

#[test]
fn allows_exact_max_size() {
    assert!(enforce_max_body_size(MAX_BODY_BYTES).is_ok());
}

#[test]
fn rejects_over_max_size() {
    let err = enforce_max_body_size(MAX_BODY_BYTES + 1).expect_err("should error");
    assert_eq!(err, LimitError::TooLarge { max: MAX_BODY_BYTES, actual: MAX_BODY_BYTES + 1 });
    assert!(enforce_limit(9, 8).is_err());
}
