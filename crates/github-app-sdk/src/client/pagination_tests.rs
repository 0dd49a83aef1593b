//! Tests for Link-header pagination parsing.

use super::*;

#[test]
fn test_parses_next_and_last_links() {
    // Arrange
    let header = "<https://api.github.com/repos/o/r/issues/1/comments?page=2>; rel=\"next\", <https://api.github.com/repos/o/r/issues/1/comments?page=5>; rel=\"last\"";

    // Act
    let pagination = parse_link_header(Some(header));

    // Assert
    assert!(pagination.has_next());
    assert_eq!(pagination.next_page(), Some(2));
    assert_eq!(
        pagination.last.as_deref(),
        Some("https://api.github.com/repos/o/r/issues/1/comments?page=5")
    );
}

#[test]
fn test_missing_header_means_single_page() {
    // Act
    let pagination = parse_link_header(None);

    // Assert
    assert!(!pagination.has_next());
    assert!(pagination.next_page().is_none());
}

#[test]
fn test_last_page_has_only_prev_links() {
    // Arrange
    let header = "<https://api.github.com/resource?page=4>; rel=\"prev\", <https://api.github.com/resource?page=1>; rel=\"first\"";

    // Act
    let pagination = parse_link_header(Some(header));

    // Assert
    assert!(!pagination.has_next());
    assert_eq!(
        pagination.prev.as_deref(),
        Some("https://api.github.com/resource?page=4")
    );
}

#[test]
fn test_malformed_segments_are_skipped() {
    // Arrange
    let header = "garbage-without-semicolon, <https://api.github.com/resource?page=2>; rel=\"next\"";

    // Act
    let pagination = parse_link_header(Some(header));

    // Assert
    assert_eq!(pagination.next_page(), Some(2));
}

#[test]
fn test_page_number_requires_page_parameter() {
    // Arrange
    let mut pagination = Pagination::default();
    pagination.next = Some("https://api.github.com/resource?per_page=100".to_string());

    // Assert
    assert!(pagination.next_page().is_none());
}
