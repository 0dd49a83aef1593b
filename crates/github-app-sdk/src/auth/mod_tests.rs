//! Tests for authentication types.

use chrono::{Duration, Utc};

use super::*;

// ============================================================================
// Test: Identifier Types
// ============================================================================

#[test]
fn test_app_id_roundtrips_through_display_and_parse() {
    // Arrange
    let id = GitHubAppId::new(123456);

    // Act
    let rendered = id.to_string();
    let parsed: GitHubAppId = rendered.parse().expect("parse should succeed");

    // Assert
    assert_eq!(rendered, "123456");
    assert_eq!(parsed, id);
    assert_eq!(parsed.as_u64(), 123456);
}

#[test]
fn test_installation_id_rejects_non_numeric_input() {
    // Act
    let result: Result<InstallationId, _> = "not-a-number".parse();

    // Assert
    assert!(matches!(
        result,
        Err(crate::error::ValidationError::InvalidFormat { .. })
    ));
}

#[test]
fn test_user_id_parses_numeric_input() {
    // Act
    let parsed: UserId = "583231".parse().expect("parse should succeed");

    // Assert
    assert_eq!(parsed, UserId::new(583231));
}

// ============================================================================
// Test: JWT Lifetime
// ============================================================================

#[test]
fn test_jwt_reports_remaining_lifetime() {
    // Arrange
    let jwt = JsonWebToken::new(
        "header.payload.signature".to_string(),
        GitHubAppId::new(1),
        Utc::now() + Duration::minutes(10),
    );

    // Assert
    assert!(!jwt.is_expired());
    assert!(!jwt.expires_soon(Duration::minutes(2)));
    assert!(jwt.expires_soon(Duration::minutes(15)));
    assert!(jwt.time_until_expiry() > Duration::minutes(9));
}

#[test]
fn test_expired_jwt_is_reported_expired() {
    // Arrange
    let jwt = JsonWebToken::new(
        "header.payload.signature".to_string(),
        GitHubAppId::new(1),
        Utc::now() - Duration::minutes(1),
    );

    // Assert
    assert!(jwt.is_expired());
    assert!(jwt.time_until_expiry() <= Duration::zero());
}

#[test]
fn test_jwt_debug_redacts_token_material() {
    // Arrange
    let jwt = JsonWebToken::new(
        "secret-jwt-material".to_string(),
        GitHubAppId::new(1),
        Utc::now() + Duration::minutes(10),
    );

    // Act
    let debug = format!("{:?}", jwt);

    // Assert
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains("secret-jwt-material"));
}

// ============================================================================
// Test: Installation Tokens
// ============================================================================

fn write_permissions() -> InstallationPermissions {
    InstallationPermissions {
        issues: PermissionLevel::Write,
        pull_requests: PermissionLevel::Write,
        contents: PermissionLevel::Read,
        metadata: PermissionLevel::Read,
        checks: PermissionLevel::Write,
        members: PermissionLevel::Read,
    }
}

#[test]
fn test_installation_token_permission_checks() {
    // Arrange
    let token = InstallationToken::new(
        "ghs_abc123".to_string(),
        InstallationId::new(42),
        Utc::now() + Duration::hours(1),
        write_permissions(),
        Vec::new(),
    );

    // Assert
    assert!(token.has_permission(Permission::ReadIssues));
    assert!(token.has_permission(Permission::WriteIssues));
    assert!(token.has_permission(Permission::WritePullRequests));
    assert!(token.has_permission(Permission::WriteChecks));
}

#[test]
fn test_read_only_token_cannot_write() {
    // Arrange
    let permissions = InstallationPermissions {
        issues: PermissionLevel::Read,
        pull_requests: PermissionLevel::Read,
        checks: PermissionLevel::None,
        ..write_permissions()
    };
    let token = InstallationToken::new(
        "ghs_abc123".to_string(),
        InstallationId::new(42),
        Utc::now() + Duration::hours(1),
        permissions,
        Vec::new(),
    );

    // Assert
    assert!(token.has_permission(Permission::ReadIssues));
    assert!(!token.has_permission(Permission::WriteIssues));
    assert!(!token.has_permission(Permission::ReadChecks));
}

#[test]
fn test_unscoped_token_can_access_any_repository() {
    // Arrange
    let token = InstallationToken::new(
        "ghs_abc123".to_string(),
        InstallationId::new(42),
        Utc::now() + Duration::hours(1),
        write_permissions(),
        Vec::new(),
    );

    // Assert
    assert!(token.can_access_repository(RepositoryId::new(1)));
    assert!(token.can_access_repository(RepositoryId::new(999)));
}

#[test]
fn test_scoped_token_is_limited_to_listed_repositories() {
    // Arrange
    let token = InstallationToken::new(
        "ghs_abc123".to_string(),
        InstallationId::new(42),
        Utc::now() + Duration::hours(1),
        write_permissions(),
        vec![RepositoryId::new(1), RepositoryId::new(2)],
    );

    // Assert
    assert!(token.can_access_repository(RepositoryId::new(1)));
    assert!(!token.can_access_repository(RepositoryId::new(3)));
}

#[test]
fn test_installation_token_debug_redacts_token_material() {
    // Arrange
    let token = InstallationToken::new(
        "ghs_supersecret".to_string(),
        InstallationId::new(42),
        Utc::now() + Duration::hours(1),
        write_permissions(),
        Vec::new(),
    );

    // Act
    let debug = format!("{:?}", token);

    // Assert
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains("ghs_supersecret"));
}

// ============================================================================
// Test: API Payload Deserialization
// ============================================================================

#[test]
fn test_permissions_default_missing_keys_to_none() {
    // GitHub omits keys for permissions the App was never granted.
    let parsed: InstallationPermissions =
        serde_json::from_str(r#"{"issues": "write", "checks": "write"}"#)
            .expect("deserialization should succeed");

    assert_eq!(parsed.issues, PermissionLevel::Write);
    assert_eq!(parsed.checks, PermissionLevel::Write);
    assert_eq!(parsed.pull_requests, PermissionLevel::None);
    assert_eq!(parsed.metadata, PermissionLevel::Read);
}

#[test]
fn test_installation_payload_deserializes() {
    // Arrange
    let payload = r#"{
        "id": 9001,
        "account": {
            "id": 77,
            "login": "holdex",
            "type": "Organization",
            "avatar_url": "https://avatars.githubusercontent.com/u/77",
            "html_url": "https://github.com/holdex"
        },
        "repository_selection": "all",
        "permissions": {
            "issues": "write",
            "pull_requests": "write",
            "checks": "write",
            "metadata": "read"
        },
        "created_at": "2024-01-15T10:30:00Z",
        "updated_at": "2024-06-01T08:00:00Z",
        "suspended_at": null
    }"#;

    // Act
    let installation: Installation =
        serde_json::from_str(payload).expect("deserialization should succeed");

    // Assert
    assert_eq!(installation.id, InstallationId::new(9001));
    assert_eq!(installation.account.login, "holdex");
    assert_eq!(installation.account.user_type, UserType::Organization);
    assert_eq!(
        installation.repository_selection,
        RepositorySelection::All
    );
    assert_eq!(installation.permissions.issues, PermissionLevel::Write);
    assert!(installation.suspended_at.is_none());
}

#[test]
fn test_bot_user_payload_deserializes() {
    // Arrange
    let payload = r#"{
        "id": 41898282,
        "login": "pr-time-tracker[bot]",
        "type": "Bot",
        "avatar_url": null,
        "html_url": "https://github.com/apps/pr-time-tracker"
    }"#;

    // Act
    let user: User = serde_json::from_str(payload).expect("deserialization should succeed");

    // Assert
    assert_eq!(user.login, "pr-time-tracker[bot]");
    assert_eq!(user.user_type, UserType::Bot);
    assert!(user.avatar_url.is_none());
}
