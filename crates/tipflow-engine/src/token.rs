// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token Authority: QR token creation, authorization, and revocation.
//!
//! Authorization is the hot path. The scan-count increment and cap check
//! run as one guarded UPDATE inside `tipflow-storage`, so concurrent
//! scans of a nearly exhausted token are linearized there; this service
//! adds minting, the staff-binding handle, and revocation policy.

use chrono::{DateTime, Utc};
use rand::RngCore;
use tipflow_core::{AuthorizedToken, AuthorizeError, QrToken, ScanOutcome, TipflowError, TokenKind};
use tipflow_storage::{queries, Database};
use tracing::{debug, info};

/// Number of random bytes behind a token string (hex-encoded to 48 chars).
const TOKEN_BYTES: usize = 24;

/// Parameters for minting a new token.
#[derive(Debug, Clone)]
pub struct IssueTokenRequest {
    pub staff_id: String,
    pub business_id: String,
    pub location_id: Option<String>,
    pub kind: TokenKind,
    pub shift_id: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_scans: Option<u32>,
}

/// QR token lifecycle service.
#[derive(Clone)]
pub struct TokenAuthority {
    db: Database,
}

impl TokenAuthority {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Mint and persist a token for a staff member.
    pub async fn issue(
        &self,
        request: IssueTokenRequest,
        now: DateTime<Utc>,
    ) -> Result<QrToken, TipflowError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let token = QrToken {
            id: uuid::Uuid::new_v4().to_string(),
            token: hex::encode(bytes),
            staff_id: request.staff_id,
            business_id: request.business_id,
            location_id: request.location_id,
            kind: request.kind,
            shift_id: request.shift_id,
            valid_from: request.valid_from,
            valid_until: request.valid_until,
            scan_count: 0,
            max_scans: request.max_scans,
            active: true,
            created_at: now,
            last_scanned_at: None,
        };
        queries::tokens::insert(&self.db, &token).await?;

        info!(
            token_id = %token.id,
            staff_id = %token.staff_id,
            kind = %token.kind,
            max_scans = ?token.max_scans,
            "token issued"
        );
        Ok(token)
    }

    /// Authorize a presented token string for a new tip at `now`.
    ///
    /// On success one scan is consumed atomically (and the token is
    /// deactivated in the same step when that scan was the last one). On
    /// rejection nothing is mutated.
    pub async fn authorize(
        &self,
        token_string: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthorizedToken, AuthorizeError> {
        match queries::tokens::consume_scan(&self.db, token_string, now).await? {
            ScanOutcome::Authorized(token) => {
                debug!(
                    token_id = %token.id,
                    staff_id = %token.staff_id,
                    scan_count = token.scan_count,
                    "token authorized"
                );
                Ok(AuthorizedToken::from(&token))
            }
            ScanOutcome::Rejected(reason) => {
                debug!(%reason, "token rejected");
                Err(AuthorizeError::Rejected(reason))
            }
        }
    }

    /// Idempotently deactivate one token.
    pub async fn revoke(&self, token_id: &str) -> Result<(), TipflowError> {
        let revoked = queries::tokens::revoke(&self.db, token_id).await?;
        if revoked {
            info!(token_id, "token revoked");
        } else {
            debug!(token_id, "revoke was a no-op");
        }
        Ok(())
    }

    /// Deactivate every token a staff member owns. Called when staff are
    /// deactivated; atomic with respect to concurrent authorization.
    pub async fn revoke_all_for_staff(&self, staff_id: &str) -> Result<usize, TipflowError> {
        let revoked = queries::tokens::revoke_all_for_staff(&self.db, staff_id).await?;
        info!(staff_id, revoked, "staff tokens revoked");
        Ok(revoked)
    }

    /// Tokens for a staff member that are currently authorizable.
    pub async fn active_tokens_for_staff(
        &self,
        staff_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<QrToken>, TipflowError> {
        queries::tokens::list_active_for_staff(&self.db, staff_id, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tipflow_core::AuthError;

    async fn setup() -> TokenAuthority {
        TokenAuthority::new(Database::open_in_memory().await.unwrap())
    }

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    fn shift_request(max_scans: Option<u32>) -> IssueTokenRequest {
        IssueTokenRequest {
            staff_id: "staff-1".to_string(),
            business_id: "biz-1".to_string(),
            location_id: None,
            kind: TokenKind::Shift,
            shift_id: Some("shift-1".to_string()),
            valid_from: hour(9),
            valid_until: Some(hour(17)),
            max_scans,
        }
    }

    #[tokio::test]
    async fn issued_tokens_are_unique_48_char_hex() {
        let authority = setup().await;
        let a = authority.issue(shift_request(None), hour(8)).await.unwrap();
        let b = authority.issue(shift_request(None), hour(8)).await.unwrap();

        assert_eq!(a.token.len(), 48);
        assert!(a.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.token, b.token);
        assert_eq!(a.scan_count, 0);
        assert!(a.active);
    }

    #[tokio::test]
    async fn authorize_binds_staff_identity_and_consumes_a_scan() {
        let authority = setup().await;
        let token = authority.issue(shift_request(Some(5)), hour(8)).await.unwrap();

        let handle = authority.authorize(&token.token, hour(12)).await.unwrap();
        assert_eq!(handle.staff_id, "staff-1");
        assert_eq!(handle.business_id, "biz-1");
        assert_eq!(handle.token_id, token.id);
        assert_eq!(handle.scan_count, 1);
    }

    #[tokio::test]
    async fn single_use_token_lifecycle() {
        let authority = setup().await;
        let mut request = shift_request(Some(1));
        request.valid_until = Some(hour(13));
        let token = authority.issue(request, hour(8)).await.unwrap();

        // First scan succeeds and exhausts the token.
        let handle = authority.authorize(&token.token, hour(12)).await.unwrap();
        assert_eq!(handle.scan_count, 1);

        // Second scan immediately after fails with the cap reason.
        let err = authority.authorize(&token.token, hour(12)).await.unwrap_err();
        assert!(matches!(
            err,
            AuthorizeError::Rejected(AuthError::ScanLimitReached)
        ));
    }

    #[tokio::test]
    async fn revoked_staff_cannot_be_tipped() {
        let authority = setup().await;
        let t1 = authority.issue(shift_request(None), hour(8)).await.unwrap();
        let t2 = authority.issue(shift_request(None), hour(8)).await.unwrap();

        let revoked = authority.revoke_all_for_staff("staff-1").await.unwrap();
        assert_eq!(revoked, 2);

        for token in [t1, t2] {
            let err = authority.authorize(&token.token, hour(12)).await.unwrap_err();
            assert!(matches!(err, AuthorizeError::Rejected(AuthError::Inactive)));
        }
    }

    #[tokio::test]
    async fn revoke_twice_is_silent() {
        let authority = setup().await;
        let token = authority.issue(shift_request(None), hour(8)).await.unwrap();
        authority.revoke(&token.id).await.unwrap();
        authority.revoke(&token.id).await.unwrap();
    }

    #[tokio::test]
    async fn active_listing_tracks_revocation() {
        let authority = setup().await;
        let token = authority.issue(shift_request(None), hour(8)).await.unwrap();

        let active = authority
            .active_tokens_for_staff("staff-1", hour(12))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        authority.revoke(&token.id).await.unwrap();
        let active = authority
            .active_tokens_for_staff("staff-1", hour(12))
            .await
            .unwrap();
        assert!(active.is_empty());
    }
}
