use serde_json::Value;

/// Claims pulled out of a JWT-shaped credential, for display only.
///
/// The session never looks at these to decide whether it is authenticated; only the server's
/// response codes say whether a credential is still good.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenClaims {
    pub subject: Option<String>,
    pub expires_at: Option<i64>,
}

/// Tries to decode the payload section of a JWT (as base64-encoded token)
///
/// Returns `None` for anything that isn't a three-part token with a JSON object payload.
pub fn parse_token_claims(jwt: &str) -> Option<TokenClaims> {
    let mut parts = jwt.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let payload = payload.trim_end_matches('=');
    let bytes = base64::decode_config(payload, base64::URL_SAFE_NO_PAD).ok()?;
    let obj: Value = serde_json::from_slice(&bytes).ok()?;
    if !obj.is_object() {
        return None;
    }
    Some(TokenClaims {
        subject: obj["sub"].as_str().map(|s| s.to_string()),
        expires_at: obj["exp"].as_i64(),
    })
}

#[test]
fn test_parse_token_claims() {
    assert_eq!(parse_token_claims("."), None);
    assert_eq!(parse_token_claims("tok123"), None);
    assert_eq!(
        parse_token_claims("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJvcCIsImV4cCI6MTcwMDAwMDAwMH0.c2ln"),
        Some(TokenClaims {
            subject: Some("op".to_string()),
            expires_at: Some(1700000000),
        })
    );
    // header only
    assert_eq!(
        parse_token_claims("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"),
        None
    );
}
