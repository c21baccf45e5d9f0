//! Auth header construction
//!
//! A pure function of the stored credential. Header values hold secrets and
//! are wiped when the request has been built.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mcphost_core::AuthCredentials;
use zeroize::Zeroizing;

pub const AUTHORIZATION: &str = "Authorization";
pub const API_KEY_HEADER: &str = "X-API-Key";
/// Tenant header for multi-tenant servers (Atlassian cloud id)
pub const CLOUD_ID_HEADER: &str = "X-Cloud-Id";

pub type AuthHeader = (&'static str, Zeroizing<String>);

pub fn auth_headers(credentials: &AuthCredentials) -> Vec<AuthHeader> {
    match credentials {
        AuthCredentials::Bearer { token } => {
            vec![(AUTHORIZATION, Zeroizing::new(format!("Bearer {token}")))]
        }
        AuthCredentials::ApiKey { api_key } => {
            vec![(API_KEY_HEADER, Zeroizing::new(api_key.clone()))]
        }
        AuthCredentials::OAuth {
            access_token,
            cloud_id,
            ..
        } => {
            let mut headers = vec![(AUTHORIZATION, Zeroizing::new(format!("Bearer {access_token}")))];
            if let Some(cloud_id) = cloud_id.as_deref().filter(|c| !c.is_empty()) {
                headers.push((CLOUD_ID_HEADER, Zeroizing::new(cloud_id.to_string())));
            }
            headers
        }
        AuthCredentials::Basic { username, password } => {
            let pair = Zeroizing::new(format!("{username}:{password}"));
            vec![(
                AUTHORIZATION,
                Zeroizing::new(format!("Basic {}", STANDARD.encode(pair.as_bytes()))),
            )]
        }
    }
}
