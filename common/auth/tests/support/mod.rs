#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use httpmock::prelude::*;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use uuid::Uuid;

pub const REALM: &str = "academy";
pub const CLIENT_ID: &str = "academy-api";
pub const KID: &str = "realm-key";
pub const CERTS_PATH: &str = "/realms/academy/protocol/openid-connect/certs";

pub struct KeyMaterial {
    pub encoding: EncodingKey,
    pub modulus: String,
    pub exponent: String,
}

fn generate_key_material() -> KeyMaterial {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
    let public_key = private_key.to_public_key();
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");

    KeyMaterial {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    }
}

pub static REALM_KEY: Lazy<KeyMaterial> = Lazy::new(generate_key_material);

pub fn jwks_body(material: &KeyMaterial, kid: &str) -> Value {
    json!({
        "keys": [
            {
                "kid": kid,
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "n": material.modulus,
                "e": material.exponent
            }
        ]
    })
}

/// Keycloak stand-in serving the realm certs endpoint.
pub async fn start_realm() -> MockServer {
    let server = MockServer::start_async().await;
    let body = jwks_body(&REALM_KEY, KID);
    server
        .mock_async(|when, then| {
            when.method(GET).path(CERTS_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(body.to_string());
        })
        .await;
    server
}

pub fn issuer(server: &MockServer) -> String {
    format!("{}/realms/{REALM}", server.base_url())
}

pub struct TokenSpec {
    pub subject: String,
    pub tenant: Option<String>,
    pub roles: Vec<&'static str>,
    pub issuer: String,
    pub audience: &'static str,
    pub expires_in: i64,
}

impl TokenSpec {
    pub fn student(issuer: String) -> Self {
        Self {
            subject: Uuid::new_v4().to_string(),
            tenant: Some(Uuid::new_v4().to_string()),
            roles: vec!["STUDENT"],
            issuer,
            audience: CLIENT_ID,
            expires_in: 3600,
        }
    }

    pub fn payload(&self) -> Value {
        let now = Utc::now().timestamp();
        let mut payload = json!({
            "sub": self.subject,
            "email": "u@example.com",
            "preferred_username": "u",
            "realm_access": { "roles": self.roles },
            "iss": self.issuer,
            "aud": self.audience,
            "exp": now + self.expires_in,
            "iat": now - 10
        });
        if let Some(tenant) = &self.tenant {
            payload["tenant_id"] = json!(tenant);
        }
        payload
    }

    pub fn sign(&self) -> String {
        sign_payload(&self.payload())
    }
}

pub fn sign_payload(payload: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, payload, &REALM_KEY.encoding).expect("sign token")
}
