use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AuthResult, TokenError};

// zod's email pattern; its two lookaheads are checked in `is_email`.
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

fn is_email(value: &str) -> bool {
    !value.starts_with('.') && !value.contains("..") && EMAIL.is_match(value)
}

/// Payload whose signature, issuer, audience and lifetime have been checked,
/// but whose shape has not.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayload(Value);

impl VerifiedPayload {
    pub(crate) fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Application-focused representation of verified JWT claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    /// Verbatim `sub`; only its UUID shape is checked.
    pub subject: String,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Raw `realm_access.roles`, unknown entries included.
    pub roles: Vec<String>,
    pub tenant_id: Option<String>,
    pub issuer: String,
    pub audience: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    Missing,
    WrongType(&'static str),
    NotUuid,
    NotEmail,
    Empty,
    OutOfRange,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing => f.write_str("is required"),
            Problem::WrongType(expected) => write!(f, "must be {expected}"),
            Problem::NotUuid => f.write_str("must be a UUID"),
            Problem::NotEmail => f.write_str("must be an email address"),
            Problem::Empty => f.write_str("must not be empty"),
            Problem::OutOfRange => f.write_str("is not a representable timestamp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimViolation {
    pub claim: &'static str,
    pub problem: Problem,
}

impl fmt::Display for ClaimViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.claim, self.problem)
    }
}

/// Every problem found in a payload, in claim order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolations(Vec<ClaimViolation>);

impl SchemaViolations {
    pub fn violations(&self) -> &[ClaimViolation] {
        &self.0
    }

    pub fn concerns(&self, claim: &str) -> bool {
        self.0.iter().any(|violation| violation.claim == claim)
    }
}

impl fmt::Display for SchemaViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&rendered)
    }
}

impl std::error::Error for SchemaViolations {}

impl Claims {
    /// Schema-check a verified payload. Failures surface as validation errors.
    pub fn parse(payload: &VerifiedPayload) -> AuthResult<Self> {
        Self::validate(payload.as_value())
            .map_err(|violations| TokenError::Claims(violations).into())
    }

    /// Validate a raw claim object, collecting every violation.
    pub fn validate(value: &Value) -> Result<Self, SchemaViolations> {
        let Some(object) = value.as_object() else {
            return Err(SchemaViolations(vec![ClaimViolation {
                claim: "payload",
                problem: Problem::WrongType("a JSON object"),
            }]));
        };

        let mut check = Checker {
            object,
            violations: Vec::new(),
        };

        let subject = check.uuid("sub", true);
        let email = check.email("email");
        let username = check.non_empty_string("preferred_username");
        let first_name = check.string("given_name", false);
        let last_name = check.string("family_name", false);
        let roles = check.realm_roles();
        let tenant_id = check.uuid("tenant_id", false);
        let issuer = check.string("iss", true);
        let audience = check.audience();
        let expires_at = check.timestamp("exp");
        let issued_at = check.timestamp("iat");

        match (
            subject, email, username, roles, issuer, audience, expires_at, issued_at,
        ) {
            (
                Some(subject),
                Some(email),
                Some(username),
                Some(roles),
                Some(issuer),
                Some(audience),
                Some(expires_at),
                Some(issued_at),
            ) if check.violations.is_empty() => Ok(Self {
                subject,
                email,
                username,
                first_name,
                last_name,
                roles,
                tenant_id,
                issuer,
                audience,
                expires_at,
                issued_at,
            }),
            _ => Err(SchemaViolations(check.violations)),
        }
    }
}

struct Checker<'a> {
    object: &'a Map<String, Value>,
    violations: Vec<ClaimViolation>,
}

impl<'a> Checker<'a> {
    fn reject<T>(&mut self, claim: &'static str, problem: Problem) -> Option<T> {
        self.violations.push(ClaimViolation { claim, problem });
        None
    }

    fn string(&mut self, claim: &'static str, required: bool) -> Option<String> {
        match self.object.get(claim) {
            Some(Value::String(value)) => Some(value.clone()),
            Some(_) => self.reject(claim, Problem::WrongType("a string")),
            None if required => self.reject(claim, Problem::Missing),
            None => None,
        }
    }

    fn non_empty_string(&mut self, claim: &'static str) -> Option<String> {
        let value = self.string(claim, true)?;
        if value.is_empty() {
            return self.reject(claim, Problem::Empty);
        }
        Some(value)
    }

    fn uuid(&mut self, claim: &'static str, required: bool) -> Option<String> {
        let value = self.string(claim, required)?;
        if !is_hyphenated_uuid(&value) {
            return self.reject(claim, Problem::NotUuid);
        }
        Some(value)
    }

    fn email(&mut self, claim: &'static str) -> Option<String> {
        let value = self.string(claim, true)?;
        if !is_email(&value) {
            return self.reject(claim, Problem::NotEmail);
        }
        Some(value)
    }

    fn realm_roles(&mut self) -> Option<Vec<String>> {
        const CLAIM: &str = "realm_access.roles";
        let container = match self.object.get("realm_access") {
            Some(Value::Object(container)) => container,
            Some(_) => return self.reject("realm_access", Problem::WrongType("an object")),
            None => return self.reject("realm_access", Problem::Missing),
        };

        match container.get("roles") {
            Some(Value::Array(items)) => {
                let roles = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_owned))
                    .collect::<Option<Vec<_>>>();
                match roles {
                    Some(roles) => Some(roles),
                    None => self.reject(CLAIM, Problem::WrongType("an array of strings")),
                }
            }
            Some(_) => self.reject(CLAIM, Problem::WrongType("an array of strings")),
            None => self.reject(CLAIM, Problem::Missing),
        }
    }

    fn audience(&mut self) -> Option<Vec<String>> {
        match self.object.get("aud") {
            Some(Value::String(item)) => Some(vec![item.clone()]),
            Some(Value::Array(items)) => {
                let audience = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_owned))
                    .collect::<Option<Vec<_>>>();
                match audience {
                    Some(audience) => Some(audience),
                    None => self.reject("aud", Problem::WrongType("a string or array of strings")),
                }
            }
            Some(_) => self.reject("aud", Problem::WrongType("a string or array of strings")),
            None => Some(Vec::new()),
        }
    }

    fn timestamp(&mut self, claim: &'static str) -> Option<DateTime<Utc>> {
        let seconds = match self.object.get(claim) {
            Some(Value::Number(number)) => match number.as_i64() {
                Some(seconds) => seconds,
                None => match number.as_f64() {
                    Some(seconds) if seconds.is_finite() => seconds.trunc() as i64,
                    _ => return self.reject(claim, Problem::OutOfRange),
                },
            },
            Some(_) => return self.reject(claim, Problem::WrongType("a number")),
            None => return self.reject(claim, Problem::Missing),
        };

        match Utc.timestamp_opt(seconds, 0).single() {
            Some(at) => Some(at),
            None => self.reject(claim, Problem::OutOfRange),
        }
    }
}

/// Accept only the 8-4-4-4-12 textual form, in either case.
fn is_hyphenated_uuid(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}
