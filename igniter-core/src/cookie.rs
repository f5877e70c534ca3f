use crate::error::FrameworkError;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on cookie lifetime (RFC 6265bis): 400 days.
const MAX_AGE_DAYS: i64 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes applied when serializing a `Set-Cookie` line.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub max_age_secs: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
    pub partitioned: bool,
}

/// Request cookies plus accumulated `Set-Cookie` lines.
///
/// Parsed once from the `Cookie` header; mutations only append outgoing
/// lines, they never rewrite the incoming view.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    values: HashMap<String, String>,
    set_lines: Vec<String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` request header (`a=1; b=2`).
    pub fn from_header(header: Option<&str>) -> Self {
        let mut values = HashMap::new();
        if let Some(raw) = header {
            for pair in raw.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                values.insert(name.to_string(), value.trim().to_string());
            }
        }
        Self {
            values,
            set_lines: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Incoming cookies as a plain map (for the request envelope view).
    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    /// Queue a `Set-Cookie` line and update the local view.
    pub fn set(
        &mut self,
        name: &str,
        value: &str,
        options: CookieOptions,
    ) -> Result<(), FrameworkError> {
        let line = serialize_set_cookie(name, value, options)?;
        self.values.insert(name.to_string(), value.to_string());
        self.set_lines.push(line);
        Ok(())
    }

    /// Queue a signed cookie; the stored value is `value.signature`.
    pub fn set_signed(
        &mut self,
        name: &str,
        value: &str,
        secret: &str,
        options: CookieOptions,
    ) -> Result<(), FrameworkError> {
        let signed = sign(name, value, secret);
        let line = serialize_set_cookie(name, &signed, options)?;
        self.values.insert(name.to_string(), signed);
        self.set_lines.push(line);
        Ok(())
    }

    /// Read and verify a signed cookie. Missing or tampered values yield
    /// `None`, never an error.
    pub fn get_signed(&self, name: &str, secret: &str) -> Option<String> {
        verify(name, self.get(name)?, secret)
    }

    /// Queue a removal line (empty value, `Max-Age=0`).
    pub fn delete(&mut self, name: &str) {
        self.values.remove(name);
        self.set_lines
            .push(format!("{name}=; Path=/; Max-Age=0"));
    }

    /// Queue removal lines for every cookie currently in the jar.
    pub fn clear(&mut self) {
        let names: Vec<String> = self.values.keys().cloned().collect();
        for name in names {
            self.delete(&name);
        }
    }

    pub fn set_cookie_lines(&self) -> &[String] {
        &self.set_lines
    }

    pub fn take_set_cookie_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.set_lines)
    }
}

/// Build one `Set-Cookie` line, enforcing prefix and lifetime rules.
pub fn serialize_set_cookie(
    name: &str,
    value: &str,
    mut options: CookieOptions,
) -> Result<String, FrameworkError> {
    if name.is_empty() {
        return Err(FrameworkError::bad_request("cookie name cannot be empty"));
    }

    if name.starts_with("__Secure-") {
        options.secure = true;
    }
    if name.starts_with("__Host-") {
        if options.domain.is_some() {
            return Err(FrameworkError::bad_request(
                "__Host- cookies must not set a Domain",
            ));
        }
        options.secure = true;
        options.path = Some("/".to_string());
    }
    if options.partitioned {
        options.secure = true;
    }

    let limit = Duration::days(MAX_AGE_DAYS);
    if let Some(max_age) = options.max_age_secs {
        if max_age > limit.num_seconds() {
            return Err(FrameworkError::bad_request(format!(
                "cookie Max-Age exceeds the {MAX_AGE_DAYS}-day limit"
            )));
        }
    }
    if let Some(expires) = options.expires {
        if expires > Utc::now() + limit {
            return Err(FrameworkError::bad_request(format!(
                "cookie Expires exceeds the {MAX_AGE_DAYS}-day limit"
            )));
        }
    }

    let mut line = format!("{name}={value}");
    if let Some(ref domain) = options.domain {
        line.push_str("; Domain=");
        line.push_str(domain);
    }
    if let Some(ref path) = options.path {
        line.push_str("; Path=");
        line.push_str(path);
    }
    if let Some(expires) = options.expires {
        line.push_str("; Expires=");
        line.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
    }
    if let Some(max_age) = options.max_age_secs {
        line.push_str("; Max-Age=");
        line.push_str(&max_age.to_string());
    }
    if options.secure {
        line.push_str("; Secure");
    }
    if options.http_only {
        line.push_str("; HttpOnly");
    }
    if let Some(same_site) = options.same_site {
        line.push_str("; SameSite=");
        line.push_str(same_site.as_str());
    }
    if options.partitioned {
        line.push_str("; Partitioned");
    }

    Ok(line)
}

/// `value.sig` where `sig = base64url(HMAC-SHA256(secret, name + "." + value))`.
pub fn sign(name: &str, value: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(name.as_bytes());
    mac.update(b".");
    mac.update(value.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{value}.{signature}")
}

/// Verify a signed value in constant time. Returns the inner value, or
/// `None` when the signature is missing or invalid.
pub fn verify(name: &str, signed: &str, secret: &str) -> Option<String> {
    let (value, signature) = signed.rsplit_once('.')?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(name.as_bytes());
    mac.update(b".");
    mac.update(value.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(value.to_string())
}
