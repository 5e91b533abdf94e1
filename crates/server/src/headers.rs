//! Typed headers understood by the server.

use axum::http::{HeaderName, HeaderValue};
use axum_extra::headers::{Error as HeaderError, Header};
use uuid::Uuid;

static USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
static TOKEN_HEADER: HeaderName = HeaderName::from_static("authorization");
static TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

fn decode_text<'i, I>(values: &mut I) -> Result<String, HeaderError>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let value = values.next().ok_or_else(HeaderError::invalid)?;
    let Ok(value) = value.to_str() else {
        return Err(HeaderError::invalid());
    };
    Ok(value.trim().to_string())
}

fn encode_text<E: Extend<HeaderValue>>(name: &HeaderName, value: &str, values: &mut E) {
    match HeaderValue::from_str(value) {
        Ok(value) => values.extend(std::iter::once(value)),
        Err(_) => tracing::error!("failed to encode {name} header"),
    }
}

/// `X-User-Id`: the account the caller claims to be.
#[derive(Debug)]
pub(crate) struct UserId(pub String);

impl Header for UserId {
    fn name() -> &'static HeaderName {
        &USER_ID_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        decode_text(values).map(UserId)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        encode_text(Self::name(), &self.0, values);
    }
}

/// `Authorization`: the raw token issued to the user, without a scheme.
#[derive(Debug)]
pub(crate) struct Token(pub String);

impl Header for Token {
    fn name() -> &'static HeaderName {
        &TOKEN_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        decode_text(values).map(Token)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        encode_text(Self::name(), &self.0, values);
    }
}

/// `X-Trace-Id`: correlates the logs of one request.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TraceId(pub String);

impl TraceId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Header for TraceId {
    fn name() -> &'static HeaderName {
        &TRACE_ID_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        decode_text(values).map(TraceId)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        encode_text(Self::name(), &self.0, values);
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum_extra::headers::HeaderMapExt;

    use super::*;

    #[test]
    fn trace_id_round_trips_through_header_map() {
        let mut headers = HeaderMap::new();
        headers.typed_insert(TraceId("abc-123".to_string()));
        assert_eq!(headers.get("x-trace-id").unwrap(), "abc-123");
        assert_eq!(
            headers.typed_get::<TraceId>(),
            Some(TraceId("abc-123".to_string()))
        );
    }

    #[test]
    fn token_surrounding_whitespace_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static(" secret "));
        assert_eq!(headers.typed_get::<Token>().unwrap().0, "secret");
    }

    #[test]
    fn generated_trace_ids_are_unique() {
        assert_ne!(TraceId::generate(), TraceId::generate());
    }
}
