use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use voice_duplex_types::PROTOCOL_VERSION;
use crate::client::config::Config;
use crate::client::consts::{AUTHORIZATION_HEADER, CLIENT_ID_HEADER, DEVICE_ID_HEADER, PROTOCOL_VERSION_HEADER};

pub fn build_request(config: &Config, target: &str) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = target.into_client_request()?;
    if config.token_enable() {
        request.headers_mut()
            .insert(
                AUTHORIZATION_HEADER,
                format!("Bearer {}", config.token().expose_secret()).as_str().parse()?
            );
    }
    request.headers_mut().insert(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION.to_string().as_str().parse()?);
    request.headers_mut().insert(DEVICE_ID_HEADER, config.device_id().parse()?);
    request.headers_mut().insert(CLIENT_ID_HEADER, config.client_id().parse()?);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::builder()
            .with_device_id("aa:bb:cc:dd:ee:ff")
            .with_client_id("client-1")
            .with_token_enable(false)
            .build()
    }

    #[test]
    fn test_identity_headers() {
        let request = build_request(&config(), "ws://127.0.0.1:5000").unwrap();
        let headers = request.headers();
        assert_eq!(headers.get(PROTOCOL_VERSION_HEADER).unwrap(), "1");
        assert_eq!(headers.get(DEVICE_ID_HEADER).unwrap(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(headers.get(CLIENT_ID_HEADER).unwrap(), "client-1");
        assert!(headers.get(AUTHORIZATION_HEADER).is_none());
    }

    #[test]
    fn test_bearer_token_when_enabled() {
        let config = Config::builder().with_token("s3cret").build();
        let request = build_request(&config, "ws://127.0.0.1:5000").unwrap();
        assert_eq!(request.headers().get(AUTHORIZATION_HEADER).unwrap(), "Bearer s3cret");
    }

    #[test]
    fn test_rejects_invalid_target() {
        assert!(build_request(&config(), "not a url").is_err());
    }
}
